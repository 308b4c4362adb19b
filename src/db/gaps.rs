use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::config::parse_date;
use crate::error::Result;

/// A per-fixture sub-resource that is fetched one fixture at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildRelation {
    Odds,
    TvStations,
}

impl ChildRelation {
    pub fn label(self) -> &'static str {
        match self {
            ChildRelation::Odds => "odds",
            ChildRelation::TvStations => "tvstations",
        }
    }

    /// Left anti-join: upcoming fixtures with no child row yet.
    fn missing_sql(self) -> &'static str {
        match self {
            ChildRelation::Odds => {
                r#"
                SELECT f.id FROM fixtures f
                LEFT JOIN odds c ON c.fixture_id = f.id
                WHERE c.fixture_id IS NULL AND f.starting_at >= ?
                ORDER BY f.starting_at, f.id
                LIMIT ?
                "#
            }
            ChildRelation::TvStations => {
                r#"
                SELECT f.id FROM fixtures f
                LEFT JOIN fixture_tvstations c ON c.fixture_id = f.id
                WHERE c.fixture_id IS NULL AND f.starting_at >= ?
                ORDER BY f.starting_at, f.id
                LIMIT ?
                "#
            }
        }
    }
}

/// Latest stored kick-off day, or `None` for an empty table.
pub async fn max_fixture_date(pool: &SqlitePool) -> Result<Option<NaiveDate>> {
    let max: Option<String> = sqlx::query_scalar("SELECT MAX(starting_at) FROM fixtures")
        .fetch_one(pool)
        .await?;
    Ok(max.as_deref().and_then(|s| s.get(..10)).and_then(parse_date))
}

/// Ids of fixtures starting on/after `since` that lack `relation`, in kick-off order.
pub async fn fixtures_missing(
    pool: &SqlitePool,
    relation: ChildRelation,
    since: NaiveDate,
    limit: usize,
) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar(relation.missing_sql())
        .bind(since.format("%Y-%m-%d").to_string())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

/// Teams playing in fixtures on/after `since`.
pub async fn upcoming_team_ids(pool: &SqlitePool, since: NaiveDate) -> Result<Vec<i64>> {
    let since = since.format("%Y-%m-%d").to_string();
    let ids = sqlx::query_scalar(
        r#"
        SELECT home_team_id AS team_id FROM fixtures
        WHERE starting_at >= ? AND home_team_id IS NOT NULL
        UNION
        SELECT away_team_id FROM fixtures
        WHERE starting_at >= ? AND away_team_id IS NOT NULL
        ORDER BY team_id
        "#,
    )
    .bind(&since)
    .bind(&since)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// `(id, league_id)` of fixtures kicking off on `day`, in kick-off order.
pub async fn fixtures_on_day(pool: &SqlitePool, day: NaiveDate) -> Result<Vec<(i64, Option<i64>)>> {
    let rows = sqlx::query_as(
        r#"
        SELECT id, league_id FROM fixtures
        WHERE substr(starting_at, 1, 10) = ?
        ORDER BY starting_at, id
        "#,
    )
    .bind(day.format("%Y-%m-%d").to_string())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
