use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, SqlitePool};
use tracing::{error, info};

use crate::db::models::{
    BookmakerRow, CountryRow, FixtureRow, FixtureTvStationRow, LeagueRow, OddRow, TeamRow,
    TvStationRow,
};
use crate::error::Result;

pub type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// A row that knows its own insert-or-update statement.
///
/// Statements key on the primary id and overwrite every non-key column on
/// conflict, so replaying a row is a no-op. Nullable parent references are
/// resolved with a sub-select, which stores NULL when the parent is absent
/// instead of tripping the foreign key.
pub trait Upsert: Sync {
    fn upsert(&self) -> SqliteQuery<'_>;
}

impl Upsert for CountryRow {
    fn upsert(&self) -> SqliteQuery<'_> {
        sqlx::query(
            r#"
            INSERT INTO countries (id, name, image_path)
            VALUES (?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                image_path = excluded.image_path
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.image_path)
    }
}

impl Upsert for LeagueRow {
    fn upsert(&self) -> SqliteQuery<'_> {
        sqlx::query(
            r#"
            INSERT INTO leagues (id, name, sport_id, country_id, image_path)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                sport_id = excluded.sport_id,
                country_id = excluded.country_id,
                image_path = excluded.image_path
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(self.sport_id)
        .bind(self.country_id)
        .bind(&self.image_path)
    }
}

impl Upsert for TeamRow {
    fn upsert(&self) -> SqliteQuery<'_> {
        sqlx::query(
            r#"
            INSERT INTO teams (id, name, short_code, country_id, venue_id, image_path)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                short_code = excluded.short_code,
                country_id = excluded.country_id,
                venue_id = excluded.venue_id,
                image_path = excluded.image_path
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.short_code)
        .bind(self.country_id)
        .bind(self.venue_id)
        .bind(&self.image_path)
    }
}

impl Upsert for FixtureRow {
    fn upsert(&self) -> SqliteQuery<'_> {
        sqlx::query(
            r#"
            INSERT INTO fixtures (
                id, league_id, season_id, round_id, venue_id,
                home_team_id, away_team_id, name, starting_at, starting_at_timestamp,
                has_odds, has_premium_odds, state_id, home_score, away_score
            ) VALUES (
                ?, (SELECT id FROM leagues WHERE id = ?), ?, ?, ?,
                (SELECT id FROM teams WHERE id = ?), (SELECT id FROM teams WHERE id = ?),
                ?, ?, ?, ?, ?, ?, ?, ?
            )
            ON CONFLICT (id) DO UPDATE SET
                league_id = excluded.league_id,
                season_id = excluded.season_id,
                round_id = excluded.round_id,
                venue_id = excluded.venue_id,
                home_team_id = excluded.home_team_id,
                away_team_id = excluded.away_team_id,
                name = excluded.name,
                starting_at = excluded.starting_at,
                starting_at_timestamp = excluded.starting_at_timestamp,
                has_odds = excluded.has_odds,
                has_premium_odds = excluded.has_premium_odds,
                state_id = excluded.state_id,
                home_score = excluded.home_score,
                away_score = excluded.away_score
            "#,
        )
        .bind(self.id)
        .bind(self.league_id)
        .bind(self.season_id)
        .bind(self.round_id)
        .bind(self.venue_id)
        .bind(self.home_team_id)
        .bind(self.away_team_id)
        .bind(&self.name)
        .bind(&self.starting_at)
        .bind(self.starting_at_timestamp)
        .bind(self.has_odds)
        .bind(self.has_premium_odds)
        .bind(self.state_id)
        .bind(self.home_score)
        .bind(self.away_score)
    }
}

impl Upsert for BookmakerRow {
    fn upsert(&self) -> SqliteQuery<'_> {
        let sql = if self.stub {
            r#"
            INSERT INTO bookmakers (id, name, url, image_path)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (id) DO NOTHING
            "#
        } else {
            r#"
            INSERT INTO bookmakers (id, name, url, image_path)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                url = excluded.url,
                image_path = excluded.image_path
            "#
        };
        sqlx::query(sql)
            .bind(self.id)
            .bind(&self.name)
            .bind(&self.url)
            .bind(&self.image_path)
    }
}

impl Upsert for OddRow {
    fn upsert(&self) -> SqliteQuery<'_> {
        sqlx::query(
            r#"
            INSERT INTO odds (
                id, fixture_id, bookmaker_id, market_id, label,
                value, probability, latest_bookmaker_update
            ) VALUES (?, ?, (SELECT id FROM bookmakers WHERE id = ?), ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                fixture_id = excluded.fixture_id,
                bookmaker_id = excluded.bookmaker_id,
                market_id = excluded.market_id,
                label = excluded.label,
                value = excluded.value,
                probability = excluded.probability,
                latest_bookmaker_update = excluded.latest_bookmaker_update
            "#,
        )
        .bind(self.id)
        .bind(self.fixture_id)
        .bind(self.bookmaker_id)
        .bind(self.market_id)
        .bind(&self.label)
        .bind(&self.value)
        .bind(&self.probability)
        .bind(&self.latest_bookmaker_update)
    }
}

impl Upsert for TvStationRow {
    fn upsert(&self) -> SqliteQuery<'_> {
        let sql = if self.stub {
            r#"
            INSERT INTO tvstations (id, name, url, image_path, type)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (id) DO NOTHING
            "#
        } else {
            r#"
            INSERT INTO tvstations (id, name, url, image_path, type)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                url = excluded.url,
                image_path = excluded.image_path,
                type = excluded.type
            "#
        };
        sqlx::query(sql)
            .bind(self.id)
            .bind(&self.name)
            .bind(&self.url)
            .bind(&self.image_path)
            .bind(&self.kind)
    }
}

impl Upsert for FixtureTvStationRow {
    fn upsert(&self) -> SqliteQuery<'_> {
        sqlx::query(
            r#"
            INSERT INTO fixture_tvstations (fixture_id, tvstation_id, country_id)
            VALUES (?, ?, ?)
            ON CONFLICT (fixture_id, tvstation_id) DO UPDATE SET
                country_id = excluded.country_id
            "#,
        )
        .bind(self.fixture_id)
        .bind(self.tvstation_id)
        .bind(self.country_id)
    }
}

/// Ordered set of rows written in one transaction. Push parents before
/// their children.
#[derive(Default)]
pub struct UpsertBatch<'a> {
    rows: Vec<&'a dyn Upsert>,
}

impl<'a> UpsertBatch<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend<R: Upsert>(&mut self, rows: &'a [R]) {
        self.rows.extend(rows.iter().map(|r| r as &dyn Upsert));
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Owns the single connection pool and applies batches all-or-nothing.
#[derive(Debug, Clone)]
pub struct DbWriter {
    pool: SqlitePool,
}

impl DbWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Execute every row of `batch` inside one transaction. Any failure
    /// drops the transaction, which rolls the whole batch back.
    pub async fn write_batch(&self, batch: &UpsertBatch<'_>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for row in &batch.rows {
            row.upsert().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(batch.len())
    }

    /// `write_batch`, with the failure logged rather than returned.
    pub async fn persist(&self, label: &str, batch: &UpsertBatch<'_>) -> Option<usize> {
        match self.write_batch(batch).await {
            Ok(written) => {
                info!(table = label, rows = written, "[DB] upserted {written} {label} rows");
                Some(written)
            }
            Err(e) => {
                error!(table = label, rows = batch.len(), "[DB] batch rolled back: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn odd(id: i64, fixture_id: i64) -> OddRow {
        OddRow {
            id,
            fixture_id,
            bookmaker_id: Some(2),
            market_id: Some(1),
            label: Some("Home".to_string()),
            value: Some("2.10".to_string()),
            probability: Some("47.62%".to_string()),
            latest_bookmaker_update: Some("2025-06-10 12:00:00".to_string()),
        }
    }

    fn fixture(id: i64) -> FixtureRow {
        FixtureRow {
            id,
            league_id: Some(501),
            season_id: Some(1),
            round_id: None,
            venue_id: None,
            home_team_id: Some(10),
            away_team_id: Some(11),
            name: Some(format!("Fixture {id}")),
            starting_at: Some("2025-07-01 15:00:00".to_string()),
            starting_at_timestamp: Some(1_751_382_000),
            has_odds: Some(true),
            has_premium_odds: Some(false),
            state_id: Some(1),
            home_score: None,
            away_score: None,
        }
    }

    async fn count(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn missing_parents_are_nulled_not_fatal() {
        let writer = DbWriter::new(test_pool().await);
        let fixtures = vec![fixture(1)];
        let mut batch = UpsertBatch::new();
        batch.extend(&fixtures);

        assert_eq!(writer.write_batch(&batch).await.unwrap(), 1);

        let row: FixtureRow = sqlx::query_as("SELECT * FROM fixtures WHERE id = 1")
            .fetch_one(writer.pool())
            .await
            .unwrap();
        assert_eq!(row.league_id, None);
        assert_eq!(row.home_team_id, None);
        assert_eq!(row.away_team_id, None);
        assert_eq!(row.name.as_deref(), Some("Fixture 1"));
    }

    #[tokio::test]
    async fn parents_in_the_same_batch_are_kept() {
        let writer = DbWriter::new(test_pool().await);
        let league = LeagueRow {
            id: 501,
            name: "Premiership".to_string(),
            sport_id: Some(1),
            country_id: Some(1161),
            image_path: None,
        };
        let teams: Vec<TeamRow> = [10, 11]
            .into_iter()
            .map(|id| TeamRow {
                id,
                name: format!("Team {id}"),
                short_code: None,
                country_id: None,
                venue_id: None,
                image_path: None,
            })
            .collect();
        let fixtures = vec![fixture(1)];

        let mut batch = UpsertBatch::new();
        batch.extend(std::slice::from_ref(&league));
        batch.extend(&teams);
        batch.extend(&fixtures);
        writer.write_batch(&batch).await.unwrap();

        let row: FixtureRow = sqlx::query_as("SELECT * FROM fixtures WHERE id = 1")
            .fetch_one(writer.pool())
            .await
            .unwrap();
        assert_eq!(row.league_id, Some(501));
        assert_eq!(row.home_team_id, Some(10));
        assert_eq!(row.away_team_id, Some(11));
    }

    #[tokio::test]
    async fn persisting_twice_is_idempotent() {
        let writer = DbWriter::new(test_pool().await);
        let fixtures = vec![fixture(1), fixture(2)];
        let bookmakers = vec![BookmakerRow::stub(2)];
        let odds = vec![odd(100, 1), odd(101, 2)];

        let mut batch = UpsertBatch::new();
        batch.extend(&fixtures);
        batch.extend(&bookmakers);
        batch.extend(&odds);

        writer.write_batch(&batch).await.unwrap();
        let first: Vec<OddRow> = sqlx::query_as("SELECT * FROM odds ORDER BY id")
            .fetch_all(writer.pool())
            .await
            .unwrap();

        writer.write_batch(&batch).await.unwrap();
        let second: Vec<OddRow> = sqlx::query_as("SELECT * FROM odds ORDER BY id")
            .fetch_all(writer.pool())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(count(writer.pool(), "fixtures").await, 2);
        assert_eq!(count(writer.pool(), "bookmakers").await, 1);
    }

    #[tokio::test]
    async fn conflict_overwrites_mutable_columns() {
        let writer = DbWriter::new(test_pool().await);
        let before = vec![fixture(1)];
        let mut batch = UpsertBatch::new();
        batch.extend(&before);
        writer.write_batch(&batch).await.unwrap();

        let mut changed = fixture(1);
        changed.home_score = Some(2);
        changed.away_score = Some(1);
        changed.state_id = Some(5);
        let after = vec![changed];
        let mut batch = UpsertBatch::new();
        batch.extend(&after);
        writer.write_batch(&batch).await.unwrap();

        let row: FixtureRow = sqlx::query_as("SELECT * FROM fixtures WHERE id = 1")
            .fetch_one(writer.pool())
            .await
            .unwrap();
        assert_eq!((row.home_score, row.away_score, row.state_id), (Some(2), Some(1), Some(5)));
    }

    #[tokio::test]
    async fn failing_record_rolls_back_the_whole_batch() {
        let writer = DbWriter::new(test_pool().await);
        let fixtures = vec![fixture(1)];
        let mut setup = UpsertBatch::new();
        setup.extend(&fixtures);
        writer.write_batch(&setup).await.unwrap();

        // record 7 of 10 points at a fixture that does not exist
        let odds: Vec<OddRow> = (1..=10)
            .map(|i| odd(i, if i == 7 { 999 } else { 1 }))
            .collect();
        let mut batch = UpsertBatch::new();
        batch.extend(&odds);

        assert!(writer.write_batch(&batch).await.is_err());
        assert_eq!(writer.persist("odds", &batch).await, None);
        assert_eq!(count(writer.pool(), "odds").await, 0);
    }

    #[tokio::test]
    async fn stub_never_overwrites_a_full_row() {
        let writer = DbWriter::new(test_pool().await);
        let full = vec![BookmakerRow {
            id: 2,
            name: "bet365".to_string(),
            url: Some("https://www.bet365.com".to_string()),
            image_path: None,
            stub: false,
        }];
        let stubs = vec![BookmakerRow::stub(2), BookmakerRow::stub(3)];

        let mut batch = UpsertBatch::new();
        batch.extend(&full);
        batch.extend(&stubs);
        writer.write_batch(&batch).await.unwrap();

        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM bookmakers ORDER BY id")
            .fetch_all(writer.pool())
            .await
            .unwrap();
        assert_eq!(names, vec!["bet365".to_string(), "Bookmaker 3".to_string()]);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let writer = DbWriter::new(test_pool().await);
        assert_eq!(writer.persist("odds", &UpsertBatch::new()).await, Some(0));
    }
}
