/// Row types for the tables created in `migrations/`.
/// Mappers produce them, `writer` upserts them, tests read them back via sqlx.

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CountryRow {
    pub id: i64,
    pub name: String,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LeagueRow {
    pub id: i64,
    pub name: String,
    pub sport_id: Option<i64>,
    pub country_id: Option<i64>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TeamRow {
    pub id: i64,
    pub name: String,
    pub short_code: Option<String>,
    pub country_id: Option<i64>,
    pub venue_id: Option<i64>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct FixtureRow {
    pub id: i64,
    pub league_id: Option<i64>,
    pub season_id: Option<i64>,
    pub round_id: Option<i64>,
    pub venue_id: Option<i64>,
    pub home_team_id: Option<i64>,
    pub away_team_id: Option<i64>,
    pub name: Option<String>,
    /// `YYYY-MM-DD HH:MM:SS`, UTC, as the API reports it.
    pub starting_at: Option<String>,
    pub starting_at_timestamp: Option<i64>,
    pub has_odds: Option<bool>,
    pub has_premium_odds: Option<bool>,
    /// Match status flag.
    pub state_id: Option<i64>,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct BookmakerRow {
    pub id: i64,
    pub name: String,
    pub url: Option<String>,
    pub image_path: Option<String>,
    /// Placeholder known only by id; never overwrites a full row.
    #[sqlx(skip)]
    pub stub: bool,
}

impl BookmakerRow {
    pub fn stub(id: i64) -> Self {
        Self {
            id,
            name: format!("Bookmaker {id}"),
            url: None,
            image_path: None,
            stub: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct OddRow {
    pub id: i64,
    pub fixture_id: i64,
    pub bookmaker_id: Option<i64>,
    pub market_id: Option<i64>,
    pub label: Option<String>,
    pub value: Option<String>,
    pub probability: Option<String>,
    pub latest_bookmaker_update: Option<String>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TvStationRow {
    pub id: i64,
    pub name: String,
    pub url: Option<String>,
    pub image_path: Option<String>,
    #[sqlx(rename = "type")]
    pub kind: Option<String>,
    #[sqlx(skip)]
    pub stub: bool,
}

impl TvStationRow {
    pub fn stub(id: i64) -> Self {
        Self {
            id,
            name: format!("TV station {id}"),
            url: None,
            image_path: None,
            kind: None,
            stub: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct FixtureTvStationRow {
    pub fixture_id: i64,
    pub tvstation_id: i64,
    pub country_id: Option<i64>,
}
