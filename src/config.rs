use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use chrono::{Days, NaiveDate};

use crate::error::{AppError, Result};

pub const API_BASE_URL: &str = "https://api.sportmonks.com/v3/football";

/// European leagues tracked by default (LEAGUE_IDS overrides).
pub const DEFAULT_LEAGUE_IDS: &[i64] = &[
    8, 9, 24, 27, 72, 82, 181, 208, 1371, 244, 271, 301, 384, 387, 390, 444, 453, 462, 486,
    501, 564, 567, 570, 573, 591, 600, 609,
];

/// Includes requested with every fixture page of the date-range sync.
pub const FIXTURE_INCLUDES: &str = "participants;scores;league;venue;state";

/// Includes requested when re-fetching a fixture for its live score and status.
pub const LIVE_INCLUDES: &str = "scores;participants;state";

/// Page size for list resources that are fetched whole (tv stations, leagues).
pub const REFERENCE_PAGE_SIZE: u32 = 100;

/// Fallback country for fixture/tv-station links that carry none.
pub const DEFAULT_LINK_COUNTRY_ID: i64 = 1;

/// How far forward the fixture window reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    /// A fixed last day (SYNC_HORIZON).
    Fixed(NaiveDate),
    /// A number of days after today (SYNC_HORIZON_DAYS).
    DaysAhead(u64),
}

impl Horizon {
    pub fn resolve(&self, today: NaiveDate) -> NaiveDate {
        match *self {
            Horizon::Fixed(d) => d,
            Horizon::DaysAhead(n) => today.checked_add_days(Days::new(n)).unwrap_or(today),
        }
    }
}

/// Retry policy for transient transport failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, doubling each time.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_token: String,
    pub api_base_url: String,
    pub log_level: String,
    pub db_path: String,
    /// Leagues of interest (LEAGUE_IDS, comma-separated). Empty keeps every league.
    pub league_ids: HashSet<i64>,
    pub horizon: Horizon,
    /// Fixtures per gap-fill batch and rows per upsert chunk (BATCH_SIZE)
    pub batch_size: usize,
    /// Records per requested page (PAGE_SIZE)
    pub page_size: u32,
    /// Hard ceiling on pages per paginated run (MAX_PAGES)
    pub max_pages: u32,
    /// Courtesy pause between consecutive API calls (REQUEST_DELAY_MS)
    pub request_delay: Duration,
    pub http_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_token = var("SPORTMONKS_API_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::Config("SPORTMONKS_API_TOKEN must be set".to_string()))?;

        let league_ids = match var("LEAGUE_IDS") {
            Some(raw) => parse_id_list(&raw)
                .map_err(|_| AppError::Config(format!("LEAGUE_IDS is not a list of ids: {raw}")))?
                .into_iter()
                .collect(),
            None => DEFAULT_LEAGUE_IDS.iter().copied().collect(),
        };

        let horizon = match var("SYNC_HORIZON") {
            Some(raw) => Horizon::Fixed(parse_date(&raw).ok_or_else(|| {
                AppError::Config(format!("SYNC_HORIZON must be YYYY-MM-DD, got {raw}"))
            })?),
            None => Horizon::DaysAhead(parsed(&var, "SYNC_HORIZON_DAYS", 90)?),
        };

        let batch_size: usize = parsed(&var, "BATCH_SIZE", 20)?;
        if batch_size == 0 {
            return Err(AppError::Config("BATCH_SIZE must be at least 1".to_string()));
        }

        Ok(Self {
            api_token,
            api_base_url: var("API_BASE_URL")
                .unwrap_or_else(|| API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            db_path: var("DB_PATH").unwrap_or_else(|| "fixtures.db".to_string()),
            league_ids,
            horizon,
            batch_size,
            page_size: parsed(&var, "PAGE_SIZE", 50)?,
            max_pages: parsed(&var, "MAX_PAGES", 100)?,
            request_delay: Duration::from_millis(parsed(&var, "REQUEST_DELAY_MS", 100)?),
            http_timeout: Duration::from_secs(parsed(&var, "HTTP_TIMEOUT_SECS", 30)?),
            retry: RetryPolicy {
                max_attempts: parsed::<u32, _>(&var, "RETRY_MAX_ATTEMPTS", 3)?.max(1),
                base_delay: Duration::from_millis(parsed(&var, "RETRY_BASE_DELAY_MS", 250)?),
            },
        })
    }

    pub fn keeps_league(&self, league_id: Option<i64>) -> bool {
        if self.league_ids.is_empty() {
            return true;
        }
        league_id.is_some_and(|id| self.league_ids.contains(&id))
    }
}

fn parsed<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}

/// Parse a comma-separated id list; blanks are ignored.
pub fn parse_id_list(raw: &str) -> std::result::Result<Vec<i64>, std::num::ParseIntError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<i64>)
        .collect()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
pub(crate) fn test_config(base_url: &str) -> Config {
    Config {
        api_token: "test-token".to_string(),
        api_base_url: base_url.to_string(),
        log_level: "debug".to_string(),
        db_path: ":memory:".to_string(),
        league_ids: HashSet::new(),
        horizon: Horizon::Fixed(NaiveDate::from_ymd_opt(2025, 8, 31).unwrap()),
        batch_size: 20,
        page_size: 50,
        max_pages: 100,
        request_delay: Duration::ZERO,
        http_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
        },
    }
}
