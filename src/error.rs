use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {path}")]
    Status { status: reqwest::StatusCode, path: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Transport failures worth another attempt: timeouts, refused
    /// connections, rate limiting and server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(is_transient_status)
            }
            AppError::Status { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }
}

fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
