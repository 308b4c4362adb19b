use tracing::{debug, warn};

use crate::config::{Config, RetryPolicy};
use crate::error::{AppError, Result};
use crate::fetcher::envelope::Envelope;

/// Thin authenticated GET wrapper around the SportMonks football API.
/// The token rides along as the `api_token` query parameter and is never logged.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.http_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.api_base_url.clone(),
            token: cfg.api_token.clone(),
            retry: cfg.retry,
        })
    }

    /// GET `path` with `params`, retrying transient failures with
    /// exponential backoff. Non-2xx statuses become `AppError::Status`.
    pub async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Envelope> {
        let mut attempt = 1;
        loop {
            match self.get_once(path, params).await {
                Ok(envelope) => return Ok(envelope),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        path,
                        attempt,
                        "[API] transient failure, retrying in {}ms: {e}",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Single-resource lookup, e.g. `fixtures/{id}` with an include list.
    pub async fn get_one(&self, path: &str, include: Option<&str>) -> Result<Option<serde_json::Value>> {
        let params: Vec<(&str, String)> = include
            .map(|inc| vec![("include", inc.to_string())])
            .unwrap_or_default();
        Ok(self.get(path, &params).await?.into_object())
    }

    async fn get_once(&self, path: &str, params: &[(&str, String)]) -> Result<Envelope> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(path, "[API] GET");

        let resp = self
            .http
            .get(&url)
            .query(&[("api_token", self.token.as_str())])
            .query(params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Status {
                status,
                path: path.to_string(),
            });
        }

        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_token_and_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/leagues/501"))
            .and(query_param("api_token", "test-token"))
            .and(query_param("include", "country"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 501}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&test_config(&server.uri())).unwrap();
        let league = client.get_one("leagues/501", Some("country")).await.unwrap();
        assert_eq!(league, Some(json!({"id": 501})));
    }

    #[tokio::test]
    async fn retries_transient_status_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tvstations"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tvstations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": 1}]})))
            .mount(&server)
            .await;

        let client = ApiClient::new(&test_config(&server.uri())).unwrap();
        let envelope = client.get("tvstations", &[]).await.unwrap();
        assert_eq!(envelope.into_records().len(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let client = ApiClient::new(&test_config(&server.uri())).unwrap();
        let err = client.get("tvstations", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Status { status, .. } if status.as_u16() == 500));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&test_config(&server.uri())).unwrap();
        let err = client.get("fixtures/1", &[]).await.unwrap_err();
        assert!(!err.is_transient());
    }
}
