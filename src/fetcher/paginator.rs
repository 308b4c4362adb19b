use std::time::Duration;

use futures_util::stream::{self, Stream};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::fetcher::client::ApiClient;

/// Walks one paginated resource page by page.
///
/// Continuation is driven by the server's `has_more` flag and capped by
/// `max_pages`. A failed page ends the sequence; whatever was already
/// yielded stays with the caller. Each run starts from page 1, which is
/// why callers narrow `params` with a watermark rather than resuming.
pub struct Paginator<'a> {
    client: &'a ApiClient,
    path: String,
    params: Vec<(&'static str, String)>,
    max_pages: u32,
    delay: Duration,
    next_page: u32,
    done: bool,
}

impl<'a> Paginator<'a> {
    pub fn new(
        client: &'a ApiClient,
        path: impl Into<String>,
        params: Vec<(&'static str, String)>,
        max_pages: u32,
        delay: Duration,
    ) -> Self {
        Self {
            client,
            path: path.into(),
            params,
            max_pages,
            delay,
            next_page: 1,
            done: false,
        }
    }

    /// Rewind to page 1.
    pub fn restart(&mut self) {
        self.next_page = 1;
        self.done = false;
    }

    pub fn pages_fetched(&self) -> u32 {
        self.next_page - 1
    }

    /// Fetch the next page, or `None` once the source is exhausted, the
    /// ceiling is reached, or a page failed.
    pub async fn next_page(&mut self) -> Option<Vec<Value>> {
        if self.done || self.next_page > self.max_pages {
            self.done = true;
            return None;
        }

        let page = self.next_page;
        if page > 1 && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut params = self.params.clone();
        params.push(("page", page.to_string()));

        match self.client.get(&self.path, &params).await {
            Ok(envelope) => {
                self.next_page += 1;
                if !envelope.has_more() {
                    self.done = true;
                }
                let (reported_page, per_page) = envelope
                    .pagination
                    .as_ref()
                    .map_or((None, None), |p| (p.current_page, p.per_page));
                let records = envelope.into_records();
                debug!(
                    path = %self.path,
                    page,
                    ?reported_page,
                    ?per_page,
                    count = records.len(),
                    "[PAGE] fetched"
                );
                Some(records)
            }
            Err(e) => {
                error!(path = %self.path, page, "[PAGE] fetch failed, stopping: {e}");
                self.done = true;
                None
            }
        }
    }

    /// Walk every page from page 1 into one vector.
    pub async fn collect_all(&mut self) -> Vec<Value> {
        self.restart();
        let mut all = Vec::new();
        while let Some(batch) = self.next_page().await {
            all.extend(batch);
        }
        info!(
            path = %self.path,
            pages = self.pages_fetched(),
            records = all.len(),
            "[PAGE] {} complete: {} records over {} pages",
            self.path,
            all.len(),
            self.pages_fetched(),
        );
        all
    }

    /// The same sequence as a `Stream` of page batches.
    pub fn into_stream(self) -> impl Stream<Item = Vec<Value>> + 'a {
        stream::unfold(self, |mut pager| async move {
            let batch = pager.next_page().await?;
            Some((batch, pager))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use futures_util::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_page(server: &MockServer, page: u32, has_more: bool) {
        Mock::given(method("GET"))
            .and(path("/tvstations"))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": page * 10}, {"id": page * 10 + 1}],
                "pagination": {"count": 2, "per_page": 2, "current_page": page, "has_more": has_more}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn stops_when_has_more_is_false() {
        let server = MockServer::start().await;
        mount_page(&server, 1, true).await;
        mount_page(&server, 2, true).await;
        mount_page(&server, 3, false).await;
        mount_page(&server, 4, false).await;

        let client = ApiClient::new(&test_config(&server.uri())).unwrap();
        let pager = Paginator::new(&client, "tvstations", vec![], 100, Duration::ZERO);
        let batches: Vec<_> = pager.into_stream().collect().await;

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2], vec![json!({"id": 30}), json!({"id": 31})]);
    }

    #[tokio::test]
    async fn page_ceiling_caps_the_sequence() {
        let server = MockServer::start().await;
        for page in 1..=5 {
            mount_page(&server, page, true).await;
        }

        let client = ApiClient::new(&test_config(&server.uri())).unwrap();
        let pager = Paginator::new(&client, "tvstations", vec![], 2, Duration::ZERO);
        let batches: Vec<_> = pager.into_stream().collect().await;
        assert_eq!(batches.len(), 2);
    }

    #[tokio::test]
    async fn error_page_ends_sequence_keeping_earlier_pages() {
        let server = MockServer::start().await;
        mount_page(&server, 1, true).await;
        Mock::given(method("GET"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = ApiClient::new(&test_config(&server.uri())).unwrap();
        let mut pager = Paginator::new(&client, "tvstations", vec![], 100, Duration::ZERO);
        let all = pager.collect_all().await;
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn single_object_page_is_one_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 42}})))
            .mount(&server)
            .await;

        let client = ApiClient::new(&test_config(&server.uri())).unwrap();
        let mut pager = Paginator::new(&client, "tvstations", vec![], 100, Duration::ZERO);
        assert_eq!(pager.next_page().await, Some(vec![json!({"id": 42})]));
        assert_eq!(pager.next_page().await, None);
    }

    #[tokio::test]
    async fn restart_begins_again_at_page_one() {
        let server = MockServer::start().await;
        mount_page(&server, 1, false).await;

        let client = ApiClient::new(&test_config(&server.uri())).unwrap();
        let mut pager = Paginator::new(&client, "tvstations", vec![], 100, Duration::ZERO);
        assert!(pager.next_page().await.is_some());
        assert!(pager.next_page().await.is_none());

        pager.restart();
        assert_eq!(pager.next_page().await.map(|b| b.len()), Some(2));
        assert_eq!(pager.collect_all().await.len(), 2);
        assert_eq!(pager.collect_all().await.len(), 2);
    }

    #[tokio::test]
    async fn forwards_params_on_every_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fixtures/between/2025-06-11/2025-08-31"))
            .and(query_param("per_page", "50"))
            .and(query_param("include", "participants"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": 1}]})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&test_config(&server.uri())).unwrap();
        let mut pager = Paginator::new(
            &client,
            "fixtures/between/2025-06-11/2025-08-31",
            vec![("per_page", "50".to_string()), ("include", "participants".to_string())],
            100,
            Duration::ZERO,
        );
        assert_eq!(pager.collect_all().await.len(), 1);
    }
}
