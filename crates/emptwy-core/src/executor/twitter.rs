//! ============================================================================
//! Twitter Executor - Timeline Reads and Status Deletion (REST v1)
//! ============================================================================
//! Typed operations on top of an AuthorizedClient:
//! - Fetch one page of a user timeline
//! - Destroy a single status
//! Every call is signed with OAuth 1.0a; a status outside [200, 400) is
//! reported as EmptwyError::Response.
//! ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::{AuthorizedClient, RawResponse};
use crate::types::{is_success_status, EmptwyError, Result, Status, StatusId, TimelineQuery};

/// Twitter REST API v1 root
pub const DEFAULT_API_BASE_URL: &str = "http://api.twitter.com/1";

/// HTTP settings shared by the handshake and the executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Per-request timeout; None waits forever
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    format!("emptwy/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }
}

impl ApiConfig {
    /// Build the reqwest client described by this config
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().user_agent(self.user_agent.clone());
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(builder.build()?)
    }
}

/// The two timeline operations the deletion pipeline needs
#[async_trait]
pub trait StatusApi: Send + Sync {
    /// Fetch one page. Validates the query before any request is made.
    async fn fetch_timeline(&self, query: &TimelineQuery) -> Result<Vec<Status>>;

    async fn destroy_status(&self, id: StatusId) -> Result<()>;
}

/// Executor for Twitter timeline operations
#[derive(Debug, Clone)]
pub struct TwitterExecutor {
    client: AuthorizedClient,
    base_url: String,
}

impl TwitterExecutor {
    pub fn new(client: AuthorizedClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn timeline_url(&self) -> String {
        format!("{}/statuses/user_timeline.json", self.base_url)
    }

    pub fn destroy_url(&self, id: StatusId) -> String {
        format!("{}/statuses/destroy/{}.json", self.base_url, id)
    }

    async fn call(
        &self,
        method: Method,
        url: &str,
        params: &[(String, String)],
    ) -> Result<String> {
        debug!("Requesting {} {}", method, url);
        let RawResponse { status, body } = self.client.request(method, url, params).await?;

        if !is_success_status(status) {
            return Err(EmptwyError::Response { status });
        }
        Ok(body)
    }
}

#[async_trait]
impl StatusApi for TwitterExecutor {
    async fn fetch_timeline(&self, query: &TimelineQuery) -> Result<Vec<Status>> {
        let params = query.to_params()?;
        let body = self.call(Method::GET, &self.timeline_url(), &params).await?;

        let statuses: Vec<Status> = serde_json::from_str(&body)
            .map_err(|e| EmptwyError::Parse(format!("timeline response: {}", e)))?;

        info!(
            "Fetched {} statuses of {} (page {})",
            statuses.len(),
            query.screen_name,
            query.page
        );
        Ok(statuses)
    }

    async fn destroy_status(&self, id: StatusId) -> Result<()> {
        let body = self.call(Method::POST, &self.destroy_url(id), &[]).await?;

        // The deleted status is echoed back; only its well-formedness matters
        serde_json::from_str::<serde_json::Value>(&body)
            .map_err(|e| EmptwyError::Parse(format!("destroy response for {}: {}", id, e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AccessToken, ConsumerCredentials};
    use wiremock::{
        matchers::{header_exists, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn executor_for(server: &MockServer) -> TwitterExecutor {
        let client = AuthorizedClient::new(
            ConsumerCredentials::new("ck", "cs"),
            AccessToken::new("abc", "xyz"),
        );
        TwitterExecutor::new(client, format!("{}/1/", server.uri()))
    }

    #[test]
    fn test_endpoint_urls() {
        let client = AuthorizedClient::new(
            ConsumerCredentials::new("ck", "cs"),
            AccessToken::new("abc", "xyz"),
        );
        let executor = TwitterExecutor::new(client, DEFAULT_API_BASE_URL);
        assert_eq!(
            executor.timeline_url(),
            "http://api.twitter.com/1/statuses/user_timeline.json"
        );
        assert_eq!(
            executor.destroy_url(1234567890123),
            "http://api.twitter.com/1/statuses/destroy/1234567890123.json"
        );
    }

    #[test]
    fn test_api_config_default() {
        let config = ApiConfig::default();
        assert_eq!(config.base_url, DEFAULT_API_BASE_URL);
        assert!(config.timeout_secs.is_none());
        assert!(config.user_agent.starts_with("emptwy/"));
        assert!(config.http_client().is_ok());
    }

    #[tokio::test]
    async fn test_fetch_timeline_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/1/statuses/user_timeline.json"))
            .and(query_param("screen_name", "jack"))
            .and(query_param("trim_user", "1"))
            .and(query_param("count", "3"))
            .and(query_param("page", "2"))
            .and(query_param("include_rts", "0"))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 101, "text": "one"},
                {"id": 102, "text": "two"},
                {"id": 103, "text": "three"}
            ])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let query = TimelineQuery::new("jack").page(2).count(3).include_retweets(false);
        let statuses = executor_for(&mock_server)
            .fetch_timeline(&query)
            .await
            .unwrap();

        let ids: Vec<StatusId> = statuses.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![101, 102, 103]);

        let requests = mock_server.received_requests().await.unwrap();
        let names: Vec<String> = requests[0]
            .url
            .query_pairs()
            .map(|(k, _)| k.into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["screen_name", "trim_user", "count", "page", "include_rts"]
        );
    }

    #[tokio::test]
    async fn test_fetch_timeline_invalid_query_makes_no_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(0)
            .mount(&mock_server)
            .await;

        let executor = executor_for(&mock_server);
        for query in [
            TimelineQuery::new("jack").count(0),
            TimelineQuery::new("jack").count(201),
            TimelineQuery::new("jack").page(-1),
        ] {
            let err = executor.fetch_timeline(&query).await.unwrap_err();
            assert!(matches!(err, EmptwyError::Validation(_)));
        }

        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_timeline_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/1/statuses/user_timeline.json"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "Not authorized"
            })))
            .mount(&mock_server)
            .await;

        let err = executor_for(&mock_server)
            .fetch_timeline(&TimelineQuery::new("jack"))
            .await
            .unwrap_err();
        assert!(matches!(err, EmptwyError::Response { status: 401 }));
    }

    #[tokio::test]
    async fn test_fetch_timeline_bad_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/1/statuses/user_timeline.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"text": "no id here"}
            ])))
            .mount(&mock_server)
            .await;

        let err = executor_for(&mock_server)
            .fetch_timeline(&TimelineQuery::new("jack"))
            .await
            .unwrap_err();
        assert!(matches!(err, EmptwyError::Parse(_)));
    }

    #[tokio::test]
    async fn test_destroy_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/1/statuses/destroy/101.json"))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 101
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/1/statuses/destroy/102.json"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&mock_server)
            .await;

        let executor = executor_for(&mock_server);
        executor.destroy_status(101).await.unwrap();

        let err = executor.destroy_status(102).await.unwrap_err();
        assert!(matches!(err, EmptwyError::Response { status: 503 }));
        assert!(err.is_transient());
    }
}
