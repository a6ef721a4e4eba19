//! jsonPTS HTTP client
//!
//! Controllers expose the jsonPTS endpoint under different paths depending
//! on firmware. The client probes the candidate paths in order with
//! `GetDateTime`, keeps the first that answers and forgets it after any
//! transport failure so the next call rediscovers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::packets::{request, unwrap_response, GET_DATE_TIME};
use crate::application::ports::{AdapterError, AdapterResult};
use crate::shared::utills::retry::{retry_with_backoff, RetryConfig};

pub const DEFAULT_CANDIDATE_PATHS: &[&str] = &["/jsonPTS", "/api/jsonPTS", "/jsonPTS/"];

#[derive(Debug, Clone)]
pub struct PtsClientConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub candidate_paths: Vec<String>,
    /// Per-attempt timeout
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for PtsClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://192.168.1.117".to_string(),
            username: Some("admin".to_string()),
            password: Some("admin".to_string()),
            candidate_paths: DEFAULT_CANDIDATE_PATHS.iter().map(|p| p.to_string()).collect(),
            request_timeout: Duration::from_secs(8),
            retry: RetryConfig::linear(3, Duration::from_secs(2), Duration::from_secs(6)),
        }
    }
}

pub struct PtsClient {
    http: reqwest::Client,
    config: PtsClientConfig,
    active_path: RwLock<Option<String>>,
    next_packet_id: AtomicU32,
}

impl PtsClient {
    pub fn new(config: PtsClientConfig) -> AdapterResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AdapterError::Transport(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            config,
            active_path: RwLock::new(None),
            next_packet_id: AtomicU32::new(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub async fn active_path(&self) -> Option<String> {
        self.active_path.read().await.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// One HTTP round trip, no retry.
    async fn post(&self, path: &str, packet_type: &str, data: Option<Value>) -> AdapterResult<Value> {
        let id = self.next_packet_id.fetch_add(1, Ordering::Relaxed);
        let body = request(id, packet_type, data);

        let mut req = self.http.post(self.url(path)).json(&body);
        if let Some(user) = &self.config.username {
            req = req.basic_auth(user, self.config.password.as_deref());
        }

        let response = req
            .send()
            .await
            .map_err(|e| AdapterError::Transport(format!("{packet_type}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Transport(format!(
                "{packet_type}: HTTP {status} from {path}"
            )));
        }
        let json: Value = response
            .json()
            .await
            .map_err(|e| AdapterError::Protocol(format!("{packet_type}: body is not JSON: {e}")))?;

        unwrap_response(packet_type, json).map_err(|e| AdapterError::Protocol(e.to_string()))
    }

    /// Probe the candidate paths in order; the first that answers
    /// `GetDateTime` becomes the active path.
    pub async fn discover(&self) -> AdapterResult<String> {
        for path in &self.config.candidate_paths {
            match self.post(path, GET_DATE_TIME, None).await {
                Ok(_) => {
                    info!(base_url = %self.config.base_url, path = %path, "🔎 jsonPTS endpoint discovered");
                    *self.active_path.write().await = Some(path.clone());
                    return Ok(path.clone());
                }
                Err(e) => {
                    debug!(base_url = %self.config.base_url, path = %path, error = %e, "Candidate path rejected");
                }
            }
        }
        Err(AdapterError::Transport(format!(
            "no jsonPTS endpoint answered at {}",
            self.config.base_url
        )))
    }

    async fn resolve_path(&self) -> AdapterResult<String> {
        if let Some(path) = self.active_path().await {
            return Ok(path);
        }
        self.discover().await
    }

    /// Send one packet with bounded retry.
    ///
    /// Only transport failures are retried; a controller-side rejection is
    /// returned immediately.
    pub async fn call(&self, packet_type: &str, data: Option<Value>) -> AdapterResult<Value> {
        retry_with_backoff(
            self.config.retry.clone(),
            || {
                let data = data.clone();
                async move {
                    let path = self.resolve_path().await?;
                    match self.post(&path, packet_type, data).await {
                        Err(e) if e.is_transport() => {
                            warn!(path = %path, error = %e, "jsonPTS transport failure, forgetting endpoint");
                            *self.active_path.write().await = None;
                            Err(e)
                        }
                        other => other,
                    }
                }
            },
            AdapterError::is_transport,
            packet_type,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn config(base_url: String) -> PtsClientConfig {
        PtsClientConfig {
            base_url,
            username: Some("user".into()),
            password: Some("pass".into()),
            retry: RetryConfig::linear(3, Duration::from_millis(10), Duration::from_millis(30)),
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    fn date_time_body() -> String {
        json!({"Protocol": "jsonPTS", "Packets": [{"Id": 1, "Type": "GetDateTime",
            "Data": {"DateTime": "2024-01-15T10:00:00", "UTCOffset": 3}}]})
        .to_string()
    }

    #[tokio::test]
    async fn discovery_falls_through_to_second_path() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("POST", "/jsonPTS")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/api/jsonPTS")
            .match_header("authorization", "Basic dXNlcjpwYXNz")
            .match_body(Matcher::Regex(r#""Type":"GetDateTime""#.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(date_time_body())
            .expect(2)
            .create_async()
            .await;

        let client = PtsClient::new(config(server.url())).unwrap();
        assert_eq!(client.discover().await.unwrap(), "/api/jsonPTS");
        assert_eq!(client.active_path().await.as_deref(), Some("/api/jsonPTS"));

        // cached path is used directly
        let data = client.call(GET_DATE_TIME, None).await.unwrap();
        assert_eq!(data["UTCOffset"], 3);

        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn transport_failures_retry_then_give_up() {
        let mut server = Server::new_async().await;
        let failing = server
            .mock("POST", Matcher::Any)
            .with_status(500)
            .expect(9)
            .create_async()
            .await;

        let client = PtsClient::new(config(server.url())).unwrap();
        let err = client.call(GET_DATE_TIME, None).await.unwrap_err();
        assert!(err.is_transport());
        assert!(client.active_path().await.is_none());

        // 3 attempts × 3 candidate paths
        failing.assert_async().await;
    }

    #[tokio::test]
    async fn controller_rejection_is_not_retried() {
        let mut server = Server::new_async().await;
        let _discovery = server
            .mock("POST", "/jsonPTS")
            .match_body(Matcher::Regex(r#""Type":"GetDateTime""#.into()))
            .with_status(200)
            .with_body(date_time_body())
            .create_async()
            .await;
        let rejected = server
            .mock("POST", "/jsonPTS")
            .match_body(Matcher::Regex(r#""Type":"ProbeGetMeasurements""#.into()))
            .with_status(200)
            .with_body(
                json!({"Packets": [{"Id": 2, "Type": "ProbeGetMeasurements", "Error": true, "Message": "Probe is not configured"}]})
                    .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let client = PtsClient::new(config(server.url())).unwrap();
        let err = client
            .call("ProbeGetMeasurements", Some(json!({"Probe": 9})))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Protocol(_)));
        assert_eq!(client.active_path().await.as_deref(), Some("/jsonPTS"));
        rejected.assert_async().await;
    }
}
