//! Authoritative wall clock over HTTP
//!
//! Accepts the common public time-API shapes: `utc_datetime` (RFC 3339),
//! `dateTime` (naive, taken as UTC) or `unixtime` (seconds). Any failure
//! falls back to the host clock.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::application::ports::TimeSource;
use crate::shared::errors::InfraError;

pub struct HttpTimeSource {
    http: reqwest::Client,
    url: String,
}

impl HttpTimeSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, InfraError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    async fn fetch(&self) -> Result<DateTime<Utc>, InfraError> {
        let body: Value = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_time_payload(&body)
            .ok_or_else(|| InfraError::Config(format!("no usable time field in {}", body)))
    }
}

#[async_trait]
impl TimeSource for HttpTimeSource {
    async fn now(&self) -> DateTime<Utc> {
        match self.fetch().await {
            Ok(now) => {
                debug!(url = %self.url, %now, "Authoritative time fetched");
                now
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "Time source unavailable, using host clock");
                Utc::now()
            }
        }
    }
}

pub(crate) fn parse_time_payload(body: &Value) -> Option<DateTime<Utc>> {
    if let Some(s) = body.get("utc_datetime").and_then(Value::as_str) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    if let Some(s) = body.get("dateTime").and_then(Value::as_str) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(naive.and_utc());
        }
    }
    body.get("unixtime")
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}
