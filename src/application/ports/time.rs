//! Authoritative time port

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of "true" UTC time for device clock checks.
///
/// Implementations must always answer; an unreachable upstream falls back to
/// the host clock.
#[async_trait]
pub trait TimeSource: Send + Sync {
    async fn now(&self) -> DateTime<Utc>;
}

/// Host clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

#[async_trait]
impl TimeSource for SystemTimeSource {
    async fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
