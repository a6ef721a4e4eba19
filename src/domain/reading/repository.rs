//! Tank reading repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::TankReading;
use crate::domain::DomainResult;

/// Readings are keyed by `(tank_id, timestamp)`.
///
/// Range queries are half-open: `from <= timestamp < to`, ascending.
#[async_trait]
pub trait ReadingRepository: Send + Sync {
    /// Insert, or overwrite the values of the reading with the same key.
    async fn upsert(&self, reading: TankReading) -> DomainResult<()>;
    async fn latest_for_tank(&self, tank_id: i32) -> DomainResult<Option<TankReading>>;
    async fn find_between(
        &self,
        tank_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<TankReading>>;
    async fn first_between(
        &self,
        tank_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Option<TankReading>>;
    async fn last_between(
        &self,
        tank_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Option<TankReading>>;
    async fn count_for_tank(&self, tank_id: i32) -> DomainResult<u64>;
}
