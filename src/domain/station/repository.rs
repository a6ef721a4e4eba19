//! Station registry repository interface

use async_trait::async_trait;

use super::model::{Station, TankFilter, TankInfo};
use crate::domain::DomainResult;

/// Lookups tolerate zero or many matches; callers decide what that means.
#[async_trait]
pub trait StationRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Station>>;
    async fn find_active(&self) -> DomainResult<Vec<Station>>;
    /// Active stations using any of `codes`, case-insensitively.
    async fn find_active_by_interfaces(&self, codes: &[String]) -> DomainResult<Vec<Station>>;
    /// Active tanks on active stations, ordered by station then tank number.
    async fn find_tanks(&self, filter: &TankFilter) -> DomainResult<Vec<TankInfo>>;
}
