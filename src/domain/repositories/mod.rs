//! Repository traits for the domain layer
//!
//! Contains:
//! - `RepositoryProvider` — unified access to all per-aggregate repositories
//! - `DomainResult` — standard result type for domain operations

use super::detection::DetectionRepository;
use super::reading::ReadingRepository;
use super::station::StationRepository;
use super::transaction::TransactionRepository;
use crate::shared::errors::DomainError;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Provides access to all domain repositories.
///
/// Adapters and the detector receive an `Arc<dyn RepositoryProvider>` at
/// construction and request only the repository they need:
///
/// ```ignore
/// async fn latest(repos: &dyn RepositoryProvider, tank_id: i32) {
///     let reading = repos.readings().latest_for_tank(tank_id).await?;
/// }
/// ```
pub trait RepositoryProvider: Send + Sync {
    fn readings(&self) -> &dyn ReadingRepository;
    fn transactions(&self) -> &dyn TransactionRepository;
    fn stations(&self) -> &dyn StationRepository;
    fn detections(&self) -> &dyn DetectionRepository;
}
