//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod detection_repository;
pub mod reading_repository;
pub mod repository_provider;
pub mod station_repository;
pub mod transaction_repository;

pub use repository_provider::SeaOrmRepositoryProvider;
