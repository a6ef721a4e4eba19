pub mod detection;
pub mod interface;
pub mod reading;
pub mod repositories;
pub mod station;
pub mod transaction;

// Re-export commonly used types
pub use detection::{AnomalyAlert, AnomalyType, DetectionRepository, RefillEvent};
pub use interface::{AdapterMode, ConnectionState, InterfaceSource, InterfaceStatus};
pub use reading::{round1, ReadingRepository, TankMeasurement, TankReading, TankSample, TankStatus};
pub use repositories::{DomainResult, RepositoryProvider};
pub use station::{Product, Station, StationRepository, Tank, TankFilter, TankInfo};
pub use transaction::{FuelTransaction, TransactionQuery, TransactionRepository};

// Re-export DomainError from shared for convenience
pub use crate::shared::errors::DomainError;
