//! # Fuel telemetry service
//!
//! Device-interface layer for fuel stations: polls tank gauges and forecourt
//! controllers, normalizes their data, persists it idempotently and
//! publishes live snapshots.
//!
//! ## Architecture
//!
//! - **domain**: entities (readings, transactions, registry, detections) and repository traits
//! - **application**: the adapter contract, ATG and PTS adapters, the interface manager and the refill/anomaly detector
//! - **infrastructure**: SeaORM persistence, in-memory repositories, the HTTP time source
//! - **notifications**: in-process event bus for real-time consumers

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod notifications;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};

// Re-export database types for easy access
pub use infrastructure::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};

// Re-export notifications
pub use notifications::{create_event_bus, Event, EventBus, SharedEventBus};
