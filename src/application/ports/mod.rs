//! Application ports (hexagonal architecture boundaries)
//!
//! - [`TelemetryAdapter`] — the contract every device adapter implements
//! - [`RealtimePublisher`] — fire-and-forget real-time event sink
//! - [`TimeSource`] — authoritative wall clock used for device clock governance

pub mod adapter;
pub mod realtime;
pub mod time;

pub use adapter::{
    AdapterError, AdapterResult, IngestSummary, SharedAdapter, TankSnapshot, TelemetryAdapter,
};
pub use realtime::{NoopPublisher, RealtimePublisher};
pub use time::{SystemTimeSource, TimeSource};
