//! Device interfaces: the shared adapter core, protocol adapters and the
//! manager that routes stations to them.

pub mod atg;
pub mod base;
pub mod manager;
pub mod normalize;
pub mod pts;

pub use atg::{AtgAdapter, AtgSettings};
pub use base::{AdapterCore, MonitoringSession};
pub use manager::{InterfaceManager, LifecycleOutcome, SharedInterfaceManager};
pub use pts::{ClockCheck, PtsAdapter, PtsSettings};
