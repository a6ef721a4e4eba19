pub mod detection;
pub mod interfaces;
pub mod ports;

pub use detection::{DetectorSettings, RefillAnomalyDetector};
pub use interfaces::{
    AtgAdapter, AtgSettings, InterfaceManager, LifecycleOutcome, PtsAdapter, PtsSettings,
    SharedInterfaceManager,
};
pub use ports::{
    AdapterError, AdapterResult, IngestSummary, RealtimePublisher, SharedAdapter, TankSnapshot,
    TelemetryAdapter, TimeSource,
};
