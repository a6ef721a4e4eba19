//! Detection aggregate: refill events and anomaly alerts

pub mod model;
pub mod repository;

pub use model::{AnomalyAlert, AnomalyType, RefillEvent};
pub use repository::DetectionRepository;
