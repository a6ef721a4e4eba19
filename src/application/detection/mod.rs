//! Refill and anomaly detection over persisted tank readings

pub mod service;

pub use service::{classify_daily, classify_refills, DetectorSettings, RefillAnomalyDetector};
