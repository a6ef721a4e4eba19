//! Device adapter contract
//!
//! Every protocol variant (serial gauge, jsonPTS controller) implements
//! [`TelemetryAdapter`]. The interface manager and the API layer only ever
//! see `Arc<dyn TelemetryAdapter>`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{
    DomainError, FuelTransaction, InterfaceStatus, Station, TankFilter, TankInfo, TankMeasurement,
    TankReading, TankSample, TankStatus, TransactionQuery,
};

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Interface {0} has not been initialized")]
    NotInitialized(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl AdapterError {
    /// Transport failures are the only ones worth retrying.
    pub fn is_transport(&self) -> bool {
        matches!(self, AdapterError::Transport(_))
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;

/// Outcome of a `receive_transaction_data` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub received: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

/// A tank joined with its station/product metadata and its last known reading.
///
/// Reading fields are `None` for tanks that never reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankSnapshot {
    pub tank_id: i32,
    pub tank_number: u32,
    pub capacity: f64,
    pub station_id: i32,
    pub station_code: String,
    pub station_name: String,
    pub product_name: Option<String>,
    pub product_color: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub status: Option<TankStatus>,
    pub interface_source: Option<String>,
    #[serde(flatten)]
    pub measurement: Option<TankMeasurement>,
}

impl TankSnapshot {
    pub fn new(info: &TankInfo, reading: Option<&TankReading>) -> Self {
        Self {
            tank_id: info.tank.id,
            tank_number: info.tank.number,
            capacity: info.tank.capacity,
            station_id: info.station.id,
            station_code: info.station.code.clone(),
            station_name: info.station.name.clone(),
            product_name: info.product.as_ref().map(|p| p.name.clone()),
            product_color: info.product.as_ref().and_then(|p| p.color.clone()),
            timestamp: reading.map(|r| r.timestamp),
            status: reading.map(|r| r.status),
            interface_source: reading.map(|r| r.interface_source.clone()),
            measurement: reading.map(|r| r.measurement.clone()),
        }
    }

    /// Replace the reading part with a live sample if it is at least as recent.
    pub fn overlay(&mut self, sample: &TankSample) {
        if self.timestamp.is_some_and(|ts| ts > sample.timestamp) {
            return;
        }
        self.timestamp = Some(sample.timestamp);
        self.status = Some(sample.status);
        self.interface_source = Some(sample.interface_source.clone());
        self.measurement = sample.measurement.clone();
    }
}

/// Contract shared by every device adapter.
///
/// All methods take `&self` and are safe to call concurrently.
#[async_trait]
pub trait TelemetryAdapter: Send + Sync {
    /// Upper-case interface code this adapter serves (e.g. `ATG`, `NFPP`).
    fn interface_code(&self) -> &str;

    /// Also serve stations registered under `alias` (a legacy code).
    fn accept_alias(&self, alias: &str);

    /// Connect to the hardware, or select the simulated strategy when it is
    /// unreachable. Absent hardware is not an error.
    async fn initialize(&self) -> AdapterResult<()>;

    /// Start the polling tasks. Calling it while monitoring is a no-op.
    async fn start_monitoring(&self) -> AdapterResult<()>;

    /// Stop the polling tasks and clear in-memory state. Idempotent.
    async fn stop_monitoring(&self);

    fn is_monitoring(&self) -> bool;

    async fn get_current_tank_data(&self, filter: &TankFilter) -> AdapterResult<Vec<TankSnapshot>>;

    async fn get_transactions(&self, query: &TransactionQuery)
        -> AdapterResult<Vec<FuelTransaction>>;

    /// Normalize and store vendor transaction records pushed by the station.
    async fn receive_transaction_data(
        &self,
        payload: &Value,
        station: &Station,
    ) -> AdapterResult<IngestSummary>;

    async fn get_status(&self) -> InterfaceStatus;
}

pub type SharedAdapter = Arc<dyn TelemetryAdapter>;
