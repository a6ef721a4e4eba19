//! Real-time events
//!
//! Events published by device adapters for dashboards. Each one is addressed
//! by station id and interface code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{FuelTransaction, TankSample};

/// Event types for notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// Fresh tank readings from one poll cycle
    #[serde(rename = "tankData")]
    TankData(TankDataEvent),
    /// Newly stored transactions
    #[serde(rename = "transactions")]
    Transactions(TransactionsEvent),
}

impl Event {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::TankData(_) => "tankData",
            Event::Transactions(_) => "transactions",
        }
    }

    pub fn station_id(&self) -> Option<i32> {
        match self {
            Event::TankData(e) => e.station_id,
            Event::Transactions(e) => Some(e.station_id),
        }
    }

    pub fn interface_code(&self) -> &str {
        match self {
            Event::TankData(e) => &e.interface_code,
            Event::Transactions(e) => &e.interface_code,
        }
    }
}

/// Tank readings event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankDataEvent {
    /// `None` while the adapter is still resolving its station
    pub station_id: Option<i32>,
    pub interface_code: String,
    pub readings: Vec<TankSample>,
    pub timestamp: DateTime<Utc>,
}

/// Transactions event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionsEvent {
    pub station_id: i32,
    pub interface_code: String,
    pub transactions: Vec<FuelTransaction>,
    pub timestamp: DateTime<Utc>,
}

/// Wrapper for events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    /// Unique message ID
    pub id: String,
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
    /// The event itself
    #[serde(flatten)]
    pub event: Event,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_camel_case_type_tag() {
        let event = Event::TankData(TankDataEvent {
            station_id: Some(3),
            interface_code: "ATG".into(),
            readings: vec![TankSample::offline(1, Utc::now(), "ATG")],
            timestamp: Utc::now(),
        });
        let json = serde_json::to_value(EventMessage::new(event)).unwrap();

        assert_eq!(json["type"], "tankData");
        assert_eq!(json["data"]["station_id"], 3);
        assert_eq!(json["data"]["readings"][0]["status"], "offline");
        assert!(json["id"].is_string());
    }
}
