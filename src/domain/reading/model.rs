//! Tank reading domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether a tank answered on the last poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TankStatus {
    Online,
    Offline,
}

impl TankStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "online" => Some(Self::Online),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }
}

/// Round a measurement to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Numeric part of a tank observation.
///
/// `oil_volume` is always derived as `total_volume - water_volume`; vendor
/// oil volume fields are never read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankMeasurement {
    pub total_volume: f64,
    pub oil_volume: f64,
    pub water_volume: f64,
    pub tc_volume: f64,
    pub ullage: f64,
    pub oil_height: f64,
    pub water_height: f64,
    pub temperature: f64,
    pub density: Option<f64>,
    pub mass: Option<f64>,
    pub fill_percentage: Option<f64>,
}

impl TankMeasurement {
    /// Build a measurement, deriving oil volume and rounding to one decimal.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        total_volume: f64,
        water_volume: f64,
        tc_volume: f64,
        ullage: f64,
        oil_height: f64,
        water_height: f64,
        temperature: f64,
    ) -> Self {
        Self {
            total_volume: round1(total_volume),
            oil_volume: round1(total_volume - water_volume),
            water_volume: round1(water_volume),
            tc_volume: round1(tc_volume),
            ullage: round1(ullage),
            oil_height: round1(oil_height),
            water_height: round1(water_height),
            temperature: round1(temperature),
            density: None,
            mass: None,
            fill_percentage: None,
        }
    }

    pub fn with_density(mut self, density: Option<f64>) -> Self {
        self.density = density.map(round1);
        self
    }

    pub fn with_mass(mut self, mass: Option<f64>) -> Self {
        self.mass = mass.map(round1);
        self
    }

    pub fn with_fill_percentage(mut self, fill: Option<f64>) -> Self {
        self.fill_percentage = fill.map(round1);
        self
    }
}

/// One persisted observation of one tank at one instant.
///
/// Natural key: `(tank_id, timestamp)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankReading {
    pub tank_id: i32,
    pub tank_number: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub measurement: TankMeasurement,
    pub status: TankStatus,
    pub interface_source: String,
    /// Opaque vendor payload kept for audit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<Value>,
}

/// A live tank observation as produced by a poll, before tank-id mapping.
///
/// Offline tanks carry no measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankSample {
    pub tank_number: u32,
    pub tank_id: Option<i32>,
    pub timestamp: DateTime<Utc>,
    pub status: TankStatus,
    #[serde(flatten)]
    pub measurement: Option<TankMeasurement>,
    pub interface_source: String,
    #[serde(skip)]
    pub raw_payload: Option<Value>,
}

impl TankSample {
    pub fn online(
        tank_number: u32,
        timestamp: DateTime<Utc>,
        measurement: TankMeasurement,
        interface_source: impl Into<String>,
    ) -> Self {
        Self {
            tank_number,
            tank_id: None,
            timestamp,
            status: TankStatus::Online,
            measurement: Some(measurement),
            interface_source: interface_source.into(),
            raw_payload: None,
        }
    }

    pub fn offline(
        tank_number: u32,
        timestamp: DateTime<Utc>,
        interface_source: impl Into<String>,
    ) -> Self {
        Self {
            tank_number,
            tank_id: None,
            timestamp,
            status: TankStatus::Offline,
            measurement: None,
            interface_source: interface_source.into(),
            raw_payload: None,
        }
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw_payload = Some(raw);
        self
    }

    pub fn is_online(&self) -> bool {
        self.status == TankStatus::Online && self.measurement.is_some()
    }

    /// Convert into a storable reading. Needs a mapped tank id and a measurement.
    pub fn to_reading(&self) -> Option<TankReading> {
        let tank_id = self.tank_id?;
        let measurement = self.measurement.clone()?;
        Some(TankReading {
            tank_id,
            tank_number: self.tank_number,
            timestamp: self.timestamp,
            measurement,
            status: self.status,
            interface_source: self.interface_source.clone(),
            raw_payload: self.raw_payload.clone(),
        })
    }
}
