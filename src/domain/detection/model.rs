//! Refill events and anomaly alerts

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A tank volume increase consistent with a delivery.
///
/// Natural key: `(tank_id, detected_at)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefillEvent {
    pub tank_id: i32,
    pub detected_at: DateTime<Utc>,
    pub volume_before: f64,
    pub volume_after: f64,
    pub volume_added: f64,
    pub temperature_before: f64,
    pub temperature_after: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyType {
    PotentialLoss,
    MissingData,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PotentialLoss => "POTENTIAL_LOSS",
            Self::MissingData => "MISSING_DATA",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "POTENTIAL_LOSS" => Some(Self::PotentialLoss),
            "MISSING_DATA" => Some(Self::MissingData),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A day-boundary anomaly for one tank.
///
/// Natural key: `(tank_id, detection_date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyAlert {
    pub tank_id: i32,
    pub detection_date: NaiveDate,
    pub anomaly_type: AnomalyType,
    /// `previous_volume - current_volume`; absent for missing data
    pub volume_difference: Option<f64>,
    /// Last volume of the previous day
    pub previous_volume: Option<f64>,
    /// First volume of the detection date
    pub current_volume: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anomaly_type_serializes_screaming_case() {
        let json = serde_json::to_string(&AnomalyType::PotentialLoss).unwrap();
        assert_eq!(json, "\"POTENTIAL_LOSS\"");
        assert_eq!(
            AnomalyType::from_str("MISSING_DATA"),
            Some(AnomalyType::MissingData)
        );
        assert_eq!(AnomalyType::MissingData.to_string(), "MISSING_DATA");
    }
}
