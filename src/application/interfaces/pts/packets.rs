//! jsonPTS envelope and packet payloads
//!
//! Request:
//! ```json
//! {"Protocol": "jsonPTS", "Packets": [{"Id": 1, "Type": "GetDateTime"}]}
//! ```
//! Response: `Packets[0].Data`, or `Packets[0].Error` / `Message` when the
//! controller rejected the request.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::application::interfaces::normalize::{field, flag, integer, number, parse_local_datetime, text};
use crate::domain::TankMeasurement;

pub const PROTOCOL: &str = "jsonPTS";

pub const GET_DATE_TIME: &str = "GetDateTime";
pub const SET_DATE_TIME: &str = "SetDateTime";
pub const GET_PROBES_CONFIGURATION: &str = "GetProbesConfiguration";
pub const PROBE_GET_MEASUREMENTS: &str = "ProbeGetMeasurements";
pub const REPORT_GET_PUMP_TRANSACTIONS: &str = "ReportGetPumpTransactions";

/// Device timestamps travel without offset in this format.
pub const DEVICE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const VOLUME: &[&str] = &["ProductVolume", "Volume", "volume"];
const WATER_VOLUME: &[&str] = &["WaterVolume", "water_volume"];
const TC_VOLUME: &[&str] = &["ProductTCVolume", "TCVolume", "tc_volume"];
const ULLAGE: &[&str] = &["ProductUllage", "Ullage", "ullage"];
const OIL_HEIGHT: &[&str] = &["ProductHeight", "Height", "height"];
const WATER_HEIGHT: &[&str] = &["WaterHeight", "water_height"];
const TEMPERATURE: &[&str] = &["Temperature", "temperature"];
const DENSITY: &[&str] = &["ProductDensity", "Density", "density"];
const MASS: &[&str] = &["ProductMass", "Mass", "mass"];
const FILL: &[&str] = &["TankFillingPercentage", "FillPercentage", "fill_percentage"];

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PacketError {
    #[error("response carries no packets")]
    Empty,

    #[error("controller rejected {packet}: {message}")]
    Rejected { packet: String, message: String },

    #[error("unexpected {what} in response")]
    Unexpected { what: &'static str },
}

#[derive(Debug, Serialize)]
struct RequestPacket<'a> {
    #[serde(rename = "Id")]
    id: u32,
    #[serde(rename = "Type")]
    packet_type: &'a str,
    #[serde(rename = "Data", skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

#[derive(Debug, Serialize)]
struct RequestEnvelope<'a> {
    #[serde(rename = "Protocol")]
    protocol: &'static str,
    #[serde(rename = "Packets")]
    packets: Vec<RequestPacket<'a>>,
}

#[derive(Debug, Deserialize)]
struct ResponsePacket {
    #[serde(rename = "Type", default)]
    packet_type: Option<String>,
    #[serde(rename = "Data", default)]
    data: Option<Value>,
    #[serde(rename = "Error", default)]
    error: Option<Value>,
    #[serde(rename = "Message", default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseEnvelope {
    #[serde(rename = "Packets", default)]
    packets: Vec<ResponsePacket>,
}

/// Build a single-packet request body.
pub fn request(id: u32, packet_type: &str, data: Option<Value>) -> Value {
    let envelope = RequestEnvelope {
        protocol: PROTOCOL,
        packets: vec![RequestPacket {
            id,
            packet_type,
            data,
        }],
    };
    // Serializing plain strings, numbers and a `Value` cannot fail
    serde_json::to_value(envelope).unwrap_or(Value::Null)
}

/// Extract the payload of the first response packet.
pub fn unwrap_response(packet_type: &str, body: Value) -> Result<Value, PacketError> {
    let envelope: ResponseEnvelope =
        serde_json::from_value(body).map_err(|_| PacketError::Unexpected { what: "envelope" })?;
    let packet = envelope.packets.into_iter().next().ok_or(PacketError::Empty)?;

    let rejected = match &packet.error {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(_) => true,
    };
    if rejected || (packet.message.is_some() && packet.data.is_none()) {
        let message = packet
            .message
            .or_else(|| packet.error.as_ref().and_then(|e| e.as_str().map(String::from)))
            .unwrap_or_else(|| "unspecified error".to_string());
        return Err(PacketError::Rejected {
            packet: packet.packet_type.unwrap_or_else(|| packet_type.to_string()),
            message,
        });
    }
    Ok(packet.data.unwrap_or(Value::Null))
}

// ── Clock ───────────────────────────────────────────────────────

/// Controller wall clock as reported by `GetDateTime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceClock {
    pub local: NaiveDateTime,
    /// Offset of the device's local time from UTC
    pub utc_offset_minutes: i32,
}

impl DeviceClock {
    /// Device time expressed in UTC: local minus offset.
    pub fn utc(&self) -> NaiveDateTime {
        self.local - TimeDelta::minutes(i64::from(self.utc_offset_minutes))
    }
}

/// `UTCOffset` is reported in hours and may be fractional (e.g. 5.5);
/// it is clamped to the ±14 h range of real zones.
pub fn parse_device_clock(data: &Value) -> Result<DeviceClock, PacketError> {
    let local = text(data, &["DateTime"])
        .and_then(|raw| parse_local_datetime(&raw))
        .ok_or(PacketError::Unexpected { what: "DateTime" })?;
    let offset_hours = number(data, &["UTCOffset", "UtcOffset"]).unwrap_or(0.0);
    Ok(DeviceClock {
        local,
        utc_offset_minutes: (offset_hours.clamp(-14.0, 14.0) * 60.0).round() as i32,
    })
}

/// `SetDateTime` payload: authoritative UTC converted to device-local time.
pub fn set_date_time_data(utc: NaiveDateTime, utc_offset_minutes: i32) -> Value {
    let local = utc + TimeDelta::minutes(i64::from(utc_offset_minutes));
    json!({
        "DateTime": local.format(DEVICE_DATETIME_FORMAT).to_string(),
        "AutoSynchronize": false,
        "UTCOffset": f64::from(utc_offset_minutes) / 60.0,
    })
}

// ── Probes ──────────────────────────────────────────────────────

/// Probe ids from `GetProbesConfiguration`. Probes flagged disabled are skipped.
pub fn probe_ids(data: &Value) -> Vec<i32> {
    let entries = match field(data, &["Probes"]).unwrap_or(data) {
        Value::Array(items) => items.as_slice(),
        _ => return Vec::new(),
    };
    let mut ids: Vec<i32> = entries
        .iter()
        .filter(|p| flag(p, &["Enabled"]).unwrap_or(true))
        .filter_map(|p| integer(p, &["Id", "Probe", "ProbeId"]))
        .filter_map(|id| i32::try_from(id).ok())
        .filter(|id| *id > 0)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

pub fn probe_measurement_request(probe: i32) -> Value {
    json!({ "Probe": probe })
}

/// Probe measurement → normalized tank measurement.
///
/// A packet without a product volume, or with an error status, means the
/// probe is offline this cycle.
pub fn parse_probe_measurement(data: &Value) -> Result<TankMeasurement, PacketError> {
    if let Some(status) = text(data, &["Status"]) {
        if status.eq_ignore_ascii_case("error") || status.eq_ignore_ascii_case("offline") {
            return Err(PacketError::Rejected {
                packet: PROBE_GET_MEASUREMENTS.to_string(),
                message: format!("probe status {status}"),
            });
        }
    }
    let total = number(data, VOLUME).ok_or(PacketError::Unexpected { what: "ProductVolume" })?;

    Ok(TankMeasurement::new(
        total,
        number(data, WATER_VOLUME).unwrap_or(0.0),
        number(data, TC_VOLUME).unwrap_or(total),
        number(data, ULLAGE).unwrap_or(0.0),
        number(data, OIL_HEIGHT).unwrap_or(0.0),
        number(data, WATER_HEIGHT).unwrap_or(0.0),
        number(data, TEMPERATURE).unwrap_or(0.0),
    )
    .with_density(number(data, DENSITY))
    .with_mass(number(data, MASS))
    .with_fill_percentage(number(data, FILL)))
}

// ── Transactions ────────────────────────────────────────────────

/// `ReportGetPumpTransactions` window in device-local time.
pub fn transactions_request(start_local: NaiveDateTime, end_local: NaiveDateTime) -> Value {
    json!({
        "DateTimeStart": start_local.format(DEVICE_DATETIME_FORMAT).to_string(),
        "DateTimeEnd": end_local.format(DEVICE_DATETIME_FORMAT).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn request_envelope_shape() {
        let body = request(7, GET_DATE_TIME, None);
        assert_eq!(
            body,
            json!({"Protocol": "jsonPTS", "Packets": [{"Id": 7, "Type": "GetDateTime"}]})
        );
        let body = request(8, PROBE_GET_MEASUREMENTS, Some(probe_measurement_request(2)));
        assert_eq!(body["Packets"][0]["Data"]["Probe"], 2);
    }

    #[test]
    fn response_data_and_errors() {
        let ok = json!({"Protocol": "jsonPTS", "Packets": [{"Id": 1, "Type": "GetDateTime", "Data": {"DateTime": "2024-01-15T10:00:00"}}]});
        assert_eq!(
            unwrap_response(GET_DATE_TIME, ok).unwrap()["DateTime"],
            "2024-01-15T10:00:00"
        );

        let rejected = json!({"Packets": [{"Id": 1, "Type": "ProbeGetMeasurements", "Error": true, "Message": "Probe is not configured"}]});
        assert_eq!(
            unwrap_response(PROBE_GET_MEASUREMENTS, rejected),
            Err(PacketError::Rejected {
                packet: "ProbeGetMeasurements".into(),
                message: "Probe is not configured".into()
            })
        );

        assert_eq!(
            unwrap_response(GET_DATE_TIME, json!({"Packets": []})),
            Err(PacketError::Empty)
        );
        assert!(unwrap_response(GET_DATE_TIME, json!("html")).is_err());

        let no_data = json!({"Packets": [{"Id": 1, "Type": "SetDateTime"}]});
        assert_eq!(unwrap_response(SET_DATE_TIME, no_data).unwrap(), Value::Null);
    }

    #[test]
    fn device_clock_applies_fractional_offset() {
        let clock = parse_device_clock(&json!({"DateTime": "2024-01-15T15:30:00", "UTCOffset": 5.5})).unwrap();
        assert_eq!(clock.utc_offset_minutes, 330);
        assert_eq!(clock.utc(), at(10, 0, 0));

        let data = set_date_time_data(at(10, 0, 0), 180);
        assert_eq!(data["DateTime"], "2024-01-15T13:00:00");
        assert_eq!(data["AutoSynchronize"], false);
        assert_eq!(data["UTCOffset"], 3.0);
    }

    #[test]
    fn probe_ids_skip_disabled_probes() {
        let data = json!({"Probes": [
            {"Id": 3, "Enabled": true},
            {"Id": 1},
            {"Id": 2, "Enabled": false},
            {"Port": 4},
            {"Id": -1},
            {"Id": 0},
            {"Id": 4294967297_i64}
        ]});
        assert_eq!(probe_ids(&data), vec![1, 3]);
        assert!(probe_ids(&json!({})).is_empty());
    }

    #[test]
    fn probe_measurement_aliases() {
        let data = json!({
            "Probe": 1,
            "ProductVolume": 12000.44,
            "WaterVolume": 40.0,
            "ProductTCVolume": 11950.0,
            "ProductUllage": 8000.0,
            "ProductHeight": 1620.5,
            "WaterHeight": 10.0,
            "Temperature": 26.1,
            "ProductDensity": 835.2,
            "ProductMass": 9990.0,
            "TankFillingPercentage": 60
        });
        let m = parse_probe_measurement(&data).unwrap();
        assert_eq!(m.total_volume, 12000.4);
        assert_eq!(m.oil_volume, 11960.4);
        assert_eq!(m.density, Some(835.2));
        assert_eq!(m.fill_percentage, Some(60.0));

        let short = parse_probe_measurement(&json!({"Volume": 500, "Height": 120})).unwrap();
        assert_eq!(short.tc_volume, 500.0);
        assert_eq!(short.oil_height, 120.0);
        assert_eq!(short.density, None);

        assert!(parse_probe_measurement(&json!({"Status": "Error"})).is_err());
        assert!(parse_probe_measurement(&json!({"Temperature": 20})).is_err());
    }

    #[test]
    fn transactions_window_is_formatted_locally() {
        let data = transactions_request(at(8, 0, 0), at(9, 5, 0));
        assert_eq!(data["DateTimeStart"], "2024-01-15T08:00:00");
        assert_eq!(data["DateTimeEnd"], "2024-01-15T09:05:00");
    }
}
