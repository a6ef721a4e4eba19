//! Gauge inventory protocol
//!
//! Request: `SOH` + `i20100` (in-tank inventory, all tanks).
//!
//! Response (after stripping non-printables):
//!
//! ```text
//! i20100 YYMMDDHHmm | TT p ssss NN | NN x 8-hex floats | ... | && cccc
//! \____ header 16 ____/ \_ key 9 _/  \______ 56 _______/
//! ```
//!
//! Every tank block is located by its key `TT0000007` (tank number, product
//! code 0, status 0000, seven fields). The seven floats are, in order:
//! total volume, TC volume, ullage, oil height, water height, temperature,
//! water volume.

use serde_json::json;
use thiserror::Error;

use super::codec::{CodecError, FloatDecoder, FLOAT_HEX_LEN};
use crate::domain::{TankMeasurement, TankSample};
use chrono::{DateTime, Utc};

/// Inventory request: SOH + `i20100`.
pub const POLL_COMMAND: &[u8] = b"\x01i20100";
/// Response delimiter preceding the checksum.
pub const FRAME_DELIMITER: &str = "&&";
/// Every inventory response carries this marker.
pub const RESPONSE_MARKER: &str = "i201";

const HEADER_LEN: usize = 16;
const KEY_LEN: usize = 9;
const BODY_LEN: usize = 56;
const TRAILER_LEN: usize = 6;
const FIELD_COUNT: usize = 7;

// Offsets inside a rebuilt record
const TANK_NUMBER: std::ops::Range<usize> = 16..18;
const FIELD_COUNT_HEX: std::ops::Range<usize> = 23..25;
const FIELDS_START: usize = 25;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("response has no i201 marker")]
    MissingMarker,

    #[error("response header truncated ({0} chars)")]
    ShortHeader(usize),

    #[error("tank {tank}: block truncated, need {needed} chars, have {available}")]
    Truncated {
        tank: u32,
        needed: usize,
        available: usize,
    },

    #[error("tank {tank}: unreadable {what} {raw:?}")]
    BadField {
        tank: u32,
        what: &'static str,
        raw: String,
    },

    #[error("tank {tank}: expected 7 fields, frame declares {declared}")]
    TooFewFields { tank: u32, declared: usize },

    #[error("tank {tank}: {source}")]
    Codec {
        tank: u32,
        #[source]
        source: CodecError,
    },
}

/// Keep printable ASCII only.
pub fn sanitize(raw: &[u8]) -> String {
    raw.iter()
        .copied()
        .filter(|b| (0x20..=0x7E).contains(b))
        .map(char::from)
        .collect()
}

/// Search key of one tank block.
pub fn tank_key(tank_number: u32) -> String {
    format!("{:02}0000007", tank_number)
}

/// Result of looking one tank up in a response.
#[derive(Debug, Clone, PartialEq)]
pub enum TankFrame {
    Present {
        tank_number: u32,
        measurement: TankMeasurement,
        record: String,
    },
    Missing {
        tank_number: u32,
    },
    Malformed {
        tank_number: u32,
        error: ProtocolError,
    },
}

impl TankFrame {
    pub fn tank_number(&self) -> u32 {
        match self {
            TankFrame::Present { tank_number, .. }
            | TankFrame::Missing { tank_number }
            | TankFrame::Malformed { tank_number, .. } => *tank_number,
        }
    }

    /// Online sample for a present tank, offline otherwise.
    pub fn into_sample(self, timestamp: DateTime<Utc>, interface_source: &str) -> TankSample {
        match self {
            TankFrame::Present {
                tank_number,
                measurement,
                record,
            } => TankSample::online(tank_number, timestamp, measurement, interface_source)
                .with_raw(json!({ "record": record })),
            TankFrame::Missing { tank_number } | TankFrame::Malformed { tank_number, .. } => {
                TankSample::offline(tank_number, timestamp, interface_source)
            }
        }
    }
}

/// Parse an inventory response for tanks `1..=tank_count`.
///
/// Fails only when the payload is not an inventory response at all. Problems
/// with a single tank are reported in that tank's frame.
pub fn parse_inventory(
    payload: &str,
    tank_count: u32,
    decoder: &mut FloatDecoder,
) -> Result<Vec<TankFrame>, ProtocolError> {
    // Offsets count from the marker; echoed or stale text before it is dropped.
    let start = payload
        .find(RESPONSE_MARKER)
        .ok_or(ProtocolError::MissingMarker)?;
    let payload = &payload[start..];
    if payload.len() < HEADER_LEN {
        return Err(ProtocolError::ShortHeader(payload.len()));
    }

    Ok((1..=tank_count)
        .map(|tank| match extract_record(payload, tank) {
            None => TankFrame::Missing { tank_number: tank },
            Some(Err(error)) => TankFrame::Malformed {
                tank_number: tank,
                error,
            },
            Some(Ok(record)) => match parse_record(&record, tank, decoder) {
                Ok(measurement) => TankFrame::Present {
                    tank_number: tank,
                    measurement,
                    record,
                },
                Err(error) => TankFrame::Malformed {
                    tank_number: tank,
                    error,
                },
            },
        })
        .collect())
}

/// Rebuild `header + key + body + trailer` for one tank.
fn extract_record(payload: &str, tank: u32) -> Option<Result<String, ProtocolError>> {
    let key = tank_key(tank);
    // Key search starts after the header; its timestamp digits are never a key.
    let idx = HEADER_LEN + payload.get(HEADER_LEN..)?.find(&key)?;
    let end = idx + KEY_LEN + BODY_LEN;

    let (Some(header), Some(block)) = (payload.get(..HEADER_LEN), payload.get(idx..end)) else {
        return Some(Err(ProtocolError::Truncated {
            tank,
            needed: end,
            available: payload.len(),
        }));
    };
    let trailer = payload
        .get(payload.len().saturating_sub(TRAILER_LEN)..)
        .unwrap_or_default();

    Some(Ok(format!("{header}{block}{trailer}")))
}

fn parse_record(record: &str, tank: u32, decoder: &mut FloatDecoder) -> Result<TankMeasurement, ProtocolError> {
    let bad = |what: &'static str, raw: &str| ProtocolError::BadField {
        tank,
        what,
        raw: raw.to_string(),
    };

    let number_raw = record.get(TANK_NUMBER).unwrap_or_default();
    let number: u32 = number_raw.parse().map_err(|_| bad("tank number", number_raw))?;
    if number != tank {
        return Err(bad("tank number", number_raw));
    }

    let count_raw = record.get(FIELD_COUNT_HEX).unwrap_or_default();
    let declared =
        usize::from_str_radix(count_raw, 16).map_err(|_| bad("field count", count_raw))?;
    if declared < FIELD_COUNT {
        return Err(ProtocolError::TooFewFields { tank, declared });
    }

    let mut fields = [0f64; FIELD_COUNT];
    for (i, slot) in fields.iter_mut().enumerate() {
        let from = FIELDS_START + i * FLOAT_HEX_LEN;
        let word = record
            .get(from..from + FLOAT_HEX_LEN)
            .ok_or(ProtocolError::Truncated {
                tank,
                needed: from + FLOAT_HEX_LEN,
                available: record.len(),
            })?;
        *slot = decoder
            .decode(word)
            .map_err(|source| ProtocolError::Codec { tank, source })? as f64;
    }

    let [total, tc, ullage, oil_height, water_height, temperature, water] = fields;
    Ok(TankMeasurement::new(
        total,
        water,
        tc,
        ullage,
        oil_height,
        water_height,
        temperature,
    ))
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const HEADER: &str = "i201002401151030";
    pub const TANK_1: &str =
        "010000007461C4000461B7800459C400044BB90004144000041CC000042480000";
    pub const TANK_2: &str =
        "02000000745FA000045F9B00045DAC000449600000000000041C0000000000000";
    pub const TRAILER: &str = "&&FA3B";

    /// Raw bytes as they come off the line: SOH, line noise, two tank
    /// blocks, checksum and ETX.
    pub fn inventory_wire() -> Vec<u8> {
        let mut wire = vec![0x01, 0x00, 0xFF];
        wire.extend_from_slice(HEADER.as_bytes());
        wire.extend_from_slice(TANK_1.as_bytes());
        wire.push(0x0A);
        wire.extend_from_slice(TANK_2.as_bytes());
        wire.extend_from_slice(TRAILER.as_bytes());
        wire.push(0x03);
        wire
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn frames() -> Vec<TankFrame> {
        let payload = sanitize(&inventory_wire());
        parse_inventory(&payload, 5, &mut FloatDecoder::new()).unwrap()
    }

    #[test]
    fn sanitize_strips_control_and_high_bytes() {
        assert_eq!(sanitize(b"\x01i201\x00\r\n00\xFF&&"), "i20100&&");
    }

    #[test]
    fn tank_keys_are_zero_padded() {
        assert_eq!(tank_key(1), "010000007");
        assert_eq!(tank_key(12), "120000007");
    }

    #[test]
    fn golden_fixture_tank_one() {
        let frames = frames();
        let TankFrame::Present { measurement: m, record, .. } = &frames[0] else {
            panic!("tank 1 should be present: {:?}", frames[0]);
        };
        assert_eq!(m.total_volume, 10000.0);
        assert_eq!(m.tc_volume, 9950.0);
        assert_eq!(m.ullage, 5000.0);
        assert_eq!(m.oil_height, 1500.5);
        assert_eq!(m.water_height, 12.3);
        assert_eq!(m.temperature, 25.5);
        assert_eq!(m.water_volume, 50.0);
        assert_eq!(m.oil_volume, 9950.0);
        assert!(record.starts_with(HEADER));
        assert!(record.ends_with(TRAILER));
        assert_eq!(record.len(), 16 + 9 + 56 + 6);
    }

    #[test]
    fn golden_fixture_tank_two() {
        let frames = frames();
        let TankFrame::Present { measurement: m, .. } = &frames[1] else {
            panic!("tank 2 should be present: {:?}", frames[1]);
        };
        assert_eq!(m.total_volume, 8000.0);
        assert_eq!(m.tc_volume, 7990.0);
        assert_eq!(m.ullage, 7000.0);
        assert_eq!(m.oil_height, 1200.0);
        assert_eq!(m.water_height, 0.0);
        assert_eq!(m.temperature, 24.0);
        assert_eq!(m.water_volume, 0.0);
        assert_eq!(m.oil_volume, 8000.0);
    }

    #[test]
    fn absent_tanks_are_offline_without_fields() {
        let frames = frames();
        assert_eq!(frames.len(), 5);
        for frame in &frames[2..] {
            assert!(matches!(frame, TankFrame::Missing { .. }));
        }
        let sample = frames[3].clone().into_sample(Utc::now(), "ATG");
        assert_eq!(sample.tank_number, 4);
        assert!(!sample.is_online());
        assert!(sample.measurement.is_none());
    }

    #[test]
    fn text_before_the_marker_is_ignored() {
        let payload = format!("ECHO 010000007>{HEADER}{TANK_1}{TRAILER}");
        let parsed = parse_inventory(&payload, 1, &mut FloatDecoder::new()).unwrap();
        let TankFrame::Present { measurement, record, .. } = &parsed[0] else {
            panic!("tank 1 should be present: {:?}", parsed[0]);
        };
        assert_eq!(measurement.total_volume, 10000.0);
        assert_eq!(record, &format!("{HEADER}{TANK_1}{TRAILER}"));
    }

    #[test]
    fn payload_without_marker_is_noise() {
        let noise = sanitize(b"\x01?????\x03");
        assert_eq!(
            parse_inventory(&noise, 5, &mut FloatDecoder::new()),
            Err(ProtocolError::MissingMarker)
        );
    }

    #[test]
    fn truncated_block_only_affects_its_tank() {
        let payload = format!("{HEADER}{TANK_1}{}", &TANK_2[..30]);
        let frames = parse_inventory(&payload, 2, &mut FloatDecoder::new()).unwrap();

        assert!(matches!(frames[0], TankFrame::Present { .. }));
        assert!(matches!(
            frames[1],
            TankFrame::Malformed { tank_number: 2, error: ProtocolError::Truncated { .. } }
        ));
        let sample = frames[1].clone().into_sample(Utc::now(), "ATG");
        assert!(!sample.is_online());
    }

    #[test]
    fn bad_hex_is_a_tank_level_error() {
        let broken = TANK_1.replace("461C4000", "461C40ZZ");
        let payload = format!("{HEADER}{broken}{TRAILER}");
        let frames = parse_inventory(&payload, 1, &mut FloatDecoder::new()).unwrap();
        assert!(matches!(
            frames[0],
            TankFrame::Malformed { error: ProtocolError::Codec { tank: 1, .. }, .. }
        ));
    }

    #[test]
    fn rounding_applies_to_decoded_values() {
        // 123.456 is not exact in f32; the stored value rounds to 123.5
        let body = TANK_1.replace("461C4000", "42F6E979");
        let payload = format!("{HEADER}{body}{TRAILER}");
        let frames = parse_inventory(&payload, 1, &mut FloatDecoder::new()).unwrap();
        let TankFrame::Present { measurement, .. } = &frames[0] else {
            panic!("expected tank 1");
        };
        assert_eq!(measurement.total_volume, 123.5);
    }
}
