//! Controller clock governance
//!
//! The controller stamps transactions with its own wall clock, so it is kept
//! within a drift threshold of an authoritative source. The check reads the
//! device clock, converts it to UTC with the reported offset and sends one
//! `SetDateTime` when the drift is strictly above the threshold.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::client::PtsClient;
use super::packets::{parse_device_clock, set_date_time_data, DeviceClock, GET_DATE_TIME, SET_DATE_TIME};
use crate::application::ports::{AdapterError, AdapterResult, TimeSource};

/// Result of one clock check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ClockCheck {
    InSync { drift_seconds: i64 },
    Corrected { drift_seconds: i64 },
    /// Simulated controllers have no clock to govern
    NotApplicable,
}

/// Device clock minus authoritative time (positive when the device is ahead).
pub fn drift(device: &DeviceClock, authoritative: DateTime<Utc>) -> TimeDelta {
    device.utc() - authoritative.naive_utc()
}

pub fn exceeds(drift: TimeDelta, threshold: Duration) -> bool {
    drift.abs().to_std().is_ok_and(|d| d > threshold)
}

/// Read the device clock, correct it if needed and return the check result
/// together with the device's UTC offset.
pub async fn check_and_correct(
    client: &PtsClient,
    time_source: &dyn TimeSource,
    threshold: Duration,
) -> AdapterResult<(ClockCheck, i32)> {
    let data = client.call(GET_DATE_TIME, None).await?;
    let device = parse_device_clock(&data).map_err(|e| AdapterError::Protocol(e.to_string()))?;
    let now = time_source.now().await;
    let drift = drift(&device, now);

    if !exceeds(drift, threshold) {
        info!(
            drift_seconds = drift.num_seconds(),
            utc_offset_minutes = device.utc_offset_minutes,
            "🕒 Controller clock in sync"
        );
        return Ok((
            ClockCheck::InSync {
                drift_seconds: drift.num_seconds(),
            },
            device.utc_offset_minutes,
        ));
    }

    warn!(
        drift_seconds = drift.num_seconds(),
        threshold_secs = threshold.as_secs(),
        device_local = %device.local,
        "Controller clock drifted, correcting"
    );
    client
        .call(
            SET_DATE_TIME,
            Some(set_date_time_data(now.naive_utc(), device.utc_offset_minutes)),
        )
        .await?;
    info!(drift_seconds = drift.num_seconds(), "✅ Controller clock corrected");

    Ok((
        ClockCheck::Corrected {
            drift_seconds: drift.num_seconds(),
        },
        device.utc_offset_minutes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn device(h: u32, m: u32, s: u32, offset_minutes: i32) -> DeviceClock {
        DeviceClock {
            local: NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(h, m, s)
                .unwrap(),
            utc_offset_minutes: offset_minutes,
        }
    }

    #[test]
    fn drift_uses_reported_offset() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        assert_eq!(drift(&device(13, 1, 1, 180), now).num_seconds(), 61);
        assert_eq!(drift(&device(9, 59, 1, 0), now).num_seconds(), -59);
    }

    #[test]
    fn threshold_is_strict() {
        let threshold = Duration::from_secs(60);
        assert!(!exceeds(TimeDelta::seconds(59), threshold));
        assert!(!exceeds(TimeDelta::seconds(60), threshold));
        assert!(!exceeds(TimeDelta::seconds(-60), threshold));
        assert!(exceeds(TimeDelta::seconds(61), threshold));
        assert!(exceeds(TimeDelta::seconds(-61), threshold));
    }
}
