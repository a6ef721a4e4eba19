//! Refill / anomaly detector
//!
//! Pure read-then-write analysis with no timers of its own; a scheduler (or
//! the `detect` command) decides when it runs. Volumes are total product
//! volumes. Day boundaries are UTC.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use tracing::{info, warn};

use crate::domain::{
    AnomalyAlert, AnomalyType, DomainError, DomainResult, RefillEvent, RepositoryProvider,
    TankFilter, TankReading,
};

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// Increase between consecutive readings that counts as a delivery
    pub refill_threshold: f64,
    /// Overnight decrease that counts as a potential loss
    pub anomaly_threshold: f64,
    pub refill_window: Duration,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            refill_threshold: 500.0,
            anomaly_threshold: 100.0,
            refill_window: Duration::from_secs(24 * 3600),
        }
    }
}

/// Refill events in an ascending reading series: every step whose increase
/// is strictly above `threshold`.
pub fn classify_refills(tank_id: i32, readings: &[TankReading], threshold: f64) -> Vec<RefillEvent> {
    readings
        .windows(2)
        .filter_map(|pair| {
            let (before, after) = (&pair[0], &pair[1]);
            let added = after.measurement.total_volume - before.measurement.total_volume;
            (added > threshold).then(|| RefillEvent {
                tank_id,
                detected_at: after.timestamp,
                volume_before: before.measurement.total_volume,
                volume_after: after.measurement.total_volume,
                volume_added: added,
                temperature_before: before.measurement.temperature,
                temperature_after: after.measurement.temperature,
            })
        })
        .collect()
}

/// Day-boundary check for one tank: last reading of the previous day
/// against the first reading of `date`.
pub fn classify_daily(
    tank_id: i32,
    date: NaiveDate,
    last_previous: Option<&TankReading>,
    first_current: Option<&TankReading>,
    threshold: f64,
) -> Option<AnomalyAlert> {
    match (last_previous, first_current) {
        (Some(prev), Some(curr)) => {
            let previous = prev.measurement.total_volume;
            let current = curr.measurement.total_volume;
            let difference = previous - current;
            (difference > threshold).then_some(AnomalyAlert {
                tank_id,
                detection_date: date,
                anomaly_type: AnomalyType::PotentialLoss,
                volume_difference: Some(difference),
                previous_volume: Some(previous),
                current_volume: Some(current),
            })
        }
        (prev, curr) => Some(AnomalyAlert {
            tank_id,
            detection_date: date,
            anomaly_type: AnomalyType::MissingData,
            volume_difference: None,
            previous_volume: prev.map(|r| r.measurement.total_volume),
            current_volume: curr.map(|r| r.measurement.total_volume),
        }),
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

pub struct RefillAnomalyDetector {
    repos: Arc<dyn RepositoryProvider>,
    settings: DetectorSettings,
}

impl RefillAnomalyDetector {
    pub fn new(repos: Arc<dyn RepositoryProvider>, settings: DetectorSettings) -> Self {
        Self { repos, settings }
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    /// Refills for one tank over the trailing window ending now.
    pub async fn detect_refill_events(&self, tank_id: i32) -> DomainResult<Vec<RefillEvent>> {
        let to = Utc::now();
        let window = TimeDelta::from_std(self.settings.refill_window)
            .map_err(|e| DomainError::Validation(format!("refill window: {e}")))?;
        // include a reading stamped exactly now
        self.detect_refill_events_between(tank_id, to - window, to + TimeDelta::seconds(1))
            .await
    }

    /// Refills for one tank in `[from, to)`, persisted insert-or-ignore.
    pub async fn detect_refill_events_between(
        &self,
        tank_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<RefillEvent>> {
        let readings = self.repos.readings().find_between(tank_id, from, to).await?;
        let events = classify_refills(tank_id, &readings, self.settings.refill_threshold);

        let mut stored = 0;
        for event in &events {
            if self
                .repos
                .detections()
                .save_refill_event(event.clone())
                .await?
            {
                stored += 1;
            }
        }
        if !events.is_empty() {
            info!(
                tank_id,
                detected = events.len(),
                stored,
                "⛽ Refill events detected"
            );
            metrics::counter!("detector_refill_events_total").increment(stored);
        }
        Ok(events)
    }

    /// Refill detection over every active tank, optionally one station's.
    ///
    /// A failing tank is logged and skipped.
    pub async fn detect_all_refill_events(&self, station_id: Option<i32>) -> DomainResult<Vec<RefillEvent>> {
        let tanks = self
            .repos
            .stations()
            .find_tanks(&TankFilter {
                station_id,
                interface_codes: Vec::new(),
            })
            .await?;

        let mut all = Vec::new();
        for info in tanks {
            match self.detect_refill_events(info.tank.id).await {
                Ok(events) => all.extend(events),
                Err(e) => warn!(tank_id = info.tank.id, error = %e, "Refill detection failed"),
            }
        }
        Ok(all)
    }

    /// Day-boundary anomalies for `date` (default today, UTC) over every
    /// active tank, optionally one station's.
    pub async fn detect_daily_anomalies(
        &self,
        station_id: Option<i32>,
        date: Option<NaiveDate>,
    ) -> DomainResult<Vec<AnomalyAlert>> {
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        let current_start = day_start(date);
        let previous_start = current_start - TimeDelta::days(1);
        let next_start = current_start + TimeDelta::days(1);

        let tanks = self
            .repos
            .stations()
            .find_tanks(&TankFilter {
                station_id,
                interface_codes: Vec::new(),
            })
            .await?;

        let mut alerts = Vec::new();
        for info in tanks {
            let tank_id = info.tank.id;
            let readings = self.repos.readings();
            let last_previous = readings.last_between(tank_id, previous_start, current_start).await?;
            let first_current = readings.first_between(tank_id, current_start, next_start).await?;

            let Some(alert) = classify_daily(
                tank_id,
                date,
                last_previous.as_ref(),
                first_current.as_ref(),
                self.settings.anomaly_threshold,
            ) else {
                continue;
            };

            let stored = self
                .repos
                .detections()
                .save_anomaly_alert(alert.clone())
                .await?;
            match alert.anomaly_type {
                AnomalyType::PotentialLoss => warn!(
                    tank_id,
                    %date,
                    difference = alert.volume_difference,
                    stored,
                    "🚨 Potential loss detected"
                ),
                AnomalyType::MissingData => info!(tank_id, %date, stored, "Boundary readings missing"),
            }
            if stored {
                metrics::counter!("detector_anomaly_alerts_total", "type" => alert.anomaly_type.as_str())
                    .increment(1);
            }
            alerts.push(alert);
        }
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Station, Tank, TankMeasurement, TankStatus};
    use crate::infrastructure::storage::InMemoryRepositoryProvider;
    use chrono::TimeZone;

    fn reading(tank_id: i32, at: DateTime<Utc>, volume: f64) -> TankReading {
        TankReading {
            tank_id,
            tank_number: tank_id as u32,
            timestamp: at,
            measurement: TankMeasurement::new(volume, 0.0, volume, 0.0, 0.0, 0.0, 25.0),
            status: TankStatus::Online,
            interface_source: "ATG".into(),
            raw_payload: None,
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn refill_threshold_is_strict() {
        let series = [
            reading(1, at(1, 0), 1000.0),
            reading(1, at(1, 1), 1500.0),
            reading(1, at(1, 2), 2001.0),
        ];
        let events = classify_refills(1, &series, 500.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].volume_added, 501.0);
        assert_eq!(events[0].detected_at, at(1, 2));
        assert_eq!(events[0].volume_before, 1500.0);
    }

    #[test]
    fn anomaly_threshold_is_strict() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let prev = reading(1, at(1, 23), 9000.0);

        let at_limit = reading(1, at(2, 0), 8900.0);
        assert!(classify_daily(1, date, Some(&prev), Some(&at_limit), 100.0).is_none());

        let beyond = reading(1, at(2, 0), 8899.0);
        let alert = classify_daily(1, date, Some(&prev), Some(&beyond), 100.0).unwrap();
        assert_eq!(alert.anomaly_type, AnomalyType::PotentialLoss);
        assert_eq!(alert.volume_difference, Some(101.0));
    }

    #[test]
    fn missing_boundary_is_reported_not_a_loss() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let curr = reading(1, at(2, 0), 8000.0);
        let alert = classify_daily(1, date, None, Some(&curr), 100.0).unwrap();
        assert_eq!(alert.anomaly_type, AnomalyType::MissingData);
        assert_eq!(alert.volume_difference, None);
        assert_eq!(alert.current_volume, Some(8000.0));
    }

    #[tokio::test]
    async fn detects_loss_and_refill_end_to_end() {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        repos.insert_station(Station {
            id: 1,
            code: "ST-1".into(),
            name: "Depot".into(),
            is_active: true,
            interface_code: Some("ATG".into()),
            ewura_license_no: None,
        });
        for (id, number) in [(1, 1), (2, 2)] {
            repos.insert_tank(Tank {
                id,
                station_id: 1,
                number,
                capacity: 20000.0,
                product_id: None,
                is_active: true,
            });
        }

        let readings = repos.readings();
        readings.upsert(reading(1, at(1, 22), 9100.0)).await.unwrap();
        readings.upsert(reading(1, at(1, 23), 9000.0)).await.unwrap();
        readings.upsert(reading(1, at(2, 6), 8850.0)).await.unwrap();
        readings.upsert(reading(1, at(2, 9), 8700.0)).await.unwrap();

        let now = Utc::now();
        readings
            .upsert(reading(2, now - TimeDelta::hours(3), 9000.0))
            .await
            .unwrap();
        readings
            .upsert(reading(2, now - TimeDelta::hours(1), 9600.0))
            .await
            .unwrap();

        let detector = RefillAnomalyDetector::new(repos.clone(), DetectorSettings::default());

        let date = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let alerts = detector.detect_daily_anomalies(Some(1), Some(date)).await.unwrap();
        let loss: Vec<_> = alerts
            .iter()
            .filter(|a| a.anomaly_type == AnomalyType::PotentialLoss)
            .collect();
        assert_eq!(loss.len(), 1);
        assert_eq!(loss[0].tank_id, 1);
        assert_eq!(loss[0].volume_difference, Some(150.0));
        // tank 2 has nothing around that date
        assert!(alerts
            .iter()
            .any(|a| a.tank_id == 2 && a.anomaly_type == AnomalyType::MissingData));

        let events = detector.detect_refill_events(2).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].volume_added, 600.0);

        // re-running stores nothing new
        detector.detect_refill_events(2).await.unwrap();
        detector.detect_daily_anomalies(Some(1), Some(date)).await.unwrap();
        let detections = repos.detections();
        assert_eq!(detections.refill_events_for_tank(2).await.unwrap().len(), 1);
        assert_eq!(detections.anomaly_alerts_on(date).await.unwrap().len(), 2);

        let all = detector.detect_all_refill_events(None).await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
