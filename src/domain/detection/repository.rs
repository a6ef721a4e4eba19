//! Detection repository interface

use async_trait::async_trait;
use chrono::NaiveDate;

use super::model::{AnomalyAlert, RefillEvent};
use crate::domain::DomainResult;

#[async_trait]
pub trait DetectionRepository: Send + Sync {
    /// Insert-or-ignore on `(tank_id, detected_at)`. Returns `true` if stored.
    async fn save_refill_event(&self, event: RefillEvent) -> DomainResult<bool>;
    /// Insert-or-ignore on `(tank_id, detection_date)`. Returns `true` if stored.
    async fn save_anomaly_alert(&self, alert: AnomalyAlert) -> DomainResult<bool>;
    async fn refill_events_for_tank(&self, tank_id: i32) -> DomainResult<Vec<RefillEvent>>;
    async fn anomaly_alerts_on(&self, date: NaiveDate) -> DomainResult<Vec<AnomalyAlert>>;
}
