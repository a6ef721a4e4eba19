//! SeaORM implementation of DetectionRepository

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use log::debug;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter, QueryOrder, Set};

use crate::domain::{
    AnomalyAlert, AnomalyType, DetectionRepository, DomainError, DomainResult, RefillEvent,
};
use crate::infrastructure::database::entities::{anomaly_alert, refill_event};

pub struct SeaOrmDetectionRepository {
    db: DatabaseConnection,
}

impl SeaOrmDetectionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn refill_to_domain(m: refill_event::Model) -> RefillEvent {
    RefillEvent {
        tank_id: m.tank_id,
        detected_at: m.detected_at,
        volume_before: m.volume_before,
        volume_after: m.volume_after,
        volume_added: m.volume_added,
        temperature_before: m.temperature_before,
        temperature_after: m.temperature_after,
    }
}

fn alert_to_domain(m: anomaly_alert::Model) -> Option<AnomalyAlert> {
    Some(AnomalyAlert {
        tank_id: m.tank_id,
        detection_date: m.detection_date,
        anomaly_type: AnomalyType::from_str(&m.anomaly_type)?,
        volume_difference: m.volume_difference,
        previous_volume: m.previous_volume,
        current_volume: m.current_volume,
    })
}

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Storage(format!("Database error: {}", e))
}

// ── DetectionRepository impl ────────────────────────────────────

#[async_trait]
impl DetectionRepository for SeaOrmDetectionRepository {
    async fn save_refill_event(&self, e: RefillEvent) -> DomainResult<bool> {
        debug!("Saving refill event: tank={} at {}", e.tank_id, e.detected_at);

        let model = refill_event::ActiveModel {
            id: NotSet,
            tank_id: Set(e.tank_id),
            detected_at: Set(e.detected_at),
            volume_before: Set(e.volume_before),
            volume_after: Set(e.volume_after),
            volume_added: Set(e.volume_added),
            temperature_before: Set(e.temperature_before),
            temperature_after: Set(e.temperature_after),
            created_at: Set(Utc::now()),
        };
        let inserted = refill_event::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([refill_event::Column::TankId, refill_event::Column::DetectedAt])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;
        Ok(inserted > 0)
    }

    async fn save_anomaly_alert(&self, a: AnomalyAlert) -> DomainResult<bool> {
        debug!(
            "Saving anomaly alert: tank={} date={} type={}",
            a.tank_id, a.detection_date, a.anomaly_type
        );

        let model = anomaly_alert::ActiveModel {
            id: NotSet,
            tank_id: Set(a.tank_id),
            detection_date: Set(a.detection_date),
            anomaly_type: Set(a.anomaly_type.as_str().to_string()),
            volume_difference: Set(a.volume_difference),
            previous_volume: Set(a.previous_volume),
            current_volume: Set(a.current_volume),
            created_at: Set(Utc::now()),
        };
        let inserted = anomaly_alert::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    anomaly_alert::Column::TankId,
                    anomaly_alert::Column::DetectionDate,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;
        Ok(inserted > 0)
    }

    async fn refill_events_for_tank(&self, tank_id: i32) -> DomainResult<Vec<RefillEvent>> {
        let models = refill_event::Entity::find()
            .filter(refill_event::Column::TankId.eq(tank_id))
            .order_by_asc(refill_event::Column::DetectedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(refill_to_domain).collect())
    }

    async fn anomaly_alerts_on(&self, date: NaiveDate) -> DomainResult<Vec<AnomalyAlert>> {
        let models = anomaly_alert::Entity::find()
            .filter(anomaly_alert::Column::DetectionDate.eq(date))
            .order_by_asc(anomaly_alert::Column::TankId)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().filter_map(alert_to_domain).collect())
    }
}
