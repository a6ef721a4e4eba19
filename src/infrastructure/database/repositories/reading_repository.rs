//! SeaORM implementation of ReadingRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, NotSet, PaginatorTrait, QueryFilter, QueryOrder,
    Select, Set,
};

use crate::domain::{
    DomainError, DomainResult, ReadingRepository, TankMeasurement, TankReading, TankStatus,
};
use crate::infrastructure::database::entities::tank_reading;

pub struct SeaOrmReadingRepository {
    db: DatabaseConnection,
}

impl SeaOrmReadingRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn range(tank_id: i32, from: DateTime<Utc>, to: DateTime<Utc>) -> Select<tank_reading::Entity> {
        tank_reading::Entity::find()
            .filter(tank_reading::Column::TankId.eq(tank_id))
            .filter(tank_reading::Column::Timestamp.gte(from))
            .filter(tank_reading::Column::Timestamp.lt(to))
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: tank_reading::Model) -> TankReading {
    TankReading {
        tank_id: m.tank_id,
        tank_number: m.tank_number.max(0) as u32,
        timestamp: m.timestamp,
        // stored values are already rounded and derived
        measurement: TankMeasurement {
            total_volume: m.total_volume,
            oil_volume: m.oil_volume,
            water_volume: m.water_volume,
            tc_volume: m.tc_volume,
            ullage: m.ullage,
            oil_height: m.oil_height,
            water_height: m.water_height,
            temperature: m.temperature,
            density: m.density,
            mass: m.mass,
            fill_percentage: m.fill_percentage,
        },
        status: TankStatus::from_str(&m.status).unwrap_or(TankStatus::Offline),
        interface_source: m.interface_source,
        raw_payload: m
            .raw_payload
            .and_then(|raw| serde_json::from_str(&raw).ok()),
    }
}

fn domain_to_active(r: TankReading) -> tank_reading::ActiveModel {
    let m = r.measurement;
    tank_reading::ActiveModel {
        id: NotSet,
        tank_id: Set(r.tank_id),
        tank_number: Set(r.tank_number as i32),
        timestamp: Set(r.timestamp),
        total_volume: Set(m.total_volume),
        oil_volume: Set(m.oil_volume),
        water_volume: Set(m.water_volume),
        tc_volume: Set(m.tc_volume),
        ullage: Set(m.ullage),
        oil_height: Set(m.oil_height),
        water_height: Set(m.water_height),
        temperature: Set(m.temperature),
        density: Set(m.density),
        mass: Set(m.mass),
        fill_percentage: Set(m.fill_percentage),
        status: Set(r.status.as_str().to_string()),
        interface_source: Set(r.interface_source),
        raw_payload: Set(r.raw_payload.map(|v| v.to_string())),
    }
}

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Storage(format!("Database error: {}", e))
}

// ── ReadingRepository impl ──────────────────────────────────────

#[async_trait]
impl ReadingRepository for SeaOrmReadingRepository {
    async fn upsert(&self, reading: TankReading) -> DomainResult<()> {
        debug!(
            "Upserting reading: tank={} at {}",
            reading.tank_id, reading.timestamp
        );
        use tank_reading::Column as C;

        tank_reading::Entity::insert(domain_to_active(reading))
            .on_conflict(
                OnConflict::columns([C::TankId, C::Timestamp])
                    .update_columns([
                        C::TankNumber,
                        C::TotalVolume,
                        C::OilVolume,
                        C::WaterVolume,
                        C::TcVolume,
                        C::Ullage,
                        C::OilHeight,
                        C::WaterHeight,
                        C::Temperature,
                        C::Density,
                        C::Mass,
                        C::FillPercentage,
                        C::Status,
                        C::InterfaceSource,
                        C::RawPayload,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn latest_for_tank(&self, tank_id: i32) -> DomainResult<Option<TankReading>> {
        let model = tank_reading::Entity::find()
            .filter(tank_reading::Column::TankId.eq(tank_id))
            .order_by_desc(tank_reading::Column::Timestamp)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn find_between(
        &self,
        tank_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<TankReading>> {
        let models = Self::range(tank_id, from, to)
            .order_by_asc(tank_reading::Column::Timestamp)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn first_between(
        &self,
        tank_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Option<TankReading>> {
        let model = Self::range(tank_id, from, to)
            .order_by_asc(tank_reading::Column::Timestamp)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn last_between(
        &self,
        tank_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Option<TankReading>> {
        let model = Self::range(tank_id, from, to)
            .order_by_desc(tank_reading::Column::Timestamp)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn count_for_tank(&self, tank_id: i32) -> DomainResult<u64> {
        tank_reading::Entity::find()
            .filter(tank_reading::Column::TankId.eq(tank_id))
            .count(&self.db)
            .await
            .map_err(db_err)
    }
}
