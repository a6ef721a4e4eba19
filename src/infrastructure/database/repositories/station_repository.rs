//! SeaORM implementation of StationRepository
//!
//! The registry tables are small; joins are done in memory after one query
//! per table.

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

use crate::domain::{
    DomainError, DomainResult, Product, Station, StationRepository, Tank, TankFilter, TankInfo,
};
use crate::infrastructure::database::entities::{interface_type, product, station, tank};

pub struct SeaOrmStationRepository {
    db: DatabaseConnection,
}

impl SeaOrmStationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Interface type id → code.
    async fn interface_codes(&self) -> DomainResult<HashMap<i32, String>> {
        let types = interface_type::Entity::find()
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(types.into_iter().map(|t| (t.id, t.code)).collect())
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn station_to_domain(m: station::Model, codes: &HashMap<i32, String>) -> Station {
    Station {
        id: m.id,
        code: m.code,
        name: m.name,
        is_active: m.is_active,
        interface_code: m.interface_type_id.and_then(|id| codes.get(&id).cloned()),
        ewura_license_no: m.ewura_license_no,
    }
}

fn tank_to_domain(m: tank::Model) -> Tank {
    Tank {
        id: m.id,
        station_id: m.station_id,
        number: m.tank_number.max(0) as u32,
        capacity: m.capacity,
        product_id: m.product_id,
        is_active: m.is_active,
    }
}

fn product_to_domain(m: product::Model) -> Product {
    Product {
        id: m.id,
        name: m.name,
        color: m.color,
    }
}

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Storage(format!("Database error: {}", e))
}

// ── StationRepository impl ──────────────────────────────────────

#[async_trait]
impl StationRepository for SeaOrmStationRepository {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Station>> {
        let model = station::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        let Some(model) = model else {
            return Ok(None);
        };
        let codes = self.interface_codes().await?;
        Ok(Some(station_to_domain(model, &codes)))
    }

    async fn find_active(&self) -> DomainResult<Vec<Station>> {
        let codes = self.interface_codes().await?;
        let models = station::Entity::find()
            .filter(station::Column::IsActive.eq(true))
            .order_by_asc(station::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models
            .into_iter()
            .map(|m| station_to_domain(m, &codes))
            .collect())
    }

    async fn find_active_by_interfaces(&self, wanted: &[String]) -> DomainResult<Vec<Station>> {
        let codes = self.interface_codes().await?;
        let type_ids: Vec<i32> = codes
            .iter()
            .filter(|(_, code)| wanted.iter().any(|w| code.eq_ignore_ascii_case(w.trim())))
            .map(|(id, _)| *id)
            .collect();
        if type_ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = station::Entity::find()
            .filter(station::Column::IsActive.eq(true))
            .filter(station::Column::InterfaceTypeId.is_in(type_ids))
            .order_by_asc(station::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models
            .into_iter()
            .map(|m| station_to_domain(m, &codes))
            .collect())
    }

    async fn find_tanks(&self, filter: &TankFilter) -> DomainResult<Vec<TankInfo>> {
        let mut query = tank::Entity::find().filter(tank::Column::IsActive.eq(true));
        if let Some(station_id) = filter.station_id {
            query = query.filter(tank::Column::StationId.eq(station_id));
        }
        let tanks = query
            .order_by_asc(tank::Column::StationId)
            .order_by_asc(tank::Column::TankNumber)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let stations: HashMap<i32, Station> = self
            .find_active()
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();
        let products: HashMap<i32, Product> = product::Entity::find()
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|p| (p.id, product_to_domain(p)))
            .collect();

        Ok(tanks
            .into_iter()
            .filter_map(|m| {
                let tank = tank_to_domain(m);
                let station = stations.get(&tank.station_id)?.clone();
                let product = tank.product_id.and_then(|id| products.get(&id).cloned());
                Some(TankInfo {
                    tank,
                    station,
                    product,
                })
            })
            .filter(|info| filter.matches(info))
            .collect())
    }
}
