//! Tank reading entity
//!
//! Unique on `(tank_id, timestamp)`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tank_readings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tank_id: i32,
    pub tank_number: i32,
    pub timestamp: DateTimeUtc,

    pub total_volume: f64,
    pub oil_volume: f64,
    pub water_volume: f64,
    pub tc_volume: f64,
    pub ullage: f64,
    pub oil_height: f64,
    pub water_height: f64,
    pub temperature: f64,

    #[sea_orm(nullable)]
    pub density: Option<f64>,
    #[sea_orm(nullable)]
    pub mass: Option<f64>,
    #[sea_orm(nullable)]
    pub fill_percentage: Option<f64>,

    /// online | offline
    pub status: String,
    pub interface_source: String,

    /// Vendor payload as JSON text
    #[sea_orm(column_type = "Text", nullable)]
    pub raw_payload: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
