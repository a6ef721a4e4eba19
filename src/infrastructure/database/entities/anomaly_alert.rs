//! Anomaly alert entity
//!
//! Unique on `(tank_id, detection_date)`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "anomaly_alerts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tank_id: i32,
    pub detection_date: Date,
    /// POTENTIAL_LOSS | MISSING_DATA
    pub anomaly_type: String,
    #[sea_orm(nullable)]
    pub volume_difference: Option<f64>,
    #[sea_orm(nullable)]
    pub previous_volume: Option<f64>,
    #[sea_orm(nullable)]
    pub current_volume: Option<f64>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
