//! Refill event entity
//!
//! Unique on `(tank_id, detected_at)`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "refill_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tank_id: i32,
    pub detected_at: DateTimeUtc,
    pub volume_before: f64,
    pub volume_after: f64,
    pub volume_added: f64,
    pub temperature_before: f64,
    pub temperature_after: f64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
