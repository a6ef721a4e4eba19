//! Fuel sale transaction entity
//!
//! Unique on `(station_id, transaction_id, transaction_date)`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub station_id: i32,
    /// Controller-assigned id
    pub transaction_id: String,

    #[sea_orm(nullable)]
    pub pump: Option<i32>,
    #[sea_orm(nullable)]
    pub nozzle: Option<i32>,

    pub volume: f64,
    pub unit_price: f64,
    pub amount: f64,
    pub tc_volume: f64,
    pub discount_amount: f64,

    /// Station-local wall clock
    pub transaction_date: Date,
    pub transaction_time: Time,

    pub fuel_grade_name: String,
    #[sea_orm(nullable)]
    pub customer_name: Option<String>,
    #[sea_orm(nullable)]
    pub efd_serial: Option<String>,
    pub interface_source: String,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
