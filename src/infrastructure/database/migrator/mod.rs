//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_interface_types;
mod m20240101_000002_create_products;
mod m20240101_000003_create_stations;
mod m20240101_000004_create_tanks;
mod m20240101_000005_create_tank_readings;
mod m20240101_000006_create_transactions;
mod m20240101_000007_create_refill_events;
mod m20240101_000008_create_anomaly_alerts;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_interface_types::Migration),
            Box::new(m20240101_000002_create_products::Migration),
            Box::new(m20240101_000003_create_stations::Migration),
            Box::new(m20240101_000004_create_tanks::Migration),
            Box::new(m20240101_000005_create_tank_readings::Migration),
            Box::new(m20240101_000006_create_transactions::Migration),
            Box::new(m20240101_000007_create_refill_events::Migration),
            Box::new(m20240101_000008_create_anomaly_alerts::Migration),
        ]
    }
}
