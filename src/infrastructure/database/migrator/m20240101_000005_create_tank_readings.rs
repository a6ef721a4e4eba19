//! Create tank_readings table
//!
//! One row per (tank, timestamp); corrections overwrite in place.

use sea_orm_migration::prelude::*;

use super::m20240101_000004_create_tanks::Tanks;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TankReadings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TankReadings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TankReadings::TankId).integer().not_null())
                    .col(ColumnDef::new(TankReadings::TankNumber).integer().not_null())
                    .col(
                        ColumnDef::new(TankReadings::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TankReadings::TotalVolume).double().not_null())
                    .col(ColumnDef::new(TankReadings::OilVolume).double().not_null())
                    .col(ColumnDef::new(TankReadings::WaterVolume).double().not_null())
                    .col(ColumnDef::new(TankReadings::TcVolume).double().not_null())
                    .col(ColumnDef::new(TankReadings::Ullage).double().not_null())
                    .col(ColumnDef::new(TankReadings::OilHeight).double().not_null())
                    .col(ColumnDef::new(TankReadings::WaterHeight).double().not_null())
                    .col(ColumnDef::new(TankReadings::Temperature).double().not_null())
                    .col(ColumnDef::new(TankReadings::Density).double())
                    .col(ColumnDef::new(TankReadings::Mass).double())
                    .col(ColumnDef::new(TankReadings::FillPercentage).double())
                    .col(
                        ColumnDef::new(TankReadings::Status)
                            .string_len(10)
                            .not_null()
                            .default("online"),
                    )
                    .col(
                        ColumnDef::new(TankReadings::InterfaceSource)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(TankReadings::RawPayload).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tank_readings_tank")
                            .from(TankReadings::Table, TankReadings::TankId)
                            .to(Tanks::Table, Tanks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tank_readings_tank_timestamp")
                    .table(TankReadings::Table)
                    .col(TankReadings::TankId)
                    .col(TankReadings::Timestamp)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TankReadings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum TankReadings {
    Table,
    Id,
    TankId,
    TankNumber,
    Timestamp,
    TotalVolume,
    OilVolume,
    WaterVolume,
    TcVolume,
    Ullage,
    OilHeight,
    WaterHeight,
    Temperature,
    Density,
    Mass,
    FillPercentage,
    Status,
    InterfaceSource,
    RawPayload,
}
