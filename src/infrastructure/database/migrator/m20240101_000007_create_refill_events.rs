//! Create refill_events table

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
                    .table(RefillEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RefillEvents::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RefillEvents::TankId).integer().not_null())
                    .col(
                        ColumnDef::new(RefillEvents::DetectedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RefillEvents::VolumeBefore).double().not_null())
                    .col(ColumnDef::new(RefillEvents::VolumeAfter).double().not_null())
                    .col(ColumnDef::new(RefillEvents::VolumeAdded).double().not_null())
                    .col(ColumnDef::new(RefillEvents::TemperatureBefore).double().not_null())
                    .col(ColumnDef::new(RefillEvents::TemperatureAfter).double().not_null())
                    .col(
                        ColumnDef::new(RefillEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_refill_events_tank")
                            .from(RefillEvents::Table, RefillEvents::TankId)
                            .to(Tanks::Table, Tanks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_refill_events_tank_detected")
                    .table(RefillEvents::Table)
                    .col(RefillEvents::TankId)
                    .col(RefillEvents::DetectedAt)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RefillEvents::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum RefillEvents {
    Table,
    Id,
    TankId,
    DetectedAt,
    VolumeBefore,
    VolumeAfter,
    VolumeAdded,
    TemperatureBefore,
    TemperatureAfter,
    CreatedAt,
}
