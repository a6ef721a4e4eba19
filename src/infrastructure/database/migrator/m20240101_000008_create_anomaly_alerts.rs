//! Create anomaly_alerts table

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
                    .table(AnomalyAlerts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AnomalyAlerts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AnomalyAlerts::TankId).integer().not_null())
                    .col(ColumnDef::new(AnomalyAlerts::DetectionDate).date().not_null())
                    .col(
                        ColumnDef::new(AnomalyAlerts::AnomalyType)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AnomalyAlerts::VolumeDifference).double())
                    .col(ColumnDef::new(AnomalyAlerts::PreviousVolume).double())
                    .col(ColumnDef::new(AnomalyAlerts::CurrentVolume).double())
                    .col(
                        ColumnDef::new(AnomalyAlerts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_anomaly_alerts_tank")
                            .from(AnomalyAlerts::Table, AnomalyAlerts::TankId)
                            .to(Tanks::Table, Tanks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_anomaly_alerts_tank_date")
                    .table(AnomalyAlerts::Table)
                    .col(AnomalyAlerts::TankId)
                    .col(AnomalyAlerts::DetectionDate)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AnomalyAlerts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum AnomalyAlerts {
    Table,
    Id,
    TankId,
    DetectionDate,
    AnomalyType,
    VolumeDifference,
    PreviousVolume,
    CurrentVolume,
    CreatedAt,
}
