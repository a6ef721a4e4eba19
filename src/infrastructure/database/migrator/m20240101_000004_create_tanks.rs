//! Create tanks table

use sea_orm_migration::prelude::*;

use super::m20240101_000002_create_products::Products;
use super::m20240101_000003_create_stations::Stations;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tanks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tanks::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tanks::StationId).integer().not_null())
                    .col(ColumnDef::new(Tanks::TankNumber).integer().not_null())
                    .col(
                        ColumnDef::new(Tanks::Capacity)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(Tanks::ProductId).integer())
                    .col(
                        ColumnDef::new(Tanks::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tanks_station")
                            .from(Tanks::Table, Tanks::StationId)
                            .to(Stations::Table, Stations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tanks_product")
                            .from(Tanks::Table, Tanks::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tanks_station_number")
                    .table(Tanks::Table)
                    .col(Tanks::StationId)
                    .col(Tanks::TankNumber)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tanks::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Tanks {
    Table,
    Id,
    StationId,
    TankNumber,
    Capacity,
    ProductId,
    IsActive,
}
