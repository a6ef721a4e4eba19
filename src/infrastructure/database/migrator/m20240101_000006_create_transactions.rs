//! Create transactions table
//!
//! Insert-or-ignore target keyed by (station, controller id, date).

use sea_orm_migration::prelude::*;

use super::m20240101_000003_create_stations::Stations;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::StationId).integer().not_null())
                    .col(
                        ColumnDef::new(Transactions::TransactionId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Pump).integer())
                    .col(ColumnDef::new(Transactions::Nozzle).integer())
                    .col(ColumnDef::new(Transactions::Volume).double().not_null())
                    .col(ColumnDef::new(Transactions::UnitPrice).double().not_null())
                    .col(ColumnDef::new(Transactions::Amount).double().not_null())
                    .col(ColumnDef::new(Transactions::TcVolume).double().not_null())
                    .col(
                        ColumnDef::new(Transactions::DiscountAmount)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(Transactions::TransactionDate).date().not_null())
                    .col(ColumnDef::new(Transactions::TransactionTime).time().not_null())
                    .col(
                        ColumnDef::new(Transactions::FuelGradeName)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::CustomerName).string())
                    .col(ColumnDef::new(Transactions::EfdSerial).string_len(50))
                    .col(
                        ColumnDef::new(Transactions::InterfaceSource)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transactions_station")
                            .from(Transactions::Table, Transactions::StationId)
                            .to(Stations::Table, Stations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_natural_key")
                    .table(Transactions::Table)
                    .col(Transactions::StationId)
                    .col(Transactions::TransactionId)
                    .col(Transactions::TransactionDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_occurred")
                    .table(Transactions::Table)
                    .col(Transactions::StationId)
                    .col(Transactions::TransactionDate)
                    .col(Transactions::TransactionTime)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Transactions {
    Table,
    Id,
    StationId,
    TransactionId,
    Pump,
    Nozzle,
    Volume,
    UnitPrice,
    Amount,
    TcVolume,
    DiscountAmount,
    TransactionDate,
    TransactionTime,
    FuelGradeName,
    CustomerName,
    EfdSerial,
    InterfaceSource,
    CreatedAt,
}
