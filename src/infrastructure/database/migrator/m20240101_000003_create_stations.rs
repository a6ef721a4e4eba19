//! Create stations table

use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_interface_types::InterfaceTypes;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Stations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Stations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Stations::Code)
                            .string_len(50)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Stations::Name).string().not_null())
                    .col(
                        ColumnDef::new(Stations::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Stations::InterfaceTypeId).integer())
                    .col(ColumnDef::new(Stations::EwuraLicenseNo).string_len(50))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stations_interface_type")
                            .from(Stations::Table, Stations::InterfaceTypeId)
                            .to(InterfaceTypes::Table, InterfaceTypes::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stations_interface_type")
                    .table(Stations::Table)
                    .col(Stations::InterfaceTypeId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Stations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Stations {
    Table,
    Id,
    Code,
    Name,
    IsActive,
    InterfaceTypeId,
    EwuraLicenseNo,
}
