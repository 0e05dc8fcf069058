//! Adds the `assets` table for stock and crypto holdings.
//!
//! The first cut persisted `return_value` and `return_percent` alongside the
//! prices; a later migration drops them in favour of computing returns on
//! read.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Assets {
    Table,
    Id,
    UserId,
    WalletId,
    Kind,
    Symbol,
    Name,
    Quantity,
    BuyPrice,
    LastPrice,
    LastSync,
    ReturnValue,
    ReturnPercent,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}

#[derive(Iden)]
enum Wallets {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Assets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Assets::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Assets::UserId).integer().not_null())
                    .col(ColumnDef::new(Assets::WalletId).integer().not_null())
                    .col(ColumnDef::new(Assets::Kind).string().not_null())
                    .col(ColumnDef::new(Assets::Symbol).string().not_null())
                    .col(ColumnDef::new(Assets::Name).string().not_null())
                    .col(ColumnDef::new(Assets::Quantity).double().not_null())
                    .col(ColumnDef::new(Assets::BuyPrice).big_integer().not_null())
                    .col(
                        ColumnDef::new(Assets::LastPrice)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Assets::LastSync).timestamp())
                    .col(
                        ColumnDef::new(Assets::ReturnValue)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Assets::ReturnPercent)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Assets::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Assets::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Assets::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-assets-user_id")
                            .from(Assets::Table, Assets::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-assets-wallet_id")
                            .from(Assets::Table, Assets::WalletId)
                            .to(Wallets::Table, Wallets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-assets-user_id-symbol")
                    .table(Assets::Table)
                    .col(Assets::UserId)
                    .col(Assets::Symbol)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Assets::Table).to_owned())
            .await
    }
}
