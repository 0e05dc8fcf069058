//! Initial schema: users, wallets, categories and transactions, plus the
//! system category seed every installation starts with.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Users {
    Table,
    Id,
    TelegramId,
    Username,
    FirstName,
    LastName,
    Timezone,
    Language,
    CreatedAt,
    IsActive,
}

#[derive(Iden)]
enum Wallets {
    Table,
    Id,
    UserId,
    Name,
    Kind,
    Balance,
    InitialBalance,
    Currency,
    Description,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    Name,
    Kind,
    Icon,
    ParentId,
    IsSystem,
    IsActive,
    CreatedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    UserId,
    Kind,
    Amount,
    Description,
    CategoryId,
    FromWalletId,
    ToWalletId,
    OccurredAt,
    CreatedAt,
    Notes,
}

/// System categories seeded on first run: (name, kind, icon).
const SYSTEM_CATEGORIES: &[(&str, &str, &str)] = &[
    ("Gaji", "income", "💰"),
    ("Bisnis", "income", "💼"),
    ("Hadiah", "income", "🎁"),
    ("Hasil Investasi", "income", "📈"),
    ("Sewa", "income", "🏠"),
    ("Pemasukan Lainnya", "income", "🎯"),
    ("Makanan", "expense", "🍽️"),
    ("Rumah Tangga", "expense", "🏠"),
    ("Transportasi", "expense", "🚗"),
    ("Belanja", "expense", "👕"),
    ("Kesehatan", "expense", "🏥"),
    ("Pendidikan", "expense", "📚"),
    ("Hiburan", "expense", "🎬"),
    ("Pengeluaran Lainnya", "expense", "🎯"),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::TelegramId).big_integer().not_null())
                    .col(ColumnDef::new(Users::Username).string())
                    .col(ColumnDef::new(Users::FirstName).string())
                    .col(ColumnDef::new(Users::LastName).string())
                    .col(
                        ColumnDef::new(Users::Timezone)
                            .string()
                            .not_null()
                            .default("Asia/Jakarta"),
                    )
                    .col(
                        ColumnDef::new(Users::Language)
                            .string()
                            .not_null()
                            .default("id"),
                    )
                    .col(ColumnDef::new(Users::CreatedAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(Users::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-users-telegram_id-unique")
                    .table(Users::Table)
                    .col(Users::TelegramId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Wallets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Wallets::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Wallets::UserId).integer().not_null())
                    .col(ColumnDef::new(Wallets::Name).string().not_null())
                    .col(ColumnDef::new(Wallets::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Wallets::Balance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Wallets::InitialBalance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Wallets::Currency)
                            .string()
                            .not_null()
                            .default("IDR"),
                    )
                    .col(ColumnDef::new(Wallets::Description).string())
                    .col(
                        ColumnDef::new(Wallets::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Wallets::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Wallets::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-wallets-user_id")
                            .from(Wallets::Table, Wallets::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-wallets-user_id")
                    .table(Wallets::Table)
                    .col(Wallets::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .col(ColumnDef::new(Categories::Kind).string().not_null())
                    .col(ColumnDef::new(Categories::Icon).string())
                    .col(ColumnDef::new(Categories::ParentId).integer())
                    .col(
                        ColumnDef::new(Categories::IsSystem)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Categories::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Categories::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-categories-kind")
                    .table(Categories::Table)
                    .col(Categories::Kind)
                    .to_owned(),
            )
            .await?;

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
                    .col(ColumnDef::new(Transactions::UserId).integer().not_null())
                    .col(ColumnDef::new(Transactions::Kind).string().not_null())
                    .col(ColumnDef::new(Transactions::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Transactions::Description).string())
                    .col(ColumnDef::new(Transactions::CategoryId).integer())
                    .col(ColumnDef::new(Transactions::FromWalletId).integer())
                    .col(ColumnDef::new(Transactions::ToWalletId).integer())
                    .col(
                        ColumnDef::new(Transactions::OccurredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Notes).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-user_id")
                            .from(Transactions::Table, Transactions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-category_id")
                            .from(Transactions::Table, Transactions::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-from_wallet_id")
                            .from(Transactions::Table, Transactions::FromWalletId)
                            .to(Wallets::Table, Wallets::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-to_wallet_id")
                            .from(Transactions::Table, Transactions::ToWalletId)
                            .to(Wallets::Table, Wallets::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-user_id-occurred_at")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-user_id-kind")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::Kind)
                    .to_owned(),
            )
            .await?;

        let db = manager.get_connection();
        let backend = db.get_database_backend();
        for (name, kind, icon) in SYSTEM_CATEGORIES {
            let stmt = Query::insert()
                .into_table(Categories::Table)
                .columns([
                    Categories::Name,
                    Categories::Kind,
                    Categories::Icon,
                    Categories::IsSystem,
                    Categories::IsActive,
                    Categories::CreatedAt,
                ])
                .values_panic([
                    (*name).into(),
                    (*kind).into(),
                    (*icon).into(),
                    true.into(),
                    true.into(),
                    Expr::current_timestamp().into(),
                ])
                .to_owned();
            db.execute(backend.build(&stmt)).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Wallets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
