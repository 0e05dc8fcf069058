//! Transactions table and the `TransactionKind` enum.
//!
//! A transaction is a single income, expense or transfer event. `amount` is
//! always positive; the kind decides which wallet balance moves and in which
//! direction (income credits `to_wallet`, expense debits `from_wallet`,
//! transfer does both).

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use crate::LedgerError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer,
}

impl TransactionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
            TransactionKind::Transfer => "transfer",
        }
    }

    /// Indonesian label shown in listings.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            TransactionKind::Income => "Pemasukan",
            TransactionKind::Expense => "Pengeluaran",
            TransactionKind::Transfer => "Transfer",
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            "transfer" => Ok(TransactionKind::Transfer),
            other => Err(LedgerError::InvalidKind(format!(
                "unknown transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub kind: String,
    pub amount: i64,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub from_wallet_id: Option<i32>,
    pub to_wallet_id: Option<i32>,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Categories,
    #[sea_orm(
        belongs_to = "super::wallets::Entity",
        from = "Column::FromWalletId",
        to = "super::wallets::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    FromWallet,
    #[sea_orm(
        belongs_to = "super::wallets::Entity",
        from = "Column::ToWalletId",
        to = "super::wallets::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    ToWallet,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Categories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn kind(&self) -> Result<TransactionKind, LedgerError> {
        TransactionKind::try_from(self.kind.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips() {
        for kind in [
            TransactionKind::Income,
            TransactionKind::Expense,
            TransactionKind::Transfer,
        ] {
            assert_eq!(TransactionKind::try_from(kind.as_str()).unwrap(), kind);
        }
        assert!(TransactionKind::try_from("refund").is_err());
    }
}
