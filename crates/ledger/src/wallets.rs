//! Wallets table and the `WalletKind` enum.
//!
//! A wallet is a named money container: physical cash, a bank account, an
//! e-wallet, an investment pot or a debt tracker. Balances are stored in
//! minor units and may go negative; deletion is a soft `is_active` flip so
//! old transactions keep their references.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use crate::LedgerError;

/// Kind of money container a wallet represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WalletKind {
    Cash,
    Bank,
    EWallet,
    Investment,
    Debt,
    Other,
}

impl WalletKind {
    pub const ALL: [WalletKind; 6] = [
        WalletKind::Cash,
        WalletKind::Bank,
        WalletKind::EWallet,
        WalletKind::Investment,
        WalletKind::Debt,
        WalletKind::Other,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            WalletKind::Cash => "cash",
            WalletKind::Bank => "bank",
            WalletKind::EWallet => "e_wallet",
            WalletKind::Investment => "investment",
            WalletKind::Debt => "debt",
            WalletKind::Other => "other",
        }
    }

    /// Indonesian label shown in menus.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            WalletKind::Cash => "Tunai",
            WalletKind::Bank => "Bank",
            WalletKind::EWallet => "E-Wallet",
            WalletKind::Investment => "Investasi",
            WalletKind::Debt => "Hutang",
            WalletKind::Other => "Lainnya",
        }
    }

    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            WalletKind::Cash => "💵",
            WalletKind::Bank => "🏦",
            WalletKind::EWallet => "📱",
            WalletKind::Investment => "📈",
            WalletKind::Debt => "💳",
            WalletKind::Other => "👛",
        }
    }
}

impl TryFrom<&str> for WalletKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "cash" => Ok(WalletKind::Cash),
            "bank" => Ok(WalletKind::Bank),
            "e_wallet" => Ok(WalletKind::EWallet),
            "investment" => Ok(WalletKind::Investment),
            "debt" => Ok(WalletKind::Debt),
            "other" => Ok(WalletKind::Other),
            other => Err(LedgerError::InvalidKind(format!(
                "unknown wallet kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub kind: String,
    pub balance: i64,
    pub initial_balance: i64,
    pub currency: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
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
    #[sea_orm(has_many = "super::assets::Entity")]
    Assets,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::assets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parsed wallet kind; falls back to [`WalletKind::Other`] for rows
    /// written before the kind list was final.
    #[must_use]
    pub fn kind(&self) -> WalletKind {
        WalletKind::try_from(self.kind.as_str()).unwrap_or(WalletKind::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips() {
        for kind in WalletKind::ALL {
            assert_eq!(WalletKind::try_from(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(WalletKind::try_from("credit_card").is_err());
    }
}
