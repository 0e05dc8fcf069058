//! Asset holdings (stocks and crypto) and their return math.
//!
//! Prices are stored in minor units and refreshed by the bot's price sync;
//! returns are derived on read instead of being persisted (the old schema
//! kept `return_value`/`return_percent` columns that were dropped in the
//! asset rework migration).

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use crate::LedgerError;

/// Number of shares in one lot on the Indonesian stock exchange. Stock
/// quantities are recorded in lots; crypto quantities are recorded directly.
pub const STOCK_LOT_SIZE: f64 = 100.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Stock,
    Crypto,
}

impl AssetKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AssetKind::Stock => "stock",
            AssetKind::Crypto => "crypto",
        }
    }

    /// Indonesian label shown in menus.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            AssetKind::Stock => "Saham",
            AssetKind::Crypto => "Kripto",
        }
    }
}

impl TryFrom<&str> for AssetKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "stock" => Ok(AssetKind::Stock),
            "crypto" => Ok(AssetKind::Crypto),
            other => Err(LedgerError::InvalidKind(format!(
                "unknown asset kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "assets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub wallet_id: i32,
    pub kind: String,
    pub symbol: String,
    pub name: String,
    pub quantity: f64,
    pub buy_price: i64,
    pub last_price: i64,
    pub last_sync: Option<DateTime<Utc>>,
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
    #[sea_orm(
        belongs_to = "super::wallets::Entity",
        from = "Column::WalletId",
        to = "super::wallets::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Wallets,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::wallets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    #[must_use]
    pub fn kind(&self) -> AssetKind {
        AssetKind::try_from(self.kind.as_str()).unwrap_or(AssetKind::Crypto)
    }

    /// Quantity in tradable units: stocks are held in lots of
    /// [`STOCK_LOT_SIZE`] shares, crypto is held directly.
    #[must_use]
    pub fn actual_quantity(&self) -> f64 {
        match self.kind() {
            AssetKind::Stock => self.quantity * STOCK_LOT_SIZE,
            AssetKind::Crypto => self.quantity,
        }
    }

    /// Current market value; falls back to the buy price when no sync has
    /// happened yet.
    #[must_use]
    pub fn current_value(&self) -> i64 {
        let price = if self.last_price > 0 {
            self.last_price
        } else {
            self.buy_price
        };
        (price as f64 * self.actual_quantity()).round() as i64
    }

    /// Total purchase cost at the average buy price.
    #[must_use]
    pub fn total_cost(&self) -> i64 {
        (self.buy_price as f64 * self.actual_quantity()).round() as i64
    }

    /// Unrealized return in minor units. Zero until a price sync happened.
    #[must_use]
    pub fn return_value(&self) -> i64 {
        if self.last_price <= 0 || self.buy_price <= 0 {
            return 0;
        }
        ((self.last_price - self.buy_price) as f64 * self.actual_quantity()).round() as i64
    }

    /// Unrealized return in percent of the buy price. Guarded against a zero
    /// buy price.
    #[must_use]
    pub fn return_percent(&self) -> f64 {
        if self.last_price <= 0 || self.buy_price <= 0 {
            return 0.0;
        }
        (self.last_price - self.buy_price) as f64 / self.buy_price as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(kind: AssetKind, quantity: f64, buy: i64, last: i64) -> Model {
        Model {
            id: 1,
            user_id: 1,
            wallet_id: 1,
            kind: kind.as_str().to_string(),
            symbol: "XXXX".to_string(),
            name: "Test".to_string(),
            quantity,
            buy_price: buy,
            last_price: last,
            last_sync: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn stock_quantity_counts_lots() {
        let a = asset(AssetKind::Stock, 2.0, 1000, 1100);
        assert_eq!(a.actual_quantity(), 200.0);
        assert_eq!(a.return_value(), 20_000);
        assert!((a.return_percent() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn crypto_quantity_is_direct() {
        let a = asset(AssetKind::Crypto, 0.5, 1_000_000_000, 1_100_000_000);
        assert_eq!(a.actual_quantity(), 0.5);
        assert_eq!(a.return_value(), 50_000_000);
    }

    #[test]
    fn zero_buy_price_yields_zero_return() {
        let a = asset(AssetKind::Crypto, 1.0, 0, 5000);
        assert_eq!(a.return_value(), 0);
        assert_eq!(a.return_percent(), 0.0);
    }

    #[test]
    fn unsynced_asset_values_at_cost() {
        let a = asset(AssetKind::Stock, 1.0, 2500, 0);
        assert_eq!(a.current_value(), 250_000);
        assert_eq!(a.return_value(), 0);
    }
}
