//! Stock and crypto holdings.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, DatabaseConnection, QueryFilter, QueryOrder, prelude::*};
use tracing::info;

use crate::{AssetKind, LedgerError, Money, ResultLedger, assets};

#[derive(Clone, Debug)]
pub struct NewAsset {
    pub wallet_id: i32,
    pub kind: AssetKind,
    pub symbol: String,
    pub name: String,
    /// Lots for stocks, units for crypto.
    pub quantity: f64,
    pub buy_price: Money,
}

/// One field of a holding, as changed through the edit flow.
#[derive(Clone, Debug)]
pub enum AssetUpdate {
    Quantity(f64),
    BuyPrice(Money),
    Name(String),
}

/// Totals over all active holdings of one user.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PortfolioSummary {
    pub total_value: Money,
    pub total_cost: Money,
    pub total_return: Money,
    pub return_percent: f64,
}

#[derive(Clone)]
pub struct AssetService {
    db: DatabaseConnection,
}

impl AssetService {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn add(&self, user_id: i32, new: NewAsset) -> ResultLedger<assets::Model> {
        if new.quantity <= 0.0 {
            return Err(LedgerError::InvalidAmount(
                "quantity must be positive".to_string(),
            ));
        }
        if !new.buy_price.is_positive() {
            return Err(LedgerError::InvalidAmount(
                "buy price must be positive".to_string(),
            ));
        }
        let symbol = new.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(LedgerError::InvalidKind("symbol is empty".to_string()));
        }
        let duplicate = assets::Entity::find()
            .filter(assets::Column::UserId.eq(user_id))
            .filter(assets::Column::Symbol.eq(symbol.as_str()))
            .filter(assets::Column::IsActive.eq(true))
            .one(&self.db)
            .await?;
        if duplicate.is_some() {
            return Err(LedgerError::ExistingKey(symbol));
        }

        let now = Utc::now();
        let created = assets::ActiveModel {
            user_id: ActiveValue::Set(user_id),
            wallet_id: ActiveValue::Set(new.wallet_id),
            kind: ActiveValue::Set(new.kind.as_str().to_string()),
            symbol: ActiveValue::Set(symbol.clone()),
            name: ActiveValue::Set(new.name.trim().to_string()),
            quantity: ActiveValue::Set(new.quantity),
            buy_price: ActiveValue::Set(new.buy_price.minor()),
            last_price: ActiveValue::Set(0),
            last_sync: ActiveValue::Set(None),
            is_active: ActiveValue::Set(true),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        info!(user_id, symbol = %symbol, "asset added");
        Ok(created)
    }

    pub async fn list(&self, user_id: i32) -> ResultLedger<Vec<assets::Model>> {
        let rows = assets::Entity::find()
            .filter(assets::Column::UserId.eq(user_id))
            .filter(assets::Column::IsActive.eq(true))
            .order_by_asc(assets::Column::Symbol)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    pub async fn list_by_kind(
        &self,
        user_id: i32,
        kind: AssetKind,
    ) -> ResultLedger<Vec<assets::Model>> {
        let rows = assets::Entity::find()
            .filter(assets::Column::UserId.eq(user_id))
            .filter(assets::Column::Kind.eq(kind.as_str()))
            .filter(assets::Column::IsActive.eq(true))
            .order_by_asc(assets::Column::Symbol)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    pub async fn by_symbol(
        &self,
        user_id: i32,
        symbol: &str,
    ) -> ResultLedger<Option<assets::Model>> {
        let row = assets::Entity::find()
            .filter(assets::Column::UserId.eq(user_id))
            .filter(assets::Column::Symbol.eq(symbol.trim().to_uppercase()))
            .filter(assets::Column::IsActive.eq(true))
            .one(&self.db)
            .await?;
        Ok(row)
    }

    /// Change one field of a holding, e.g. after averaging down or a partial
    /// sell.
    pub async fn edit(
        &self,
        user_id: i32,
        asset_id: i32,
        update: AssetUpdate,
    ) -> ResultLedger<assets::Model> {
        let asset = self.require(user_id, asset_id).await?;
        let mut active: assets::ActiveModel = asset.into();
        match update {
            AssetUpdate::Quantity(quantity) => {
                if quantity <= 0.0 {
                    return Err(LedgerError::InvalidAmount(
                        "quantity must be positive".to_string(),
                    ));
                }
                active.quantity = ActiveValue::Set(quantity);
            }
            AssetUpdate::BuyPrice(price) => {
                if !price.is_positive() {
                    return Err(LedgerError::InvalidAmount(
                        "buy price must be positive".to_string(),
                    ));
                }
                active.buy_price = ActiveValue::Set(price.minor());
            }
            AssetUpdate::Name(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(LedgerError::InvalidKind("asset name is empty".to_string()));
                }
                active.name = ActiveValue::Set(name);
            }
        }
        active.updated_at = ActiveValue::Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    /// Soft delete the holding.
    pub async fn remove(&self, user_id: i32, asset_id: i32) -> ResultLedger<()> {
        let asset = self.require(user_id, asset_id).await?;
        let mut active: assets::ActiveModel = asset.into();
        active.is_active = ActiveValue::Set(false);
        active.updated_at = ActiveValue::Set(Utc::now());
        active.update(&self.db).await?;
        Ok(())
    }

    /// Record a successfully fetched market price. Failed fetches never reach
    /// this point, so a stale price stays untouched.
    pub async fn apply_price(
        &self,
        asset_id: i32,
        price: Money,
        fetched_at: DateTime<Utc>,
    ) -> ResultLedger<()> {
        if !price.is_positive() {
            return Err(LedgerError::InvalidAmount(
                "price must be positive".to_string(),
            ));
        }
        let asset = assets::Entity::find_by_id(asset_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| LedgerError::KeyNotFound(format!("asset {asset_id}")))?;
        let mut active: assets::ActiveModel = asset.into();
        active.last_price = ActiveValue::Set(price.minor());
        active.last_sync = ActiveValue::Set(Some(fetched_at));
        active.updated_at = ActiveValue::Set(fetched_at);
        active.update(&self.db).await?;
        Ok(())
    }

    pub async fn portfolio_summary(&self, user_id: i32) -> ResultLedger<PortfolioSummary> {
        let holdings = self.list(user_id).await?;
        let mut summary = PortfolioSummary::default();
        for asset in &holdings {
            summary.total_value += Money::new(asset.current_value());
            summary.total_cost += Money::new(asset.total_cost());
            summary.total_return += Money::new(asset.return_value());
        }
        if summary.total_cost.is_positive() {
            summary.return_percent =
                summary.total_return.minor() as f64 / summary.total_cost.minor() as f64 * 100.0;
        }
        Ok(summary)
    }

    async fn require(&self, user_id: i32, asset_id: i32) -> ResultLedger<assets::Model> {
        assets::Entity::find_by_id(asset_id)
            .filter(assets::Column::UserId.eq(user_id))
            .filter(assets::Column::IsActive.eq(true))
            .one(&self.db)
            .await?
            .ok_or_else(|| LedgerError::KeyNotFound(format!("asset {asset_id}")))
    }
}
