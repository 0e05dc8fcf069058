//! Users, wallets, categories and transaction booking.

use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseConnection, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*,
};
use tracing::info;

use crate::{
    LedgerError, Money, ResultLedger, TransactionKind, WalletKind, categories, transactions,
    users, wallets,
};

/// Identity fields Telegram hands us with every update.
#[derive(Clone, Debug, Default)]
pub struct TelegramProfile {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewWallet {
    pub name: String,
    pub kind: WalletKind,
    pub initial_balance: Money,
    pub description: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub amount: Money,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub from_wallet_id: Option<i32>,
    pub to_wallet_id: Option<i32>,
    pub notes: Option<String>,
}

/// Criteria for listing booked transactions. `Default` means everything,
/// newest first.
#[derive(Clone, Debug, Default)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub since: Option<DateTimeUtc>,
    pub until: Option<DateTimeUtc>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Clone)]
pub struct UserService {
    db: DatabaseConnection,
}

impl UserService {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Everyone who has not deactivated their account. The scheduler walks
    /// this list when pushing reports.
    pub async fn active_users(&self) -> ResultLedger<Vec<users::Model>> {
        let rows = users::Entity::find()
            .filter(users::Column::IsActive.eq(true))
            .order_by_asc(users::Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    pub async fn by_telegram_id(&self, telegram_id: i64) -> ResultLedger<Option<users::Model>> {
        let user = users::Entity::find()
            .filter(users::Column::TelegramId.eq(telegram_id))
            .one(&self.db)
            .await?;
        Ok(user)
    }

    /// Look up the user and refresh the profile fields Telegram sends with
    /// every message. `last_activity` always moves forward.
    pub async fn touch(&self, profile: &TelegramProfile) -> ResultLedger<Option<users::Model>> {
        let Some(user) = self.by_telegram_id(profile.telegram_id).await? else {
            return Ok(None);
        };
        let mut active: users::ActiveModel = user.into();
        active.username = ActiveValue::Set(profile.username.clone());
        active.first_name = ActiveValue::Set(profile.first_name.clone());
        active.last_name = ActiveValue::Set(profile.last_name.clone());
        active.last_activity = ActiveValue::Set(Utc::now());
        active.updated_at = ActiveValue::Set(Utc::now());
        Ok(Some(active.update(&self.db).await?))
    }

    pub async fn wallets(&self, user_id: i32) -> ResultLedger<Vec<wallets::Model>> {
        let rows = wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id))
            .filter(wallets::Column::IsActive.eq(true))
            .order_by_asc(wallets::Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    pub async fn wallet_by_id(&self, user_id: i32, wallet_id: i32) -> ResultLedger<wallets::Model> {
        self.wallet_by_id_on(&self.db, user_id, wallet_id).await
    }

    /// Wallet lookup over an arbitrary connection. `create_transaction` calls
    /// this with its open transaction so the reads see the same snapshot the
    /// balance updates write to.
    async fn wallet_by_id_on<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: i32,
        wallet_id: i32,
    ) -> ResultLedger<wallets::Model> {
        wallets::Entity::find_by_id(wallet_id)
            .filter(wallets::Column::UserId.eq(user_id))
            .filter(wallets::Column::IsActive.eq(true))
            .one(db)
            .await?
            .ok_or_else(|| LedgerError::KeyNotFound(format!("wallet {wallet_id}")))
    }

    /// Case-insensitive name match. Exact match wins over substring match so
    /// "BCA" resolves before "BCA Tabungan".
    pub async fn wallet_by_name(
        &self,
        user_id: i32,
        name: &str,
    ) -> ResultLedger<Option<wallets::Model>> {
        let needle = name.trim().to_lowercase();
        let rows = self.wallets(user_id).await?;
        let exact = rows.iter().find(|w| w.name.to_lowercase() == needle);
        if let Some(wallet) = exact {
            return Ok(Some(wallet.clone()));
        }
        Ok(rows
            .into_iter()
            .find(|w| w.name.to_lowercase().contains(&needle)))
    }

    pub async fn create_wallet(
        &self,
        user_id: i32,
        wallet: NewWallet,
    ) -> ResultLedger<wallets::Model> {
        let name = wallet.name.trim().to_string();
        if name.is_empty() {
            return Err(LedgerError::InvalidKind("wallet name is empty".to_string()));
        }
        let duplicate = wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id))
            .filter(wallets::Column::Name.eq(name.as_str()))
            .filter(wallets::Column::IsActive.eq(true))
            .one(&self.db)
            .await?;
        if duplicate.is_some() {
            return Err(LedgerError::ExistingKey(name));
        }

        let now = Utc::now();
        let model = wallets::ActiveModel {
            user_id: ActiveValue::Set(user_id),
            name: ActiveValue::Set(name.clone()),
            kind: ActiveValue::Set(wallet.kind.as_str().to_string()),
            balance: ActiveValue::Set(wallet.initial_balance.minor()),
            initial_balance: ActiveValue::Set(wallet.initial_balance.minor()),
            currency: ActiveValue::Set(crate::Currency::default().code().to_string()),
            description: ActiveValue::Set(wallet.description),
            is_active: ActiveValue::Set(true),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        };
        let created = model.insert(&self.db).await?;
        info!(user_id, wallet = %name, "wallet created");
        Ok(created)
    }

    /// Soft delete. The history keeps pointing at the wallet row.
    pub async fn archive_wallet(&self, user_id: i32, wallet_id: i32) -> ResultLedger<()> {
        let wallet = self.wallet_by_id(user_id, wallet_id).await?;
        let mut active: wallets::ActiveModel = wallet.into();
        active.is_active = ActiveValue::Set(false);
        active.updated_at = ActiveValue::Set(Utc::now());
        active.update(&self.db).await?;
        Ok(())
    }

    pub async fn total_balance(&self, user_id: i32) -> ResultLedger<Money> {
        let total: Option<Option<i64>> = wallets::Entity::find()
            .select_only()
            .column_as(wallets::Column::Balance.sum(), "total")
            .filter(wallets::Column::UserId.eq(user_id))
            .filter(wallets::Column::IsActive.eq(true))
            .into_tuple()
            .one(&self.db)
            .await?;
        Ok(Money::new(total.flatten().unwrap_or(0)))
    }

    pub async fn categories(
        &self,
        kind: crate::CategoryKind,
    ) -> ResultLedger<Vec<categories::Model>> {
        let rows = categories::Entity::find()
            .filter(categories::Column::Kind.eq(kind.as_str()))
            .filter(categories::Column::IsActive.eq(true))
            .order_by_asc(categories::Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    pub async fn match_category(
        &self,
        kind: crate::CategoryKind,
        name: &str,
    ) -> ResultLedger<Option<categories::Model>> {
        let needle = name.trim().to_lowercase();
        let rows = self.categories(kind).await?;
        Ok(rows
            .into_iter()
            .find(|c| c.name.to_lowercase() == needle || c.name.to_lowercase().contains(&needle)))
    }

    /// Book a transaction and move wallet balances in one database
    /// transaction. Amounts are always positive; the kind decides the
    /// direction.
    pub async fn create_transaction(
        &self,
        user_id: i32,
        new: NewTransaction,
    ) -> ResultLedger<transactions::Model> {
        if !new.amount.is_positive() {
            return Err(LedgerError::InvalidAmount(
                "amount must be positive".to_string(),
            ));
        }
        match new.kind {
            TransactionKind::Income if new.to_wallet_id.is_none() => {
                return Err(LedgerError::InvalidKind(
                    "income needs a destination wallet".to_string(),
                ));
            }
            TransactionKind::Expense if new.from_wallet_id.is_none() => {
                return Err(LedgerError::InvalidKind(
                    "expense needs a source wallet".to_string(),
                ));
            }
            TransactionKind::Transfer => {
                let (Some(from), Some(to)) = (new.from_wallet_id, new.to_wallet_id) else {
                    return Err(LedgerError::InvalidKind(
                        "transfer needs both wallets".to_string(),
                    ));
                };
                if from == to {
                    return Err(LedgerError::InvalidKind(
                        "transfer wallets must differ".to_string(),
                    ));
                }
            }
            _ => {}
        }

        let db_tx = self.db.begin().await?;
        let now = Utc::now();

        if let Some(from_id) = new.from_wallet_id {
            let wallet = self.wallet_by_id_on(&db_tx, user_id, from_id).await?;
            let balance = wallet
                .balance
                .checked_sub(new.amount.minor())
                .ok_or_else(|| LedgerError::InvalidAmount("balance overflow".to_string()))?;
            let mut active: wallets::ActiveModel = wallet.into();
            active.balance = ActiveValue::Set(balance);
            active.updated_at = ActiveValue::Set(now);
            active.update(&db_tx).await?;
        }
        if let Some(to_id) = new.to_wallet_id {
            let wallet = self.wallet_by_id_on(&db_tx, user_id, to_id).await?;
            let balance = wallet
                .balance
                .checked_add(new.amount.minor())
                .ok_or_else(|| LedgerError::InvalidAmount("balance overflow".to_string()))?;
            let mut active: wallets::ActiveModel = wallet.into();
            active.balance = ActiveValue::Set(balance);
            active.updated_at = ActiveValue::Set(now);
            active.update(&db_tx).await?;
        }

        let model = transactions::ActiveModel {
            user_id: ActiveValue::Set(user_id),
            kind: ActiveValue::Set(new.kind.as_str().to_string()),
            amount: ActiveValue::Set(new.amount.minor()),
            description: ActiveValue::Set(new.description),
            category_id: ActiveValue::Set(new.category_id),
            from_wallet_id: ActiveValue::Set(new.from_wallet_id),
            to_wallet_id: ActiveValue::Set(new.to_wallet_id),
            occurred_at: ActiveValue::Set(now),
            created_at: ActiveValue::Set(now),
            notes: ActiveValue::Set(new.notes),
            ..Default::default()
        };
        let created = model.insert(&db_tx).await?;
        db_tx.commit().await?;

        info!(
            user_id,
            kind = new.kind.as_str(),
            amount = new.amount.minor(),
            "transaction booked"
        );
        Ok(created)
    }

    pub async fn transactions(
        &self,
        user_id: i32,
        filter: &TransactionFilter,
    ) -> ResultLedger<Vec<transactions::Model>> {
        let mut query =
            transactions::Entity::find().filter(transactions::Column::UserId.eq(user_id));
        if let Some(kind) = filter.kind {
            query = query.filter(transactions::Column::Kind.eq(kind.as_str()));
        }
        if let Some(since) = filter.since {
            query = query.filter(transactions::Column::OccurredAt.gte(since));
        }
        if let Some(until) = filter.until {
            query = query.filter(transactions::Column::OccurredAt.lt(until));
        }
        let mut query = query
            .order_by_desc(transactions::Column::OccurredAt)
            .order_by_desc(transactions::Column::Id);
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = filter.offset {
            query = query.offset(offset);
        }
        Ok(query.all(&self.db).await?)
    }

    pub async fn recent_transactions(
        &self,
        user_id: i32,
        limit: u64,
    ) -> ResultLedger<Vec<transactions::Model>> {
        self.transactions(
            user_id,
            &TransactionFilter {
                limit: Some(limit),
                ..Default::default()
            },
        )
        .await
    }
}
