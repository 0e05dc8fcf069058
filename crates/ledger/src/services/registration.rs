//! First-contact flow: create the user row and a starter cash wallet.

use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseConnection, QueryFilter, TransactionTrait, prelude::*};
use tracing::info;

use crate::{
    Currency, Money, ResultLedger, WalletKind,
    services::TelegramProfile,
    users::{self, DEFAULT_LANGUAGE, DEFAULT_TIMEZONE},
    wallets,
};

/// Name of the wallet every new user starts with.
pub const STARTER_WALLET: &str = "Tunai";

#[derive(Clone)]
pub struct RegistrationService {
    db: DatabaseConnection,
}

impl RegistrationService {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn is_registered(&self, telegram_id: i64) -> ResultLedger<bool> {
        let user = users::Entity::find()
            .filter(users::Column::TelegramId.eq(telegram_id))
            .filter(users::Column::IsActive.eq(true))
            .one(&self.db)
            .await?;
        Ok(user.is_some())
    }

    /// Register the Telegram account, reactivating a previously deactivated
    /// one instead of inserting a duplicate. Returns the user and whether a
    /// new row was created.
    pub async fn register(
        &self,
        profile: &TelegramProfile,
    ) -> ResultLedger<(users::Model, bool)> {
        let now = Utc::now();

        if let Some(existing) = users::Entity::find()
            .filter(users::Column::TelegramId.eq(profile.telegram_id))
            .one(&self.db)
            .await?
        {
            let mut active: users::ActiveModel = existing.into();
            active.is_active = ActiveValue::Set(true);
            active.username = ActiveValue::Set(profile.username.clone());
            active.first_name = ActiveValue::Set(profile.first_name.clone());
            active.last_name = ActiveValue::Set(profile.last_name.clone());
            active.last_activity = ActiveValue::Set(now);
            active.updated_at = ActiveValue::Set(now);
            return Ok((active.update(&self.db).await?, false));
        }

        let db_tx = self.db.begin().await?;
        let user = users::ActiveModel {
            telegram_id: ActiveValue::Set(profile.telegram_id),
            username: ActiveValue::Set(profile.username.clone()),
            first_name: ActiveValue::Set(profile.first_name.clone()),
            last_name: ActiveValue::Set(profile.last_name.clone()),
            timezone: ActiveValue::Set(DEFAULT_TIMEZONE.to_string()),
            language: ActiveValue::Set(DEFAULT_LANGUAGE.to_string()),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            last_activity: ActiveValue::Set(now),
            is_active: ActiveValue::Set(true),
            ..Default::default()
        }
        .insert(&db_tx)
        .await?;

        wallets::ActiveModel {
            user_id: ActiveValue::Set(user.id),
            name: ActiveValue::Set(STARTER_WALLET.to_string()),
            kind: ActiveValue::Set(WalletKind::Cash.as_str().to_string()),
            balance: ActiveValue::Set(Money::ZERO.minor()),
            initial_balance: ActiveValue::Set(Money::ZERO.minor()),
            currency: ActiveValue::Set(Currency::default().code().to_string()),
            description: ActiveValue::Set(None),
            is_active: ActiveValue::Set(true),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        }
        .insert(&db_tx)
        .await?;

        db_tx.commit().await?;
        info!(telegram_id = profile.telegram_id, "user registered");
        Ok((user, true))
    }

    /// Whole days since the account was first created, `None` when the
    /// account does not exist.
    pub async fn days_registered(&self, telegram_id: i64) -> ResultLedger<Option<i64>> {
        let user = users::Entity::find()
            .filter(users::Column::TelegramId.eq(telegram_id))
            .one(&self.db)
            .await?;
        Ok(user.map(|u| (Utc::now() - u.created_at).num_days()))
    }

    /// Soft delete the account. History stays in place for a possible
    /// reactivation through [`Self::register`].
    pub async fn deactivate(&self, telegram_id: i64) -> ResultLedger<bool> {
        let Some(user) = users::Entity::find()
            .filter(users::Column::TelegramId.eq(telegram_id))
            .filter(users::Column::IsActive.eq(true))
            .one(&self.db)
            .await?
        else {
            return Ok(false);
        };
        let mut active: users::ActiveModel = user.into();
        active.is_active = ActiveValue::Set(false);
        active.updated_at = ActiveValue::Set(Utc::now());
        active.update(&self.db).await?;
        Ok(true)
    }
}
