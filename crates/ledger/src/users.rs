//! Users table.
//!
//! A row per Telegram account. All other tables are scoped by `user_id`, so
//! every query in the services filters on it (per-user data isolation).

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

pub const DEFAULT_TIMEZONE: &str = "Asia/Jakarta";
pub const DEFAULT_LANGUAGE: &str = "id";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub timezone: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::wallets::Entity")]
    Wallets,
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
    #[sea_orm(has_many = "super::assets::Entity")]
    Assets,
}

impl Related<super::wallets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallets.def()
    }
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::assets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Display name for messages: first name, else username, else a fallback.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("User")
    }
}
