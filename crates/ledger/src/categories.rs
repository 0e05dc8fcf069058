//! Transaction categories.
//!
//! Categories are global (not per user) and the init migration seeds a set of
//! system rows that cannot be deleted. `parent_id` allows subcategories but
//! the bot currently only uses the flat list.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use crate::LedgerError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CategoryKind {
    Income,
    Expense,
}

impl CategoryKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CategoryKind::Income => "income",
            CategoryKind::Expense => "expense",
        }
    }
}

impl TryFrom<&str> for CategoryKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(CategoryKind::Income),
            "expense" => Ok(CategoryKind::Expense),
            other => Err(LedgerError::InvalidKind(format!(
                "unknown category kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub kind: String,
    pub icon: Option<String>,
    pub parent_id: Option<i32>,
    pub is_system: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
