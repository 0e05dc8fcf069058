//! Core domain layer: entities, money arithmetic and the services the bot
//! and admin CLI call into. Persistence goes through sea-orm on SQLite.

pub use currency::Currency;
pub use error::LedgerError;
pub use money::Money;

pub use assets::{AssetKind, STOCK_LOT_SIZE};
pub use categories::CategoryKind;
pub use transactions::TransactionKind;
pub use wallets::WalletKind;

pub mod assets;
pub mod categories;
mod currency;
mod error;
mod money;
pub mod transactions;
pub mod users;
pub mod wallets;

pub mod services;

pub type ResultLedger<T> = Result<T, LedgerError>;
