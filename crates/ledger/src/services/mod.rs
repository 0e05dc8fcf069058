//! Database-backed services. Each service owns a [`sea_orm::DatabaseConnection`]
//! clone and exposes the operations one feature area needs.

pub use assets::{AssetService, AssetUpdate, NewAsset, PortfolioSummary};
pub use registration::RegistrationService;
pub use reports::{
    CategorySpend, DailyReport, MonthlyReport, RecentTransaction, ReportService, TrendPoint,
    WalletBreakdown, WeeklyReport,
};
pub use users::{NewTransaction, NewWallet, TelegramProfile, TransactionFilter, UserService};

mod assets;
mod registration;
mod reports;
mod users;
