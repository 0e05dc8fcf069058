//! Telegram bot.
//!
//! The bot talks to the ledger services directly and keeps per-chat wizard
//! state in memory. A background task delivers scheduled reports and keeps
//! asset prices fresh.

use chrono::NaiveTime;
use chrono_tz::Tz;
use sea_orm::DatabaseConnection;
use teloxide::prelude::*;

use ledger::services::{AssetService, RegistrationService, ReportService, UserService};

mod handlers;
mod parsing;
mod prices;
mod scheduler;
mod state;
mod ui;

#[derive(Clone)]
pub struct ConfigParameters {
    allowed_users: Option<Vec<UserId>>,
    users: UserService,
    registration: RegistrationService,
    assets: AssetService,
    reports: ReportService,
    prices: prices::PriceClient,
    sessions: state::SessionStore,
    timezone: Tz,
    report_time: NaiveTime,
    reports_enabled: bool,
}

pub struct Bot {
    token: String,
    allowed_users: Option<Vec<UserId>>,
    db: DatabaseConnection,
    timezone: Tz,
    report_time: NaiveTime,
    reports_enabled: bool,
}

impl Bot {
    pub fn builder() -> BotBuilder {
        BotBuilder::default()
    }

    pub async fn run(&self) -> Result<(), String> {
        tracing::info!("Starting telegram bot...");

        let bot = teloxide::Bot::new(&self.token);

        let prices = prices::PriceClient::new()
            .map_err(|err| format!("failed to build price client: {err}"))?;

        let parameters = ConfigParameters {
            allowed_users: self.allowed_users.clone(),
            users: UserService::new(self.db.clone()),
            registration: RegistrationService::new(self.db.clone()),
            assets: AssetService::new(self.db.clone()),
            reports: ReportService::new(self.db.clone()),
            prices,
            sessions: state::SessionStore::default(),
            timezone: self.timezone,
            report_time: self.report_time,
            reports_enabled: self.reports_enabled,
        };

        tokio::spawn(scheduler::run(bot.clone(), parameters.clone()));

        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(handlers::handle_message))
            .branch(Update::filter_callback_query().endpoint(handlers::handle_callback));

        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![parameters])
            .default_handler(|upd| async move {
                tracing::warn!("Unhandled update: {:?}", upd);
            })
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error has occurred in the dispatcher",
            ))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}

#[derive(Default, Debug)]
pub struct BotBuilder {
    token: String,
    allowed_users: Option<Vec<UserId>>,
    db: Option<DatabaseConnection>,
    timezone: Option<Tz>,
    report_time: Option<NaiveTime>,
    reports_enabled: Option<bool>,
}

impl BotBuilder {
    pub fn token(mut self, token: &str) -> BotBuilder {
        self.token = token.to_string();
        self
    }

    pub fn allowed_users(mut self, allowed_users: Vec<UserId>) -> BotBuilder {
        if !allowed_users.is_empty() {
            self.allowed_users = Some(allowed_users);
        }
        self
    }

    pub fn database(mut self, db: DatabaseConnection) -> BotBuilder {
        self.db = Some(db);
        self
    }

    pub fn timezone(mut self, timezone: Tz) -> BotBuilder {
        self.timezone = Some(timezone);
        self
    }

    pub fn report_time(mut self, report_time: NaiveTime) -> BotBuilder {
        self.report_time = Some(report_time);
        self
    }

    pub fn reports_enabled(mut self, enabled: bool) -> BotBuilder {
        self.reports_enabled = Some(enabled);
        self
    }

    pub fn build(self) -> Result<Bot, String> {
        tracing::info!("Initializing telegram bot...");
        if self.token.is_empty() {
            return Err("telegram token is empty".to_string());
        }
        let db = self.db.ok_or("database connection is required")?;
        let timezone = self.timezone.unwrap_or(chrono_tz::Asia::Jakarta);
        let report_time =
            self.report_time
                .or_else(|| NaiveTime::from_hms_opt(21, 0, 0))
                .ok_or("invalid report time")?;

        Ok(Bot {
            token: self.token,
            allowed_users: self.allowed_users,
            db,
            timezone,
            report_time,
            reports_enabled: self.reports_enabled.unwrap_or(true),
        })
    }
}
