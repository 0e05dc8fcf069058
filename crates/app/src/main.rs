use chrono::NaiveTime;
use migration::{Migrator, MigratorTrait};
use sea_orm::ConnectionTrait;
use settings::Database;
use teloxide::types::UserId;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "dompet={level},telegram_bot={level},ledger={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;

    let timezone: chrono_tz::Tz = settings
        .reports
        .timezone
        .parse()
        .map_err(|err| format!("invalid timezone: {err}"))?;
    let report_time = NaiveTime::parse_from_str(&settings.reports.daily_time, "%H:%M")
        .map_err(|err| format!("invalid daily report time: {err}"))?;

    let telegram = settings.telegram;
    let telegram_reports_enabled = settings.reports.auto_enabled;
    tasks.spawn(async move {
        let allowed_users = telegram.allowed_users.into_iter().map(UserId).collect();
        match telegram_bot::Bot::builder()
            .token(&telegram.token)
            .allowed_users(allowed_users)
            .database(db)
            .timezone(timezone)
            .report_time(report_time)
            .reports_enabled(telegram_reports_enabled)
            .build()
        {
            Ok(bot) => {
                if let Err(err) = bot.run().await {
                    tracing::error!("telegram bot failed: {err}");
                }
            }
            Err(err) => tracing::error!("failed to initialize telegram bot: {err}"),
        }
    });

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    database
        .execute_unprepared(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA cache_size=10000;
             PRAGMA temp_store=MEMORY;",
        )
        .await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
