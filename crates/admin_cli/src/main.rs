use std::{collections::BTreeMap, error::Error};

use clap::{Args, Parser, Subcommand};
use migration::MigratorTrait;
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement};

mod backup;

#[derive(Parser, Debug)]
#[command(name = "dompet-admin")]
#[command(about = "Admin utilities for Dompet (migrations, integrity checks, backups)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./dompet.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply or inspect schema migrations.
    Migrate(Migrate),
    /// Run SQLite's integrity check against the database.
    Check,
    /// Create, list, prune or restore zip backups of the database file.
    Backup(Backup),
}

#[derive(Args, Debug)]
struct Migrate {
    #[command(subcommand)]
    command: MigrateCommand,
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply all pending migrations.
    Up,
    /// Revert the most recent migration.
    Down,
    /// Drop everything and re-apply from scratch.
    Fresh,
    /// Show the status of each migration.
    Status,
}

#[derive(Args, Debug)]
struct Backup {
    /// Path of the SQLite database file.
    #[arg(long, default_value = "./dompet.db")]
    db_path: String,

    /// Directory the backup archives live in.
    #[arg(long, default_value = "./backups")]
    dir: String,

    #[command(subcommand)]
    command: BackupCommand,
}

#[derive(Subcommand, Debug)]
enum BackupCommand {
    /// Create a new timestamped backup.
    Create {
        /// Extra tag appended to the archive name.
        #[arg(long)]
        label: Option<String>,
    },
    /// List existing backups, newest first.
    List,
    /// Delete all but the newest N backups.
    Prune {
        #[arg(long, default_value_t = 5)]
        keep: usize,
    },
    /// Restore a backup over the database file.
    Restore {
        /// Archive name as shown by `backup list`.
        name: String,
    },
}

const REQUIRED_TABLES: [&str; 5] = ["users", "wallets", "categories", "transactions", "assets"];

async fn connect_db(database_url: &str) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    Ok(Database::connect(database_url).await?)
}

async fn integrity_check(db: &DatabaseConnection) -> Result<String, Box<dyn Error + Send + Sync>> {
    let row = db
        .query_one(Statement::from_string(
            DatabaseBackend::Sqlite,
            "PRAGMA integrity_check",
        ))
        .await?
        .ok_or("integrity check returned no rows")?;
    Ok(row.try_get_by_index::<String>(0)?)
}

/// Row counts of the application tables. Errors out if one is missing.
async fn table_counts(
    db: &DatabaseConnection,
) -> Result<BTreeMap<String, i64>, Box<dyn Error + Send + Sync>> {
    let mut counts = BTreeMap::new();
    for table in REQUIRED_TABLES {
        let row = db
            .query_one(Statement::from_string(
                DatabaseBackend::Sqlite,
                format!("SELECT COUNT(*) FROM {table}"),
            ))
            .await
            .map_err(|err| format!("missing table {table}: {err}"))?
            .ok_or_else(|| format!("missing table {table}"))?;
        counts.insert(table.to_string(), row.try_get_by_index::<i64>(0)?);
    }
    Ok(counts)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Migrate(Migrate { command }) => {
            let db = connect_db(&cli.database_url).await?;
            match command {
                MigrateCommand::Up => migration::Migrator::up(&db, None).await?,
                MigrateCommand::Down => migration::Migrator::down(&db, Some(1)).await?,
                MigrateCommand::Fresh => migration::Migrator::fresh(&db).await?,
                MigrateCommand::Status => migration::Migrator::status(&db).await?,
            }
        }
        Command::Check => {
            let db = connect_db(&cli.database_url).await?;
            let verdict = integrity_check(&db).await?;
            println!("integrity_check: {verdict}");
            for (table, count) in table_counts(&db).await? {
                println!("{table}: {count} row(s)");
            }
            if verdict != "ok" {
                std::process::exit(1);
            }
        }
        Command::Backup(Backup {
            db_path,
            dir,
            command,
        }) => {
            let manager = backup::BackupManager::new(&db_path, &dir);
            match command {
                BackupCommand::Create { label } => {
                    // Refuse to archive a database that does not pass the
                    // integrity check.
                    let db = connect_db(&format!("sqlite:{db_path}?mode=ro")).await?;
                    let verdict = integrity_check(&db).await?;
                    if verdict != "ok" {
                        eprintln!("integrity check failed: {verdict}");
                        std::process::exit(1);
                    }
                    let counts = table_counts(&db).await?;
                    drop(db);

                    let path = manager.create(label.as_deref(), counts)?;
                    println!("created backup: {}", path.display());
                }
                BackupCommand::List => {
                    let backups = manager.list()?;
                    if backups.is_empty() {
                        println!("no backups in {dir}");
                    }
                    for entry in backups {
                        println!("{}\t{} bytes", entry.name, entry.size);
                    }
                }
                BackupCommand::Prune { keep } => {
                    let removed = manager.prune(keep)?;
                    println!("removed {removed} backup(s), kept at most {keep}");
                }
                BackupCommand::Restore { name } => {
                    manager.restore(&name)?;
                    println!("restored {name} to {db_path}");
                }
            }
        }
    }

    Ok(())
}
