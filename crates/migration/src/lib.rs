pub use sea_orm_migration::prelude::*;

mod m20250110_000000_init;
mod m20250218_000000_assets;
mod m20250405_000000_asset_returns_derived;
mod m20250520_000000_user_activity;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250110_000000_init::Migration),
            Box::new(m20250218_000000_assets::Migration),
            Box::new(m20250405_000000_asset_returns_derived::Migration),
            Box::new(m20250520_000000_user_activity::Migration),
        ]
    }
}
