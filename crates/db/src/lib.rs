//! Database layer for civiccare: entities, migrations and repositories over a `PostgreSQL` pool.

pub mod entities;
pub mod migrations;
pub mod repositories;
pub mod test_utils;

use civiccare_common::{AppError, DatabaseConfig, SqlLogLevel};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::{info, log::LevelFilter};

const fn level_filter(level: SqlLogLevel) -> LevelFilter {
    match level {
        SqlLogLevel::Off => LevelFilter::Off,
        SqlLogLevel::Error => LevelFilter::Error,
        SqlLogLevel::Warn => LevelFilter::Warn,
        SqlLogLevel::Info => LevelFilter::Info,
        SqlLogLevel::Debug => LevelFilter::Debug,
        SqlLogLevel::Trace => LevelFilter::Trace,
    }
}

/// Pool options for the configured database.
#[must_use]
pub fn connect_options(config: &DatabaseConfig) -> ConnectOptions {
    let mut opt = ConnectOptions::new(&config.url);

    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .sqlx_logging(config.sql_log != SqlLogLevel::Off)
        .sqlx_logging_level(level_filter(config.sql_log));

    if let Some(ms) = config.slow_statement_ms {
        opt.sqlx_slow_statements_logging_settings(LevelFilter::Warn, Duration::from_millis(ms));
    }

    opt
}

/// Open the connection pool.
pub async fn init(config: &DatabaseConfig) -> Result<DatabaseConnection, AppError> {
    info!(
        max_connections = config.max_connections,
        sql_log = ?config.sql_log,
        "Opening database pool"
    );

    Database::connect(connect_options(config))
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Run pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    use sea_orm_migration::MigratorTrait;
    migrations::Migrator::up(db, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
