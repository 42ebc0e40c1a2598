use std::str::FromStr;
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Sqlite, SqlitePool,
};
use tracing::info;

use crate::config::Settings;

pub mod assignments;
pub mod attendance;
pub mod catalog;
pub mod dashboard;
pub mod evaluations;
pub mod grades;
pub mod notifications;
pub mod people;
pub mod predictions;

// Лимиты выборок по умолчанию
pub const DEFAULT_QUERY_LIMIT: i64 = 100;
pub const DEFAULT_QUERY_OFFSET: i64 = 0;

/// Создаёт базу при отсутствии, открывает пул и применяет миграции.
pub async fn init_db(settings: &Settings) -> Result<SqlitePool, anyhow::Error> {
    let db_url = settings.database_url();
    if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        info!("Creating database {}", db_url);
        Sqlite::create_database(db_url).await?;
    }

    let options = SqliteConnectOptions::from_str(db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.db_max_connections)
        .connect_with(options)
        .await?;

    // Применяем миграции
    sqlx::migrate!("../migrations").run(&pool).await?;
    info!("Database ready, migrations applied");

    Ok(pool)
}

/// Пул в памяти с применёнными миграциями (тесты и сидер в dry-run).
pub async fn memory_pool() -> Result<SqlitePool, anyhow::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    // Одно соединение без таймаутов: иначе база в памяти исчезнет вместе с ним
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    sqlx::migrate!("../migrations").run(&pool).await?;
    Ok(pool)
}

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}
