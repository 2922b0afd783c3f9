//! Database primitives shared by the server and the record operations.

pub mod employees;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

pub use employees::{
    EmployeeDraft, count_employees, delete_employee, find_employee, insert_employee,
    list_employees, update_employee,
};

/// Shared connection handle. sea-orm pools connections internally.
pub type DbPool = DatabaseConnection;

/// Path of the database file used when nothing else is configured.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://employees.db?mode=rwc";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: sea_orm::DbErr,
    },
    #[error(transparent)]
    Query(#[from] sea_orm::DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub sqlx_logging: bool,
}

fn default_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: default_url(),
            sqlx_logging: false,
        }
    }
}

impl DatabaseSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Reads `DATABASE_URL`, falling back to the local `employees.db` file.
    pub fn from_env() -> Self {
        let url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(default_url);
        let sqlx_logging = std::env::var("SQLX_LOGGING")
            .ok()
            .map(|val| matches!(val.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Self { url, sqlx_logging }
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let mut options = ConnectOptions::new(settings.url.clone());
    options.sqlx_logging(settings.sqlx_logging);
    if settings.is_in_memory() {
        // Each pooled connection would otherwise open its own empty database.
        options.max_connections(1).min_connections(1);
    }
    let pool = Database::connect(options)
        .await
        .map_err(|source| DbError::Connect {
            url: settings.url.clone(),
            source,
        })?;
    info!(url = %settings.url, "database connected");
    Ok(pool)
}

/// Round-trips a trivial statement to confirm the database answers.
pub async fn ping(pool: &DbPool) -> DbResult<()> {
    let backend = pool.get_database_backend();
    pool.execute(Statement::from_string(backend, "SELECT 1".to_string()))
        .await?;
    Ok(())
}
