// pgbackup/src/backup/catalog.rs
use async_trait::async_trait;
use log::{info, warn};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::{Connection, PgConnection, Row};

use super::DatabaseTarget;
use crate::config::DatabaseConfig;
use crate::errors::{BackupError, Result};

const MAINTENANCE_DATABASE: &str = "postgres";
const LIST_DATABASES_SQL: &str = "SELECT datname FROM pg_database WHERE datistemplate = false;";

/// Source of the databases a run should back up.
#[async_trait]
pub trait DatabaseCatalog: Send + Sync {
    /// Non-template databases, in the order the server reports them.
    async fn list_backup_targets(&self) -> Result<Vec<DatabaseTarget>>;
}

/// Reads `pg_database` through a short-lived connection to the maintenance database.
#[derive(Debug)]
pub struct PgCatalog {
    database: DatabaseConfig,
}

impl PgCatalog {
    pub fn new(database: DatabaseConfig) -> Self {
        Self { database }
    }

    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.database.host)
            .port(self.database.port)
            .username(&self.database.user)
            .password(&self.database.password)
            .database(MAINTENANCE_DATABASE)
            .ssl_mode(PgSslMode::Disable)
    }
}

#[async_trait]
impl DatabaseCatalog for PgCatalog {
    async fn list_backup_targets(&self) -> Result<Vec<DatabaseTarget>> {
        info!(
            "Connecting to {}:{} as {} to list databases...",
            self.database.host, self.database.port, self.database.user
        );
        let mut conn = PgConnection::connect_with(&self.connect_options())
            .await
            .map_err(|source| BackupError::Connection {
                host: self.database.host.clone(),
                port: self.database.port,
                source,
            })?;

        let names: std::result::Result<Vec<String>, sqlx::Error> =
            match sqlx::query(LIST_DATABASES_SQL).fetch_all(&mut conn).await {
                Ok(rows) => rows.iter().map(|row| row.try_get("datname")).collect(),
                Err(e) => Err(e),
            };

        // Close on both paths before reporting the query outcome.
        if let Err(e) = conn.close().await {
            warn!("Failed to close catalog connection cleanly: {}", e);
        }

        let names = names.map_err(BackupError::Query)?;
        info!("Found databases: {:?}", names);
        Ok(names.into_iter().map(DatabaseTarget::new).collect())
    }
}
