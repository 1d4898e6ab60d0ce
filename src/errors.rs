use std::path::PathBuf;

use thiserror::Error;

/// Every failure a backup run can hit. All of them are terminal for the run.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to connect to database server {host}:{port}: {source}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to list databases: {0}")]
    Query(#[source] sqlx::Error),

    #[error("Failed to prepare workspace {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Dump of database {database} failed: {diagnostic}")]
    Dump { database: String, diagnostic: String },

    #[error("Upload of {} to key {key} failed: {message}", .file.display())]
    Upload {
        file: PathBuf,
        key: String,
        message: String,
    },

    #[error("Failed to remove workspace {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, BackupError>;
