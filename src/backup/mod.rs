pub(crate) mod catalog;   // Enumerates non-template databases over sqlx
pub(crate) mod db_dump;   // Runs the database client once per target
pub(crate) mod logic;     // Phase sequencing and fail-fast policy
pub(crate) mod s3_upload; // Uploads the workspace tree to S3

#[cfg(test)]
pub(crate) mod testing;

use std::path::PathBuf;

use crate::config::AppConfig;
use crate::errors::Result;

use catalog::PgCatalog;
use db_dump::PgClientDumpRunner;
use logic::{BackupOrchestrator, RunReport};
use s3_upload::S3ObjectStore;

/// Top-level key namespace for every run.
pub const REMOTE_ROOT: &str = "dbbackup";

/// One database selected for backup in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub name: String,
}

impl DatabaseTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// `<name>_backup.sql`, unique per target because database names are unique.
    ///
    /// Path separators, NUL and `%` are percent-encoded so any name maps to one
    /// distinct file directly inside the workspace.
    pub fn artifact_file_name(&self) -> String {
        let mut encoded = String::with_capacity(self.name.len());
        for c in self.name.chars() {
            match c {
                '/' | '\\' | '\0' | '%' => encoded.push_str(&format!("%{:02X}", c as u32)),
                _ => encoded.push(c),
            }
        }
        format!("{}_backup.sql", encoded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpOutcome {
    Succeeded,
    Failed(String),
}

/// Local file holding one database's dump.
#[derive(Debug, Clone)]
pub struct DumpArtifact {
    pub database_name: String,
    pub file_path: PathBuf,
    pub size_bytes: u64,
    pub outcome: DumpOutcome,
    /// Whatever the client wrote to stderr, kept even on success.
    pub client_output: String,
}

/// One object written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub file_path: PathBuf,
    pub remote_key: String,
    pub size_bytes: u64,
}

/// `dbbackup/<timestamp>`
pub fn remote_prefix(run_timestamp: &str) -> String {
    format!("{}/{}", REMOTE_ROOT, run_timestamp)
}

/// `<prefix>/<file name>`; always `/`-separated regardless of platform.
pub fn remote_key(prefix: &str, file_name: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), file_name)
}

/// Public entry point for the backup process: wires the real collaborators and runs once.
pub async fn run_backup_flow(app_config: &AppConfig) -> Result<RunReport> {
    let catalog = PgCatalog::new(app_config.database.clone());
    let dumper = PgClientDumpRunner::new(&app_config.dump_client, app_config.database.clone())?;
    let store = S3ObjectStore::from_config(&app_config.storage).await;

    let orchestrator = BackupOrchestrator::new(
        &catalog,
        &dumper,
        &store,
        app_config.backup_dir.clone(),
        app_config.storage.bucket_name.clone(),
    );
    orchestrator.run().await
}
