//! PostgreSQL Instance Backup Tool
//!
//! Dumps every non-template database, uploads the dumps to S3 under
//! `dbbackup/<timestamp>/` and removes the local copies. One run per invocation.

// pgbackup/src/main.rs
mod backup;
mod config;
mod errors;
mod utils;

use anyhow::{Context, Result};
use config::AppConfig;
use log::{error, info};
use std::process::ExitCode;

/// Main entry point for the backup tool
#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run_app().await {
        Ok(_) => {
            info!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("❌ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    // config.json in the working directory unless PGBACKUP_CONFIG points elsewhere.
    let config_path = config::config_path();
    let app_config = AppConfig::load_from_json(&config_path).with_context(|| {
        format!(
            "Failed to load application configuration from {}",
            config_path.display()
        )
    })?;
    info!("Loaded configuration from {}", config_path.display());

    let report = backup::run_backup_flow(&app_config)
        .await
        .context("Backup process failed")?;

    info!(
        "🎉 Backup run {} finished: {} databases, {} objects, {} bytes uploaded to s3://{}/{}",
        report.timestamp,
        report.databases.len(),
        report.uploads.len(),
        report.total_bytes(),
        app_config.storage.bucket_name,
        backup::remote_prefix(report.timestamp.as_str())
    );
    Ok(())
}
