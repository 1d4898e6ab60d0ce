// pgbackup/src/backup/logic.rs
use log::{debug, error, info};
use std::fs;
use std::path::{Path, PathBuf};

use super::catalog::DatabaseCatalog;
use super::db_dump::DumpRunner;
use super::s3_upload::{ObjectStore, upload_tree};
use super::{DatabaseTarget, DumpArtifact, DumpOutcome, UploadResult, remote_prefix};
use crate::errors::{BackupError, Result};
use crate::utils::RunTimestamp;

/// Identity and scratch space of one run.
#[derive(Debug)]
pub struct RunContext {
    pub timestamp: RunTimestamp,
    pub workspace_dir: PathBuf,
}

impl RunContext {
    /// Creates `<backup_dir>/<timestamp>`. An existing directory is an error: workspaces are never reused.
    pub fn create(backup_dir: &Path, timestamp: RunTimestamp) -> Result<Self> {
        let workspace_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| BackupError::Workspace { path, source }
        };

        fs::create_dir_all(backup_dir).map_err(workspace_error(backup_dir))?;
        let workspace_dir = backup_dir.join(timestamp.as_str());
        fs::create_dir(&workspace_dir).map_err(workspace_error(&workspace_dir))?;

        info!("📂 Backup directory created at: {}", workspace_dir.display());
        Ok(Self {
            timestamp,
            workspace_dir,
        })
    }

    pub fn remote_prefix(&self) -> String {
        remote_prefix(self.timestamp.as_str())
    }

    /// Removes the workspace and everything in it.
    fn cleanup(self) -> Result<()> {
        fs::remove_dir_all(&self.workspace_dir).map_err(|source| BackupError::Cleanup {
            path: self.workspace_dir.clone(),
            source,
        })?;
        info!("Removed local workspace {}", self.workspace_dir.display());
        Ok(())
    }
}

/// What a successful run did.
#[derive(Debug)]
pub struct RunReport {
    pub timestamp: RunTimestamp,
    pub databases: Vec<String>,
    pub uploads: Vec<UploadResult>,
}

impl RunReport {
    pub fn total_bytes(&self) -> u64 {
        self.uploads.iter().map(|u| u.size_bytes).sum()
    }
}

/// Sequences one run: workspace, discovery, dumps, upload, cleanup.
///
/// Every phase completes before the next starts, and the first error ends the run.
/// On a dump or upload failure the workspace is left on disk for inspection.
pub struct BackupOrchestrator<'a> {
    catalog: &'a dyn DatabaseCatalog,
    dumper: &'a dyn DumpRunner,
    store: &'a dyn ObjectStore,
    backup_dir: PathBuf,
    bucket: String,
}

impl<'a> BackupOrchestrator<'a> {
    pub fn new(
        catalog: &'a dyn DatabaseCatalog,
        dumper: &'a dyn DumpRunner,
        store: &'a dyn ObjectStore,
        backup_dir: PathBuf,
        bucket: String,
    ) -> Self {
        Self {
            catalog,
            dumper,
            store,
            backup_dir,
            bucket,
        }
    }

    pub async fn run(&self) -> Result<RunReport> {
        self.run_at(RunTimestamp::now()).await
    }

    pub async fn run_at(&self, timestamp: RunTimestamp) -> Result<RunReport> {
        info!("🚀 Starting database backup run {}", timestamp);
        let run = RunContext::create(&self.backup_dir, timestamp)?;

        let targets = self.catalog.list_backup_targets().await?;
        info!(
            "Databases to be backed up: {:?}",
            targets.iter().map(|t| t.name.as_str()).collect::<Vec<_>>()
        );

        let artifacts = dump_all(self.dumper, &targets, &run.workspace_dir)?;

        let uploads = upload_tree(
            self.store,
            &run.workspace_dir,
            &run.remote_prefix(),
            &self.bucket,
        )
        .await?;
        info!("Backup and upload completed: {} objects", uploads.len());

        let timestamp = run.timestamp.clone();
        run.cleanup()?;

        Ok(RunReport {
            timestamp,
            databases: artifacts.into_iter().map(|a| a.database_name).collect(),
            uploads,
        })
    }
}

/// Dumps targets in order, stopping at the first one that does not succeed.
fn dump_all(
    dumper: &dyn DumpRunner,
    targets: &[DatabaseTarget],
    workspace_dir: &Path,
) -> Result<Vec<DumpArtifact>> {
    targets
        .iter()
        .try_fold(Vec::with_capacity(targets.len()), |mut done, target| {
            let artifact = dumper.dump(target, workspace_dir).inspect_err(|e| {
                error!("Error backing up database {}: {}", target.name, e);
            })?;
            if let DumpOutcome::Failed(diagnostic) = &artifact.outcome {
                error!("Error backing up database {}: {}", target.name, diagnostic);
                return Err(BackupError::Dump {
                    database: target.name.clone(),
                    diagnostic: diagnostic.clone(),
                });
            }
            debug!(
                "Dump of {} written to {} ({} bytes)",
                artifact.database_name,
                artifact.file_path.display(),
                artifact.size_bytes
            );
            if !artifact.client_output.is_empty() {
                debug!("Client output for {}: {}", artifact.database_name, artifact.client_output);
            }
            done.push(artifact);
            Ok(done)
        })
}
