// pgbackup/src/backup/db_dump.rs
use log::{info, warn};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{DatabaseTarget, DumpArtifact, DumpOutcome};
use crate::config::DatabaseConfig;
use crate::errors::{BackupError, Result};
use crate::utils::find_client_executable;

/// Produces one local artifact per target.
///
/// `Ok` with a [`DumpOutcome::Failed`] means the client ran and reported failure;
/// `Err` means it could not be run at all.
pub trait DumpRunner: Send + Sync {
    fn dump(&self, target: &DatabaseTarget, workspace_dir: &Path) -> Result<DumpArtifact>;
}

/// Runs `<client> -U <user> -h <host> <database>` with stdout redirected into the artifact.
///
/// The password and port reach the child through `PGPASSWORD`/`PGPORT` set on that
/// child only; the process environment is never touched.
#[derive(Debug)]
pub struct PgClientDumpRunner {
    client: PathBuf,
    database: DatabaseConfig,
}

impl PgClientDumpRunner {
    pub fn new(client: &str, database: DatabaseConfig) -> Result<Self> {
        let client = find_client_executable(client)?;
        info!("Found database client executable at: {}", client.display());
        Ok(Self { client, database })
    }

    #[cfg(test)]
    pub(crate) fn with_client_path(client: PathBuf, database: DatabaseConfig) -> Self {
        Self { client, database }
    }

    /// The full child invocation. `PGPASSWORD` is always explicit: set, or removed when empty.
    fn command(&self, target: &DatabaseTarget, stdout: Stdio) -> Command {
        let mut command = Command::new(&self.client);
        command
            .args([
                "-U",
                self.database.user.as_str(),
                "-h",
                self.database.host.as_str(),
                target.name.as_str(),
            ])
            .env("PGPORT", self.database.port.to_string())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped());
        if self.database.password.is_empty() {
            command.env_remove("PGPASSWORD");
        } else {
            command.env("PGPASSWORD", &self.database.password);
        }
        command
    }
}

impl DumpRunner for PgClientDumpRunner {
    fn dump(&self, target: &DatabaseTarget, workspace_dir: &Path) -> Result<DumpArtifact> {
        let file_path = artifact_path(workspace_dir, target);
        info!("Backing up {} to {}", target.name, file_path.display());

        let output_file = File::create(&file_path).map_err(|e| BackupError::Dump {
            database: target.name.clone(),
            diagnostic: format!("failed to create {}: {}", file_path.display(), e),
        })?;

        let output = match self.command(target, Stdio::from(output_file)).output() {
            Ok(output) => output,
            Err(e) => {
                discard_partial(&file_path);
                return Err(BackupError::Dump {
                    database: target.name.clone(),
                    diagnostic: format!("failed to execute {}: {}", self.client.display(), e),
                });
            }
        };

        let client_output = String::from_utf8_lossy(&output.stderr).trim().to_string();

        let (outcome, size_bytes) = if output.status.success() {
            let size_bytes = fs::metadata(&file_path).map(|m| m.len()).unwrap_or(0);
            if size_bytes == 0 {
                warn!(
                    "Dump of {} exited successfully but {} is empty",
                    target.name,
                    file_path.display()
                );
            }
            info!("Backup of database {} completed successfully ({} bytes)", target.name, size_bytes);
            (DumpOutcome::Succeeded, size_bytes)
        } else {
            // A failed dump leaves nothing behind in the workspace.
            discard_partial(&file_path);
            let diagnostic = format!(
                "{} exited with {}\nOutput: {}",
                self.client.display(),
                output.status,
                client_output
            );
            (DumpOutcome::Failed(diagnostic), 0)
        };

        Ok(DumpArtifact {
            database_name: target.name.clone(),
            file_path,
            size_bytes,
            outcome,
            client_output,
        })
    }
}

fn discard_partial(file_path: &Path) {
    if let Err(e) = fs::remove_file(file_path) {
        warn!("Failed to remove partial dump {}: {}", file_path.display(), e);
    }
}

/// `<workspace>/<encoded name>_backup.sql`
pub fn artifact_path(workspace_dir: &Path, target: &DatabaseTarget) -> PathBuf {
    workspace_dir.join(target.artifact_file_name())
}
