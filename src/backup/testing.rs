//! In-memory collaborators for exercising the pipeline without a server or a bucket.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use super::catalog::DatabaseCatalog;
use super::db_dump::{DumpRunner, artifact_path};
use super::s3_upload::ObjectStore;
use super::{DatabaseTarget, DumpArtifact, DumpOutcome};
use crate::errors::{BackupError, Result};

pub struct FakeCatalog {
    names: Vec<String>,
    fail: bool,
}

impl FakeCatalog {
    pub fn with_databases(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            names: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl DatabaseCatalog for FakeCatalog {
    async fn list_backup_targets(&self) -> Result<Vec<DatabaseTarget>> {
        if self.fail {
            return Err(BackupError::Query(sqlx::Error::Protocol(
                "catalog unavailable".to_string(),
            )));
        }
        Ok(self.names.iter().cloned().map(DatabaseTarget::new).collect())
    }
}

/// Writes `size` bytes per database. The configured database fails the way the real
/// client does: some output lands in the artifact, then the partial file is discarded.
#[derive(Default)]
pub struct FakeDumper {
    sizes: HashMap<String, usize>,
    fail_on: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeDumper {
    pub fn with_sizes(sizes: &[(&str, usize)]) -> Self {
        Self {
            sizes: sizes.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, database: &str) -> Self {
        self.fail_on = Some(database.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl DumpRunner for FakeDumper {
    fn dump(&self, target: &DatabaseTarget, workspace_dir: &Path) -> Result<DumpArtifact> {
        self.calls.lock().unwrap().push(target.name.clone());
        let file_path = artifact_path(workspace_dir, target);

        let io_error = |e: std::io::Error| BackupError::Dump {
            database: target.name.clone(),
            diagnostic: e.to_string(),
        };

        if self.fail_on.as_deref() == Some(target.name.as_str()) {
            fs::write(&file_path, b"partial").map_err(io_error)?;
            fs::remove_file(&file_path).map_err(io_error)?;
            return Ok(DumpArtifact {
                database_name: target.name.clone(),
                file_path,
                size_bytes: 0,
                outcome: DumpOutcome::Failed("psql exited with exit status: 2".to_string()),
                client_output: "FATAL: connection refused".to_string(),
            });
        }

        let size = self.sizes.get(&target.name).copied().unwrap_or(16);
        fs::write(&file_path, vec![b'x'; size]).map_err(io_error)?;
        Ok(DumpArtifact {
            database_name: target.name.clone(),
            file_path,
            size_bytes: size as u64,
            outcome: DumpOutcome::Succeeded,
            client_output: String::new(),
        })
    }
}

/// Records objects in insertion order; the `fail_at`-th put (1-indexed) errors.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<Vec<(String, String, Vec<u8>)>>,
    puts: Mutex<usize>,
    fail_at: Option<usize>,
}

impl MemoryStore {
    pub fn failing_at(put_number: usize) -> Self {
        Self {
            fail_at: Some(put_number),
            ..Self::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|(_, key, _)| key.clone())
            .collect()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|(b, k, _)| b == bucket && k == key)
            .map(|(_, _, body)| body.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(&self, bucket: &str, key: &str, body: ByteStream) -> anyhow::Result<()> {
        let put_number = {
            let mut puts = self.puts.lock().unwrap();
            *puts += 1;
            *puts
        };
        if self.fail_at == Some(put_number) {
            anyhow::bail!("simulated PutObject failure for {}", key);
        }
        let bytes = body.collect().await?.into_bytes().to_vec();
        self.objects
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string(), bytes));
        Ok(())
    }
}
