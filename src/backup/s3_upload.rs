// pgbackup/src/backup/s3_upload.rs
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use log::info;
use s3::config::Region;
use s3::primitives::ByteStream;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

use super::{UploadResult, remote_key};
use crate::config::StorageConfig;
use crate::errors::{BackupError, Result};

/// Minimal object storage surface: one `PutObject` per call.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, bucket: &str, key: &str, body: ByteStream) -> anyhow::Result<()>;
}

/// S3 (or any S3-compatible service) with static credentials.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: s3::Client,
}

impl S3ObjectStore {
    pub async fn from_config(storage: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .region(Region::new(storage.region.clone()))
            .credentials_provider(s3::config::Credentials::new(
                &storage.access_key_id,
                &storage.secret_access_key,
                None,     // session_token
                None,     // expiry
                "Static", // provider_name
            ));
        if let Some(endpoint) = &storage.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        // Custom endpoints (MinIO, Spaces) generally need path-style addressing.
        let s3_config = s3::config::Builder::from(&sdk_config)
            .force_path_style(storage.endpoint_url.is_some())
            .build();

        Self {
            client: s3::Client::from_conf(s3_config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, body: ByteStream) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{}", s3::error::DisplayErrorContext(&e)))?;
        Ok(())
    }
}

/// Uploads every file under `local_dir`, in file-name order, as `<remote_prefix>/<file name>`.
///
/// Stops at the first failure; objects already written stay in the bucket.
pub async fn upload_tree(
    store: &dyn ObjectStore,
    local_dir: &Path,
    remote_prefix: &str,
    bucket: &str,
) -> Result<Vec<UploadResult>> {
    info!(
        "Uploading {} to bucket {} under {}",
        local_dir.display(),
        bucket,
        remote_prefix
    );
    let mut uploaded = Vec::new();

    for entry in WalkDir::new(local_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| BackupError::Workspace {
            path: e.path().unwrap_or(local_dir).to_path_buf(),
            source: io::Error::from(e),
        })?;
        if entry.file_type().is_dir() {
            continue;
        }

        let file_path = entry.path();
        let key = remote_key(remote_prefix, &entry.file_name().to_string_lossy());
        let upload_error = |message: String| BackupError::Upload {
            file: file_path.to_path_buf(),
            key: key.clone(),
            message,
        };

        let file = tokio::fs::File::open(file_path)
            .await
            .map_err(|e| upload_error(format!("failed to open file: {}", e)))?;
        let size_bytes = file
            .metadata()
            .await
            .map_err(|e| upload_error(format!("failed to stat file: {}", e)))?
            .len();
        let body = ByteStream::read_from()
            .file(file)
            .build()
            .await
            .map_err(|e| upload_error(format!("failed to stream file: {}", e)))?;

        store
            .put_object(bucket, &key, body)
            .await
            .map_err(|e| upload_error(format!("{:#}", e)))?;

        info!("Uploaded {} to s3://{}/{}", file_path.display(), bucket, key);
        uploaded.push(UploadResult {
            file_path: file_path.to_path_buf(),
            remote_key: key,
            size_bytes,
        });
    }

    Ok(uploaded)
}
