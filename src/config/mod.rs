// pgbackup/src/config/mod.rs
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{BackupError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const CONFIG_PATH_ENV: &str = "PGBACKUP_CONFIG";
pub const DEFAULT_DUMP_CLIENT: &str = "pg_dump";

// Structs for deserializing config.json
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JsonPort {
    Text(String),
    Number(u64),
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawJsonConfig {
    pub s3_bucket_name: Option<String>,
    pub backup_dir: Option<PathBuf>,
    pub pg_user: Option<String>,
    pub pg_password: Option<String>,
    pub pg_host: Option<String>,
    pub pg_port: Option<JsonPort>,
    pub aws_region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub endpoint_url: Option<String>,
    pub dump_client: Option<String>,
}

// Application's internal configuration structs
#[derive(Clone)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct StorageConfig {
    pub bucket_name: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub backup_dir: PathBuf,
    pub dump_client: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("bucket_name", &self.bucket_name)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

/// Location of the config file: `$PGBACKUP_CONFIG` if set, else `./config.json`.
pub fn config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

impl AppConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            BackupError::Config(format!(
                "failed to read config file at {}: {}",
                config_path.display(),
                e
            ))
        })?;
        Self::from_json_str(&config_content).map_err(|e| match e {
            BackupError::Config(msg) => {
                BackupError::Config(format!("{} ({})", msg, config_path.display()))
            }
            other => other,
        })
    }

    pub fn from_json_str(config_content: &str) -> Result<Self> {
        let raw: RawJsonConfig = serde_json::from_str(config_content)
            .map_err(|e| BackupError::Config(format!("failed to parse config JSON: {}", e)))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawJsonConfig) -> Result<Self> {
        let database = DatabaseConfig {
            user: required("pgUser", raw.pg_user)?,
            // An empty password is legitimate for trust/peer authentication.
            password: raw.pg_password.unwrap_or_default(),
            host: required("pgHost", raw.pg_host)?,
            port: parse_port(raw.pg_port)?,
        };

        let storage = StorageConfig {
            bucket_name: required("s3BucketName", raw.s3_bucket_name)?,
            region: required("awsRegion", raw.aws_region)?,
            access_key_id: required("accessKey", raw.access_key)?,
            secret_access_key: required("secretKey", raw.secret_key)?,
            endpoint_url: raw.endpoint_url.filter(|s| !s.trim().is_empty()),
        };

        let backup_dir = raw
            .backup_dir
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| BackupError::Config("backupDir must be set in config.json".into()))?;

        let dump_client = raw
            .dump_client
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DUMP_CLIENT.to_string());

        Ok(AppConfig {
            database,
            storage,
            backup_dir,
            dump_client,
        })
    }
}

fn required(key: &str, value: Option<String>) -> Result<String> {
    value
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| BackupError::Config(format!("{} must be set in config.json", key)))
}

fn parse_port(value: Option<JsonPort>) -> Result<u16> {
    let invalid = |shown: String| {
        BackupError::Config(format!("pgPort must be a port number, got {:?}", shown))
    };
    match value {
        Some(JsonPort::Text(s)) => s.trim().parse::<u16>().map_err(|_| invalid(s)),
        Some(JsonPort::Number(n)) => u16::try_from(n).map_err(|_| invalid(n.to_string())),
        None => Err(BackupError::Config(
            "pgPort must be set in config.json".into(),
        )),
    }
}
