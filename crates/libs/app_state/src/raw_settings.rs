use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct RawSettings {
    pub storage: RawStorageSettings,
    pub worker: WorkerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub secrets: SecretSettings,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
}

/// Where artifacts (coordinate arrays, structures, model files) live.
#[derive(Debug, Deserialize, Clone)]
pub struct RawStorageSettings {
    pub backend: StorageBackend,
    /// Root folder for the local backend. Relative paths resolve against the working directory.
    pub local_root: PathBuf,
    pub s3: S3Settings,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores such as MinIO.
    pub endpoint: Option<String>,
    #[serde(default)]
    pub allow_http: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerSettings {
    /// How long an idle worker sleeps before polling the queue again.
    pub poll_interval_ms: u64,
    /// Hard limit for a single task. The job record is not touched when it hits.
    pub job_timeout_seconds: u64,
    /// Number of tasks one worker process runs at the same time.
    pub concurrency: usize,
}

/// Logging configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Database connection pool configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: u64,
    pub idle_timeout: u64,
    pub acquire_timeout: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecretSettings {
    pub database_url: String,
}
