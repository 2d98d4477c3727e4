use crate::{
    DatabaseSettings, LoggingSettings, RawSettings, S3Settings, SecretSettings, StorageBackend,
    WorkerSettings,
};
use color_eyre::eyre::{Result, bail};
use std::path::{PathBuf, absolute};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub storage: StorageSettings,
    pub worker: WorkerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub secrets: SecretSettings,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Always absolute.
    pub local_root: PathBuf,
    pub s3: S3Settings,
}

impl TryFrom<RawSettings> for AppSettings {
    type Error = color_eyre::Report;

    fn try_from(raw: RawSettings) -> Result<Self> {
        if raw.worker.concurrency == 0 {
            bail!("worker.concurrency must be at least 1");
        }
        if raw.worker.job_timeout_seconds == 0 {
            bail!("worker.job_timeout_seconds must be at least 1");
        }
        if raw.storage.backend == StorageBackend::S3 && raw.storage.s3.bucket.is_empty() {
            bail!("storage.s3.bucket is required for the s3 backend");
        }

        let storage = StorageSettings {
            backend: raw.storage.backend,
            local_root: absolute(&raw.storage.local_root)?,
            s3: raw.storage.s3,
        };

        Ok(Self {
            storage,
            worker: raw.worker,
            logging: raw.logging,
            database: raw.database,
            secrets: raw.secrets,
        })
    }
}

impl WorkerSettings {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_seconds)
    }
}
