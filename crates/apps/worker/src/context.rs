use app_state::{AppSettings, WorkerSettings};
use backmapping::ModelSerializer;
use color_eyre::Result;
use common_services::database::{
    CatalogRepository, JobRepository, PgCatalogRepository, PgJobRepository, get_db_pool,
};
use common_services::storage::{ArtifactStore, create_artifact_store};
use common_services::utils::nice_id;
use std::sync::Arc;
use structure_io::CodecRegistry;

/// Everything a task needs, shared by all claim loops of one worker process.
#[derive(Clone)]
pub struct WorkerContext {
    pub worker_id: String,
    pub settings: WorkerSettings,
    pub jobs: Arc<dyn JobRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub storage: Arc<dyn ArtifactStore>,
    pub codecs: Arc<CodecRegistry>,
    pub serializer: Arc<ModelSerializer>,
}

impl WorkerContext {
    /// A context with the built-in codecs and model backends.
    #[must_use]
    pub fn new(
        settings: WorkerSettings,
        jobs: Arc<dyn JobRepository>,
        catalog: Arc<dyn CatalogRepository>,
        storage: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            worker_id: nice_id(8),
            settings,
            jobs,
            catalog,
            storage,
            codecs: Arc::new(CodecRegistry::with_defaults()),
            serializer: Arc::new(ModelSerializer::with_defaults()),
        }
    }

    /// Connects to Postgres (running migrations) and the configured storage backend.
    pub async fn from_settings(settings: &AppSettings) -> Result<Self> {
        let pool = get_db_pool(settings, true).await?;
        let storage = create_artifact_store(&settings.storage)?;
        Ok(Self::new(
            settings.worker.clone(),
            Arc::new(PgJobRepository::new(pool.clone())),
            Arc::new(PgCatalogRepository::new(pool)),
            storage,
        ))
    }

    #[must_use]
    pub fn with_serializer(mut self, serializer: ModelSerializer) -> Self {
        self.serializer = Arc::new(serializer);
        self
    }

    #[must_use]
    pub fn with_codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = Arc::new(codecs);
        self
    }
}
