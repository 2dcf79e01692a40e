use std::sync::Arc;

use log::info;

use crate::config::Settings;

pub mod model;
pub mod pool;
pub mod shared;

pub use model::{DomainEventWriter, JobQueue, ModelRepository};
pub use shared::SharedRepository;

/// Combined database handle: the shared (infra) database and the
/// model-scoped database, both plain Postgres.
///
/// The shared database holds config, pricing and period state that is
/// read relationally (joins, foreign keys) across models; the model
/// database holds one model's events, pricing details and processing
/// state, isolated per model name (`INDEXER_MODEL_DB_NAME`, defaulting to
/// the model name itself).
#[derive(Clone)]
pub struct Database {
    pub shared: Arc<SharedRepository>,
    pub model: Arc<ModelRepository>,
    pub queue: Arc<JobQueue>,
    pub writer: Arc<DomainEventWriter>,
}

impl Database {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        let shared_pool = pool::connect_pool(&settings.shared_db, "shared").await?;
        let model_pool = pool::connect_pool(&settings.model_db, "model").await?;

        pool::migrate(&shared_pool, "schema/shared.sql").await?;
        pool::migrate(&model_pool, "schema/model.sql").await?;

        let shared = SharedRepository::new(shared_pool);
        let model = ModelRepository::new(model_pool.clone());
        let queue = JobQueue::new(model_pool, 300, 5);
        let writer = DomainEventWriter::new(model.clone());

        info!("database pools connected and migrated (shared + model '{}')", settings.model_name);

        Ok(Self {
            shared: Arc::new(shared),
            model: Arc::new(model),
            queue: Arc::new(queue),
            writer: Arc::new(writer),
        })
    }
}
