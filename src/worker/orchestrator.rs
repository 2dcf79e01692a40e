//! The orchestrator owns the fixed-size worker pool: `WORKERS` (default
//! 3) `JobWorker`s, each a `tokio::task` running the lease/process/complete
//! loop in `job_worker.rs`, plus a periodic `JobQueue::sweep` to reclaim
//! leases abandoned by a crashed worker. One `CancellationToken` drives
//! shutdown for every task.

use std::sync::Arc;
use std::time::Duration;

use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::contracts::ContractRegistry;
use crate::db::model::{DomainEventWriter, JobQueue};
use crate::source::BlockSource;
use crate::transform::{CodeChecker, TransformerRegistry};

use super::job_worker::JobWorker;

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

pub struct Orchestrator {
    queue: Arc<JobQueue>,
    registry: Arc<ContractRegistry>,
    transformers: Arc<TransformerRegistry>,
    source: Arc<dyn BlockSource>,
    code_checker: Arc<dyn CodeChecker>,
    writer: Arc<DomainEventWriter>,
    worker_count: usize,
}

impl Orchestrator {
    pub fn new(
        queue: Arc<JobQueue>,
        registry: Arc<ContractRegistry>,
        transformers: Arc<TransformerRegistry>,
        source: Arc<dyn BlockSource>,
        code_checker: Arc<dyn CodeChecker>,
        writer: Arc<DomainEventWriter>,
        worker_count: usize,
    ) -> Self {
        Self { queue, registry, transformers, source, code_checker, writer, worker_count }
    }

    /// Spawns the worker pool plus the sweeper and blocks until
    /// `cancellation_token` fires, then waits for every task to finish its
    /// current block before returning.
    pub async fn run(&self, cancellation_token: CancellationToken) -> anyhow::Result<()> {
        info!("starting orchestrator with {} worker(s)", self.worker_count);

        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(self.worker_count + 1);

        for idx in 0..self.worker_count {
            let worker = JobWorker::new(
                format!("worker-{idx}"),
                self.queue.clone(),
                self.registry.clone(),
                self.transformers.clone(),
                self.source.clone(),
                self.code_checker.clone(),
                self.writer.clone(),
            );
            let token = cancellation_token.clone();
            handles.push(tokio::spawn(async move { worker.run(token).await }));
        }

        handles.push(tokio::spawn(sweep_loop(self.queue.clone(), cancellation_token.clone())));

        for handle in handles {
            handle.await?;
        }

        info!("orchestrator shut down cleanly");
        Ok(())
    }
}

async fn sweep_loop(queue: Arc<JobQueue>, cancellation_token: CancellationToken) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(SWEEP_INTERVAL) => {
                match queue.sweep().await {
                    Ok(0) => {}
                    Ok(n) => info!("sweep reclaimed {n} abandoned job(s)"),
                    Err(e) => log::warn!("sweep failed: {e:#}"),
                }
            }
            _ = cancellation_token.cancelled() => break,
        }
    }
}
