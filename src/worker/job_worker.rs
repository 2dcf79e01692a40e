//! One `JobWorker` per `tokio::task`, leasing `ProcessingJob` rows and
//! running the fetch -> decode -> transform -> finalize -> write pipeline
//! for each block. A cancellation-aware loop that leases `ProcessingJob`
//! rows from Postgres and backs off with increasing delay on an empty
//! lease rather than blocking on a stream.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::contracts::ContractRegistry;
use crate::db::model::{BlockProcessing, JobQueue, ProcessingJob};
use crate::decode::{Decoded, LogDecoder};
use crate::source::BlockSource;
use crate::transform::{finalize_transaction, CodeChecker, IndexedTransform, TransformContext, TransformerRegistry};
use crate::types::Address;

const BACKOFF_MIN: Duration = Duration::from_millis(250);
const BACKOFF_MAX: Duration = Duration::from_secs(2);
const LEASE_BATCH_SIZE: i64 = 1;

pub struct JobWorker {
    id: String,
    queue: Arc<JobQueue>,
    registry: Arc<ContractRegistry>,
    transformers: Arc<TransformerRegistry>,
    source: Arc<dyn BlockSource>,
    code_checker: Arc<dyn CodeChecker>,
    writer: Arc<crate::db::model::DomainEventWriter>,
}

impl JobWorker {
    pub fn new(
        id: String,
        queue: Arc<JobQueue>,
        registry: Arc<ContractRegistry>,
        transformers: Arc<TransformerRegistry>,
        source: Arc<dyn BlockSource>,
        code_checker: Arc<dyn CodeChecker>,
        writer: Arc<crate::db::model::DomainEventWriter>,
    ) -> Self {
        Self { id, queue, registry, transformers, source, code_checker, writer }
    }

    pub async fn run(&self, cancellation_token: CancellationToken) {
        let mut backoff = BACKOFF_MIN;
        loop {
            if cancellation_token.is_cancelled() {
                info!("worker {} received cancellation signal", self.id);
                break;
            }

            let jobs = match self.queue.lease(&self.id, LEASE_BATCH_SIZE).await {
                Ok(jobs) => jobs,
                Err(e) => {
                    warn!("worker {}: lease failed: {e:#}", self.id);
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(BACKOFF_MAX);
                    continue;
                }
            };

            if jobs.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = cancellation_token.cancelled() => break,
                }
                backoff = (backoff * 2).min(BACKOFF_MAX);
                continue;
            }
            backoff = BACKOFF_MIN;

            for job in jobs {
                if cancellation_token.is_cancelled() {
                    break;
                }
                self.process_job(&job).await;
            }
        }
    }

    async fn process_job(&self, job: &ProcessingJob) {
        match self.process_block(job.block_number).await {
            Ok(()) => {
                if let Err(e) = self.queue.complete(job.id).await {
                    warn!("worker {}: failed to mark job {} complete: {e:#}", self.id, job.id);
                }
            }
            Err(e) => {
                warn!("worker {}: block {} failed: {e:#}", self.id, job.block_number);
                if let Err(e) = self.queue.fail(job.id, &e.to_string()).await {
                    warn!("worker {}: failed to mark job {} failed: {e:#}", self.id, job.id);
                }
            }
        }
    }

    async fn process_block(&self, block_number: i64) -> anyhow::Result<()> {
        let block = self
            .source
            .fetch_block(block_number)
            .await?
            .ok_or_else(|| crate::error::IndexerError::BlockFetchError { block_number, reason: "no source returned this block".into() })?;

        let mut by_tx: HashMap<crate::types::Hash, Vec<IndexedTransform>> = HashMap::new();
        let mut base_tokens: HashMap<Address, Address> = HashMap::new();
        let mut removed_count = 0i32;
        let mut encoded_count = 0i32;

        for log in &block.logs {
            if log.removed {
                removed_count += 1;
                continue;
            }

            let contract = self.registry.contract(&log.address);
            if let Some(contract) = contract {
                if let Some(base) = &contract.base_token_address {
                    base_tokens.insert(log.address.clone(), base.clone());
                }
            }

            let abi = match contract {
                Some(_) => self.registry.abi(&log.address).await,
                None => None,
            };

            let decoded = match LogDecoder::decode(log, abi.as_ref()) {
                Decoded::Event(decoded) => decoded,
                Decoded::Encoded(_) => {
                    encoded_count += 1;
                    continue;
                }
            };

            let Some(contract) = contract else { continue };
            let Some(transformer_name) = contract.transformer_name.as_deref() else { continue };
            let Some(transformer) = self.transformers.get(transformer_name) else {
                warn!("no transformer registered for '{transformer_name}' (contract {})", contract.address.as_str());
                continue;
            };

            let ctx = TransformContext { contract, config: contract.transformer_config.as_ref() };
            let transform = transformer.transform(&ctx, &decoded).await?;
            by_tx.entry(log.tx_hash.clone()).or_default().push(IndexedTransform { log_index: log.log_index, transform });
        }

        if removed_count > 0 || encoded_count > 0 {
            info!("block {block_number}: {removed_count} reorg-removed log(s) skipped, {encoded_count} log(s) left encoded (no event/transformer match)");
        }

        let transaction_count = by_tx.len() as i32;
        for (tx_hash, transforms) in by_tx {
            let result =
                finalize_transaction(&tx_hash, block_number, block.timestamp, &base_tokens, transforms, self.code_checker.as_ref()).await?;
            self.writer.write_transaction_results(&tx_hash, block_number, block.timestamp, &result, true).await?;
        }

        self.writer
            .repo()
            .mark_block_processed(&BlockProcessing {
                block_number,
                block_hash: block.block_hash,
                timestamp: block.timestamp,
                transaction_count,
                processed_at: chrono::Utc::now(),
            })
            .await?;

        Ok(())
    }
}
