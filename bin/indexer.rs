//! Operational CLI. `continuous` runs the worker pool and
//! pricing/calculation cron indefinitely; `blocks`/`range` enqueue a bounded
//! unit of work and exit once it drains; `failed`/`missing` are read-only
//! diagnostics.

use std::collections::HashSet;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use indexer::config::Settings;
use indexer::contracts::ContractRegistry;
use indexer::cron::{CronScheduler, CronSettings};
use indexer::db::model::{DomainEventWriter, JobQueue, ModelRepository};
use indexer::db::Database;
use indexer::error::IndexerError;
use indexer::pricing::{ChainlinkPriceSource, PricingService};
use indexer::source::{BlockSource, FallbackSource, ObjectStoreSource, RpcSource};
use indexer::transform::{CodeChecker, TransformerRegistry};
use indexer::types::Address;
use indexer::worker::Orchestrator;
use indexer::CalculationService;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use tokio_util::sync::CancellationToken;

/// AVAX/USD Chainlink feed on Avalanche C-Chain mainnet, overridable since a
/// model running against Fuji testnet needs a different aggregator.
const CHAINLINK_AVAX_USD_FEED: &str = "0x0a77230d17318075983913bc2145db16c7366156";
/// WAVAX, the base asset P2 direct pricing quotes swaps against.
const WAVAX_ADDRESS: &str = "0xb31f66aa3c1e785363f0875a1b74e27b85fd66c7";
/// USD-pegged stablecoins P2 prices swaps against directly, comma-separated
/// and overridable for a model tracking a different stablecoin set.
const USD_STABLECOIN_ADDRESSES: &str =
    "0xb97ef9ef8734c71904d8002f8b6bc66dd9c48a6,0xc7198437980c041c805a1edcba50c1ce5db9561,0xd586e7f844cea2f87f50152665bcbc2c279d8d70";

#[derive(Parser)]
#[command(name = "indexer", author, version, about = "Model-scoped EVM indexer for the Avalanche C-Chain")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingests continuously from the chain head and runs the pricing/
    /// calculation cron until signalled.
    Continuous {
        #[arg(long)]
        start_block: Option<i64>,
        #[arg(long)]
        end_block: Option<i64>,
    },
    /// Processes a fixed list of block numbers, then exits.
    Blocks {
        blocks: Vec<i64>,
        #[arg(long)]
        force: bool,
    },
    /// Processes a contiguous block range, then exits.
    Range {
        start: i64,
        end: i64,
        #[arg(long)]
        force: bool,
    },
    /// Lists jobs parked in `failed` status.
    Failed {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Prints block numbers in `[start, end]` with no `block_processing`
    /// row -- gaps left by a run whose jobs were never queued at all.
    Missing { start: i64, end: i64 },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::new() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("config error: {e}");
            return ExitCode::from(2);
        }
    };
    init_logger(&settings.log_level);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start tokio runtime: {e}");
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run(cli.command, settings)) {
        Ok(code) => code,
        Err(e) => {
            error!("fatal: {e:#}");
            let code = e.downcast_ref::<IndexerError>().map(|e| e.exit_code()).unwrap_or(1);
            ExitCode::from(code as u8)
        }
    }
}

fn init_logger(level: &str) {
    let filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    if let Err(e) = SimpleLogger::new().with_level(filter).init() {
        eprintln!("logger setup failed: {e}");
    }
}

async fn run(command: Command, settings: Settings) -> anyhow::Result<ExitCode> {
    let db = Database::new(&settings).await?;
    let config = db.shared.load_model_config(&settings.model_name).await?;
    let tracked_tokens: Vec<Address> = config.tracked_tokens.iter().cloned().collect();
    let sources = config.sources;

    let abi_root = std::env::var("INDEXER_ABI_ROOT").unwrap_or_else(|_| "abis".to_string());
    let registry = Arc::new(ContractRegistry::new(config.contracts, abi_root));
    let transformers = Arc::new(TransformerRegistry::with_defaults());

    let rpc_source = RpcSource::new(&settings.rpc)?;
    let object_store = ObjectStoreSource::new(settings.store.gcs_bucket.clone(), sources);
    let source: Arc<dyn BlockSource> = Arc::new(FallbackSource::new(object_store, rpc_source));
    let code_checker: Arc<dyn CodeChecker> = Arc::new(RpcSource::new(&settings.rpc)?);

    let chainlink_feed = std::env::var("INDEXER_CHAINLINK_AVAX_USD_FEED").unwrap_or_else(|_| CHAINLINK_AVAX_USD_FEED.to_string());
    let avax_address = Address::new(&std::env::var("INDEXER_WAVAX_ADDRESS").unwrap_or_else(|_| WAVAX_ADDRESS.to_string()));
    let usd_stablecoins: HashSet<Address> = std::env::var("INDEXER_USD_STABLE_ADDRESSES")
        .unwrap_or_else(|_| USD_STABLECOIN_ADDRESSES.to_string())
        .split(',')
        .map(|s| Address::new(s.trim()))
        .collect();
    let chainlink = ChainlinkPriceSource::new(settings.rpc.avax_rpc.clone(), chainlink_feed);
    let pricing = Arc::new(PricingService::new(
        db.shared.clone(),
        db.model.clone(),
        db.writer.clone(),
        chainlink,
        settings.model_name.clone(),
        avax_address,
        usd_stablecoins,
    ));
    let calculation = Arc::new(CalculationService::new(db.shared.clone(), db.model.clone(), db.writer.clone(), pricing.clone()));

    let cancellation_token = CancellationToken::new();
    spawn_signal_watcher(cancellation_token.clone());

    match command {
        Command::Continuous { start_block, end_block } => {
            run_continuous(
                db.queue.clone(),
                db.model.clone(),
                db.writer.clone(),
                registry,
                transformers,
                source,
                code_checker,
                pricing,
                calculation,
                settings.model_name.clone(),
                tracked_tokens,
                settings.workers,
                start_block,
                end_block,
                cancellation_token,
            )
            .await
        }
        Command::Blocks { blocks, force } => {
            run_batch(db.queue.clone(), registry, transformers, source, code_checker, db.writer.clone(), settings.workers, blocks, force, cancellation_token)
                .await
        }
        Command::Range { start, end, force } => {
            let blocks: Vec<i64> = (start..=end).collect();
            run_batch(db.queue.clone(), registry, transformers, source, code_checker, db.writer.clone(), settings.workers, blocks, force, cancellation_token)
                .await
        }
        Command::Failed { limit } => {
            let failed = db.queue.failed_jobs().await?;
            for job in failed.iter().take(limit) {
                println!("block {}: attempts={} last_error={}", job.block_number, job.attempts, job.last_error.as_deref().unwrap_or("-"));
            }
            info!("{} failed job(s) parked", failed.len());
            Ok(ExitCode::SUCCESS)
        }
        Command::Missing { start, end } => {
            let missing = db.model.missing_blocks(start, end).await?;
            for block in &missing {
                println!("{block}");
            }
            info!("{} block(s) missing in [{start}, {end}]", missing.len());
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_continuous(
    queue: Arc<JobQueue>,
    model: Arc<ModelRepository>,
    writer: Arc<DomainEventWriter>,
    registry: Arc<ContractRegistry>,
    transformers: Arc<TransformerRegistry>,
    source: Arc<dyn BlockSource>,
    code_checker: Arc<dyn CodeChecker>,
    pricing: Arc<PricingService>,
    calculation: Arc<CalculationService>,
    model_name: String,
    tracked_tokens: Vec<Address>,
    workers: usize,
    start_block: Option<i64>,
    end_block: Option<i64>,
    cancellation_token: CancellationToken,
) -> anyhow::Result<ExitCode> {
    let orchestrator = Orchestrator::new(queue.clone(), registry, transformers, source.clone(), code_checker, writer, workers);
    let cron = CronScheduler::new(model_name, tracked_tokens, source.clone(), pricing, calculation, CronSettings::default());

    let orch_token = cancellation_token.clone();
    let orch_handle = tokio::spawn(async move { orchestrator.run(orch_token).await });
    let cron_token = cancellation_token.clone();
    let cron_handle = tokio::spawn(async move { cron.run(cron_token).await });
    let enqueue_handle = tokio::spawn(enqueue_loop(queue, source, model, start_block, end_block, cancellation_token.clone()));

    orch_handle.await??;
    cron_handle.await??;
    enqueue_handle.await??;

    Ok(if cancellation_token.is_cancelled() { ExitCode::from(130) } else { ExitCode::SUCCESS })
}

/// Feeds the job queue from `next_block` (resuming from the last
/// processed block, or `start_block` if given) up to `end_block` (or the
/// chain head, re-checked every poll, if unbounded).
async fn enqueue_loop(
    queue: Arc<JobQueue>,
    source: Arc<dyn BlockSource>,
    model: Arc<ModelRepository>,
    start_block: Option<i64>,
    end_block: Option<i64>,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let mut next_block = match start_block {
        Some(b) => b,
        None => model.last_processed_block().await?.map(|b| b + 1).unwrap_or(0),
    };

    loop {
        if cancellation_token.is_cancelled() {
            return Ok(());
        }
        let head = source.latest_block_number().await.unwrap_or(next_block - 1);
        let ceiling = end_block.map_or(head, |e| e.min(head));
        if next_block <= ceiling {
            let batch: Vec<i64> = (next_block..=ceiling).collect();
            let enqueued = queue.enqueue(&batch).await?;
            if enqueued > 0 {
                info!("enqueued blocks {next_block}..={ceiling} ({enqueued} new)");
            }
            next_block = ceiling + 1;
        }
        if let Some(end) = end_block {
            if next_block > end {
                return Ok(());
            }
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(5)) => {}
            _ = cancellation_token.cancelled() => return Ok(()),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_batch(
    queue: Arc<JobQueue>,
    registry: Arc<ContractRegistry>,
    transformers: Arc<TransformerRegistry>,
    source: Arc<dyn BlockSource>,
    code_checker: Arc<dyn CodeChecker>,
    writer: Arc<DomainEventWriter>,
    workers: usize,
    blocks: Vec<i64>,
    force: bool,
    cancellation_token: CancellationToken,
) -> anyhow::Result<ExitCode> {
    let enqueued = if force { queue.enqueue_forced(&blocks).await? } else { queue.enqueue(&blocks).await? };
    info!("enqueued {enqueued} of {} requested block(s)", blocks.len());

    let orchestrator = Orchestrator::new(queue.clone(), registry, transformers, source, code_checker, writer, workers);
    let orch_token = cancellation_token.clone();
    let handle = tokio::spawn(async move { orchestrator.run(orch_token).await });

    loop {
        if cancellation_token.is_cancelled() {
            break;
        }
        if queue.pending_count().await? == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    let was_signalled = cancellation_token.is_cancelled();
    cancellation_token.cancel();
    handle.await??;

    Ok(if was_signalled { ExitCode::from(130) } else { ExitCode::SUCCESS })
}

fn spawn_signal_watcher(token: CancellationToken) -> Arc<AtomicBool> {
    let signalled = Arc::new(AtomicBool::new(false));
    let flag = signalled.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    error!("failed to install SIGTERM handler: {e}");
                    let _ = tokio::signal::ctrl_c().await;
                    flag.store(true, Ordering::SeqCst);
                    token.cancel();
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        flag.store(true, Ordering::SeqCst);
        token.cancel();
    });
    signalled
}
