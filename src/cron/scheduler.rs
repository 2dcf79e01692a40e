//! Cron scheduler for the pricing and calculation phases.
//!
//! Block ingestion runs continuously on the `Orchestrator`'s worker pool;
//! pricing and calculation are batch passes over already-ingested data,
//! each running as its own `tokio_cron_scheduler::Job::new_repeated_async`
//! on an independent interval.

use std::sync::Arc;

use anyhow::Result;
use log::{error, info};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::calculation::CalculationService;
use crate::db::shared::Denomination;
use crate::pricing::PricingService;
use crate::source::BlockSource;
use crate::types::Address;

/// Interval for every periodic job. Defaults match the `CRON_*_INTERVAL_SECS`
/// env vars read by `Settings`.
#[derive(Debug, Clone)]
pub struct CronSettings {
    /// P0: advance tracked periods to the chain head.
    pub periods_interval_secs: u64,
    /// P1: record the current block's Chainlink AVAX/USD price.
    pub block_price_interval_secs: u64,
    /// P2: price swaps directly against a known base asset.
    pub direct_pricing_interval_secs: u64,
    /// P3: roll up canonical per-minute VWAPs.
    pub canonical_vwap_interval_secs: u64,
    /// Event valuation + OHLC/volume analytics for tracked tokens.
    pub calculation_interval_secs: u64,
}

impl Default for CronSettings {
    fn default() -> Self {
        Self {
            periods_interval_secs: 60,
            block_price_interval_secs: 15,
            direct_pricing_interval_secs: 30,
            canonical_vwap_interval_secs: 60,
            calculation_interval_secs: 300,
        }
    }
}

pub struct CronScheduler {
    model_name: String,
    tracked_tokens: Vec<Address>,
    source: Arc<dyn BlockSource>,
    pricing: Arc<PricingService>,
    calculation: Arc<CalculationService>,
    settings: CronSettings,
}

impl CronScheduler {
    pub fn new(
        model_name: String,
        tracked_tokens: Vec<Address>,
        source: Arc<dyn BlockSource>,
        pricing: Arc<PricingService>,
        calculation: Arc<CalculationService>,
        settings: CronSettings,
    ) -> Self {
        Self { model_name, tracked_tokens, source, pricing, calculation, settings }
    }

    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<()> {
        let scheduler = JobScheduler::new().await?;

        self.register_periods_job(&scheduler).await?;
        self.register_block_price_job(&scheduler).await?;
        self.register_direct_pricing_job(&scheduler).await?;
        self.register_canonical_vwap_job(&scheduler).await?;
        self.register_calculation_job(&scheduler).await?;

        scheduler.start().await?;
        info!("cron scheduler started with 5 jobs");

        cancellation_token.cancelled().await;
        info!("cron scheduler shutting down");
        scheduler.shutdown().await?;
        Ok(())
    }

    async fn register_periods_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let pricing = self.pricing.clone();
        let source = self.source.clone();
        let interval = self.settings.periods_interval_secs;

        let job = Job::new_repeated_async(std::time::Duration::from_secs(interval), move |_uuid, _lock| {
            let pricing = pricing.clone();
            let source = source.clone();
            Box::pin(async move {
                let head = match source.latest_block_number().await {
                    Ok(h) => h,
                    Err(e) => {
                        error!("periods job: failed to fetch chain head: {e:#}");
                        return;
                    }
                };
                if let Err(e) = pricing.run_periods(head).await {
                    error!("periods job failed: {e:#}");
                }
            })
        })?;
        scheduler.add(job).await?;
        info!("registered periods job (every {interval}s)");
        Ok(())
    }

    async fn register_block_price_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let pricing = self.pricing.clone();
        let source = self.source.clone();
        let interval = self.settings.block_price_interval_secs;

        let job = Job::new_repeated_async(std::time::Duration::from_secs(interval), move |_uuid, _lock| {
            let pricing = pricing.clone();
            let source = source.clone();
            Box::pin(async move {
                let head = match source.latest_block_number().await {
                    Ok(h) => h,
                    Err(e) => {
                        error!("block price job: failed to fetch chain head: {e:#}");
                        return;
                    }
                };
                if let Err(e) = pricing.run_block_price(head).await {
                    error!("block price job failed: {e:#}");
                }
            })
        })?;
        scheduler.add(job).await?;
        info!("registered block_price job (every {interval}s)");
        Ok(())
    }

    async fn register_direct_pricing_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let pricing = self.pricing.clone();
        let interval = self.settings.direct_pricing_interval_secs;

        let job = Job::new_repeated_async(std::time::Duration::from_secs(interval), move |_uuid, _lock| {
            let pricing = pricing.clone();
            Box::pin(async move {
                if let Err(e) = pricing.run_direct_pricing().await {
                    error!("direct pricing job failed: {e:#}");
                }
            })
        })?;
        scheduler.add(job).await?;
        info!("registered direct_pricing job (every {interval}s)");
        Ok(())
    }

    async fn register_canonical_vwap_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let pricing = self.pricing.clone();
        let interval = self.settings.canonical_vwap_interval_secs;

        let job = Job::new_repeated_async(std::time::Duration::from_secs(interval), move |_uuid, _lock| {
            let pricing = pricing.clone();
            Box::pin(async move {
                if let Err(e) = pricing.run_canonical_vwap().await {
                    error!("canonical vwap job failed: {e:#}");
                }
            })
        })?;
        scheduler.add(job).await?;
        info!("registered canonical_vwap job (every {interval}s)");
        Ok(())
    }

    async fn register_calculation_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let calculation = self.calculation.clone();
        let model_name = self.model_name.clone();
        let tokens = self.tracked_tokens.clone();
        let interval = self.settings.calculation_interval_secs;

        let job = Job::new_repeated_async(std::time::Duration::from_secs(interval), move |_uuid, _lock| {
            let calculation = calculation.clone();
            let model_name = model_name.clone();
            let tokens = tokens.clone();
            Box::pin(async move {
                for token in &tokens {
                    if let Err(e) = calculation.update_all(&model_name, token, Denomination::Usd, None).await {
                        error!("calculation job failed for {}: {e:#}", token.as_str());
                    }
                }
            })
        })?;
        scheduler.add(job).await?;
        info!("registered calculation job (every {interval}s, {} tracked token(s))", self.tracked_tokens.len());
        Ok(())
    }
}
