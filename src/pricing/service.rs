//! Ties the P0-P4 phases together into one service the cron scheduler
//! calls on a fixed interval per phase, each phase registered as its own
//! `tokio_cron_scheduler::Job` rather than folded into a single resolver
//! pass.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};

use crate::db::model::{DomainEventWriter, ModelRepository};
use crate::db::shared::{Denomination, SharedRepository};
use crate::types::Address;

use super::chainlink::ChainlinkPriceSource;
use super::periods::{periods_to_open, TRACKED_PERIODS};
use super::phases::{run_p1_block_price, run_p2_direct_pricing, run_p2_trade_pricing, run_p3_canonical_vwap, run_p4_global_fallback};

pub struct PricingService {
    shared: Arc<SharedRepository>,
    model: Arc<ModelRepository>,
    writer: Arc<DomainEventWriter>,
    chainlink: ChainlinkPriceSource,
    model_id: String,
    avax_address: Address,
    usd_stablecoin_addresses: HashSet<Address>,
    batch_size: i64,
    vwap_window_minutes: i64,
    fallback_lookback_minutes: i64,
}

impl PricingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        shared: Arc<SharedRepository>,
        model: Arc<ModelRepository>,
        writer: Arc<DomainEventWriter>,
        chainlink: ChainlinkPriceSource,
        model_id: String,
        avax_address: Address,
        usd_stablecoin_addresses: HashSet<Address>,
    ) -> Self {
        Self {
            shared,
            model,
            writer,
            chainlink,
            model_id,
            avax_address,
            usd_stablecoin_addresses,
            batch_size: 500,
            vwap_window_minutes: 15,
            fallback_lookback_minutes: 60,
        }
    }

    /// P0: advance every tracked period resolution to cover the current
    /// chain head.
    pub async fn run_periods(&self, head_block: i64) -> anyhow::Result<()> {
        let head_time_unix = Utc::now().timestamp();
        for period_type in TRACKED_PERIODS {
            let last = self.shared.last_period(period_type).await?;
            let opens = periods_to_open(period_type, last.as_ref(), head_block, head_time_unix);
            for period in &opens {
                self.shared.upsert_period(period).await?;
            }
            if !opens.is_empty() {
                info!("opened {} {:?} period(s) up to block {head_block}", opens.len(), period_type);
            }
        }
        Ok(())
    }

    pub async fn run_block_price(&self, block_number: i64) -> anyhow::Result<()> {
        let timestamp = Utc::now();
        match run_p1_block_price(&self.shared, &self.chainlink, block_number, timestamp).await {
            Ok(true) => info!("recorded AVAX/USD price for block {block_number}"),
            Ok(false) => {}
            Err(e) => warn!("P1 block price failed for block {block_number}: {e:#}"),
        }
        Ok(())
    }

    /// P2: price every swap missing a detail, then roll each affected
    /// trade's constituent swaps up into a trade-level price.
    pub async fn run_direct_pricing(&self) -> anyhow::Result<usize> {
        let round = self.chainlink.latest_round_data().await?;
        let avax_price_usd = num_traits::ToPrimitive::to_f64(&round.answer).unwrap_or(0.0)
            / 10f64.powi(self.chainlink.answer_decimals() as i32);

        let details = run_p2_direct_pricing(
            &self.model,
            avax_price_usd,
            &self.avax_address,
            &self.usd_stablecoin_addresses,
            Denomination::Usd,
            self.batch_size,
        )
        .await?;
        let swap_count = details.len();
        if swap_count > 0 {
            self.writer.write_poolswap_details(&details).await?;
            info!("P2 priced {swap_count} swap(s) directly");
        }

        let trade_details = run_p2_trade_pricing(&self.model, Denomination::Usd, self.batch_size).await?;
        let trade_count = trade_details.len();
        if trade_count > 0 {
            self.writer.write_trade_details(&trade_details).await?;
            info!("P2 priced {trade_count} trade(s) directly (volume-weighted)");
        }

        Ok(swap_count + trade_count)
    }

    pub async fn run_canonical_vwap(&self) -> anyhow::Result<usize> {
        let since = Utc::now() - chrono::Duration::minutes(self.vwap_window_minutes);
        let vwaps = run_p3_canonical_vwap(&self.shared, &self.model, &self.model_id, Denomination::Usd, since).await?;
        for vwap in &vwaps {
            self.shared.upsert_price_vwap(vwap).await?;
        }
        if !vwaps.is_empty() {
            info!("P3 upserted {} canonical VWAP bucket(s)", vwaps.len());
        }
        Ok(vwaps.len())
    }

    /// P4: resolve a fallback price for `asset` at `minute`, used by
    /// CalculationService when no canonical VWAP exists for that minute.
    pub async fn resolve_global_price(&self, asset: &Address, denom: Denomination, minute: i64) -> anyhow::Result<Option<f64>> {
        let vwap = run_p4_global_fallback(&self.shared, asset, denom, minute, self.fallback_lookback_minutes).await?;
        Ok(vwap.map(|v| v.price_vwap))
    }
}
