//! CalculationService: derives event valuations and analytics from
//! already-priced data. Runs independently of PricingService -- it never
//! blocks on a phase that hasn't caught up yet, it just processes whatever
//! canonical prices and trade/swap details already exist.
//!
//! Read-then-batch-apply: gap detection is a single mechanism, the
//! `LEFT JOIN ... IS NULL` queries already used by `ModelRepository`, rather
//! than a separate period-id scan layered on top.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::info;
use num_traits::ToPrimitive;

use crate::db::model::{AssetPrice, AssetVolume, DomainEventWriter, EventDetail, ModelRepository, PricingMethod};
use crate::db::shared::{Denomination, PeriodType, SharedRepository};
use crate::pricing::PricingService;
use crate::types::{Address, DomainEventId};

pub struct CalculationStats {
    pub transfers_valued: u64,
    pub liquidity_valued: u64,
    pub rewards_valued: u64,
    pub positions_valued: u64,
}

pub struct CalculationService {
    shared: Arc<SharedRepository>,
    model: Arc<ModelRepository>,
    writer: Arc<DomainEventWriter>,
    pricing: Arc<PricingService>,
}

impl CalculationService {
    pub fn new(shared: Arc<SharedRepository>, model: Arc<ModelRepository>, writer: Arc<DomainEventWriter>, pricing: Arc<PricingService>) -> Self {
        Self { shared, model, writer, pricing }
    }

    /// Applies canonical (falling back to global) pricing to every
    /// transfer/liquidity/reward/position of `asset` since `since` that
    /// doesn't have an `event_detail` row yet.
    pub async fn calculate_event_valuations(&self, asset: &Address, denom: Denomination, since: DateTime<Utc>) -> anyhow::Result<CalculationStats> {
        let transfers_valued = self.value_events("transfer", self.model.unvalued_transfers(asset, since).await?, asset, denom).await?;
        let liquidity_valued = self.value_events("liquidity", self.model.unvalued_liquidity(asset, since).await?, asset, denom).await?;
        let rewards_valued = self.value_events("reward", self.model.unvalued_rewards(asset, since).await?, asset, denom).await?;
        let positions_valued = self.value_events("position", self.model.unvalued_positions(asset, since).await?, asset, denom).await?;

        info!(
            "event valuations for {}: {transfers_valued} transfer(s), {liquidity_valued} liquidity, {rewards_valued} reward(s), {positions_valued} position(s)",
            asset.as_str()
        );
        Ok(CalculationStats { transfers_valued, liquidity_valued, rewards_valued, positions_valued })
    }

    async fn value_events(
        &self,
        event_type: &str,
        events: Vec<crate::db::model::UnvaluedEvent>,
        asset: &Address,
        denom: Denomination,
    ) -> anyhow::Result<u64> {
        let mut details = Vec::with_capacity(events.len());
        for event in events {
            let minute = crate::types::floor_to_minute(event.timestamp.timestamp());
            let (price, pricing_method) = match self.shared.get_price_vwap(asset, minute, denom).await? {
                Some(vwap) => (vwap.price_vwap, PricingMethod::Canonical),
                None => match self.pricing.resolve_global_price(asset, denom, minute).await? {
                    Some(price) => (price, PricingMethod::Global),
                    None => continue, // pricing gap, not an error: skip, retried next run
                },
            };
            let amount_f = event.amount.to_f64().unwrap_or(0.0);
            details.push(EventDetail {
                content_id: DomainEventId::from_fields("event_detail", &[event_type, event.content_id.as_str()]),
                event_type: event_type.to_string(),
                event_id: event.content_id,
                timestamp: event.timestamp,
                value_usd: apply_price(amount_f, price),
                pricing_method,
            });
        }
        self.writer.write_event_details(&details).await
    }

    /// Builds OHLC candles for `asset` over `period_type` buckets from
    /// priced trades since `since`. Buckets with zero trades are skipped
    /// silently, not written as empty candles.
    pub async fn generate_asset_ohlc_candles(
        &self,
        asset: &Address,
        denom: Denomination,
        period_type: PeriodType,
        since: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let trades = self.model.trade_details_since(asset, denom, since).await?;
        let duration = period_type.duration_secs();

        let mut buckets: HashMap<i64, Vec<f64>> = HashMap::new();
        for (timestamp, price, _volume) in trades {
            let bucket_open = floor_to_period(timestamp.timestamp(), duration);
            buckets.entry(bucket_open).or_default().push(price);
        }

        let prices: Vec<AssetPrice> = buckets
            .into_iter()
            .map(|(bucket_open, prices)| {
                let candle = fold_ohlc(&prices);
                AssetPrice {
                    content_id: DomainEventId::from_fields(
                        "asset_price",
                        &[asset.as_str(), denom.as_str(), period_type.as_str(), &bucket_open.to_string()],
                    ),
                    asset_address: asset.clone(),
                    denom,
                    period_type,
                    period_open: DateTime::from_timestamp(bucket_open, 0).unwrap_or(since),
                    open: candle.0,
                    high: candle.1,
                    low: candle.2,
                    close: candle.3,
                }
            })
            .collect();

        let n = prices.len() as u64;
        self.writer.write_asset_prices(&prices).await?;
        if n > 0 {
            info!("generated {n} OHLC candle(s) for {} at {}", asset.as_str(), period_type.as_str());
        }
        Ok(n)
    }

    /// Rolls up priced swap volume for `asset` over `period_type` buckets,
    /// grouped by `Contract.project`. The pool→project mapping lives in the
    /// shared database, so it's fetched once and joined in application
    /// code rather than attempted as a cross-database SQL join.
    pub async fn calculate_asset_volume_by_protocol(
        &self,
        model_name: &str,
        asset: &Address,
        denom: Denomination,
        period_type: PeriodType,
        since: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let contracts = self.shared.get_contracts_for_model(model_name).await?;
        let project_by_pool: HashMap<Address, String> = contracts.into_iter().map(|c| (c.address, c.project)).collect();

        let rows = self.model.pool_swap_volume_since(asset, denom, since).await?;
        let duration = period_type.duration_secs();

        #[derive(Default)]
        struct Bucket {
            volume_usd: f64,
            pools: std::collections::HashSet<Address>,
            swap_count: i32,
        }

        let mut buckets: HashMap<(i64, String), Bucket> = HashMap::new();
        for (pool, timestamp, volume_usd, swap_count) in rows {
            let bucket_open = floor_to_period(timestamp.timestamp(), duration);
            let protocol = project_by_pool.get(&pool).cloned().unwrap_or_else(|| "unknown".to_string());
            let bucket = buckets.entry((bucket_open, protocol)).or_default();
            bucket.volume_usd += volume_usd;
            bucket.pools.insert(pool);
            bucket.swap_count += swap_count;
        }

        let volumes: Vec<AssetVolume> = buckets
            .into_iter()
            .map(|((bucket_open, protocol), b)| AssetVolume {
                content_id: DomainEventId::from_fields(
                    "asset_volume",
                    &[asset.as_str(), denom.as_str(), period_type.as_str(), &bucket_open.to_string(), &protocol],
                ),
                asset_address: asset.clone(),
                denom,
                period_type,
                period_open: DateTime::from_timestamp(bucket_open, 0).unwrap_or(since),
                protocol,
                volume_usd: b.volume_usd,
                pool_count: b.pools.len() as i32,
                swap_count: b.swap_count,
            })
            .collect();

        let n = volumes.len() as u64;
        self.writer.write_asset_volumes(&volumes).await?;
        if n > 0 {
            info!("rolled up {n} protocol volume bucket(s) for {}", asset.as_str());
        }
        Ok(n)
    }

    /// Gap-driven convenience wrapper: values every unvalued event of
    /// `asset`, looking back `days` (or everything, if `None`).
    pub async fn update_event_valuations(&self, asset: &Address, denom: Denomination, days: Option<i64>) -> anyhow::Result<CalculationStats> {
        let since = since_from_days(days);
        self.calculate_event_valuations(asset, denom, since).await
    }

    /// Gap-driven convenience wrapper: generates candles + protocol volume
    /// for every tracked period resolution.
    pub async fn update_analytics(&self, model_name: &str, asset: &Address, denom: Denomination, days: Option<i64>) -> anyhow::Result<u64> {
        let since = since_from_days(days);
        let mut total = 0u64;
        for period_type in crate::pricing::TRACKED_PERIODS {
            total += self.generate_asset_ohlc_candles(asset, denom, period_type, since).await?;
            total += self.calculate_asset_volume_by_protocol(model_name, asset, denom, period_type, since).await?;
        }
        Ok(total)
    }

    /// Runs both event valuations and analytics for `asset` in one pass.
    pub async fn update_all(&self, model_name: &str, asset: &Address, denom: Denomination, days: Option<i64>) -> anyhow::Result<()> {
        self.update_event_valuations(asset, denom, days).await?;
        self.update_analytics(model_name, asset, denom, days).await?;
        Ok(())
    }
}

fn since_from_days(days: Option<i64>) -> DateTime<Utc> {
    match days {
        Some(d) => Utc::now() - Duration::days(d),
        None => DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_else(Utc::now),
    }
}

fn floor_to_period(t: i64, duration_secs: i64) -> i64 {
    t - t.rem_euclid(duration_secs)
}

/// USD value of a human-scaled event amount at a resolved per-unit price,
/// whatever pricing method (canonical or global) produced that price.
fn apply_price(amount_human: f64, price_usd: f64) -> f64 {
    amount_human * price_usd
}

/// Folds a time-ordered sequence of trade prices into an OHLC candle:
/// open is the first price, close the last, high/low the extremes.
/// Panics on an empty slice -- callers only invoke this for buckets that
/// already hold at least one trade.
fn fold_ohlc(prices: &[f64]) -> (f64, f64, f64, f64) {
    let open = prices[0];
    let close = *prices.last().unwrap();
    let high = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let low = prices.iter().cloned().fold(f64::INFINITY, f64::min);
    (open, high, low, close)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floors_to_period_boundary() {
        assert_eq!(floor_to_period(3_700, 3_600), 3_600);
        assert_eq!(floor_to_period(90, 60), 60);
    }

    #[test]
    fn fold_ohlc_tracks_open_high_low_close() {
        let (open, high, low, close) = fold_ohlc(&[1.0, 1.5, 0.8, 1.2]);
        assert_eq!(open, 1.0);
        assert_eq!(high, 1.5);
        assert_eq!(low, 0.8);
        assert_eq!(close, 1.2);
    }

    #[test]
    fn fold_ohlc_single_trade_is_flat_candle() {
        assert_eq!(fold_ohlc(&[2.0]), (2.0, 2.0, 2.0, 2.0));
    }

    #[test]
    fn apply_price_matches_global_fallback_example() {
        assert_eq!(apply_price(2.0, 1.075), 2.15);
    }
}
