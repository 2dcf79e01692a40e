//! P1-P4 pricing phases.
//!
//! P1 stamps a block-level AVAX/USD price from Chainlink. P2 prices
//! individual swaps directly against a pool's configured base token, then
//! rolls each transaction's constituent swaps up into a trade-level price.
//! P3 aggregates priced swaps from designated pricing pools into
//! per-minute, per-asset canonical VWAP prices, validated against
//! `utils::validation`'s sanity bounds. P4 is the fallback used by
//! CalculationService when no canonical price exists for an asset/minute:
//! the nearest prior VWAP (never fabricated from nothing).

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use num_traits::ToPrimitive;

use crate::db::model::{ModelRepository, PoolSwapDetail, SwapPriceMethod, TradeDetail, TradePriceMethod};
use crate::db::shared::{BlockPrice, Denomination, PriceVwap, SharedRepository};
use crate::types::{Address, Amount, DomainEventId};
use crate::utils::conversion::u256_to_f64_safe;
use crate::utils::validation::{has_sufficient_native_liquidity, validate_usd_price, validate_usd_volume};

use super::chainlink::ChainlinkPriceSource;

/// P1: fetch the current AVAX/USD price and attach it to `block_number`,
/// skipping silently if one is already recorded (one price per block).
pub async fn run_p1_block_price(
    shared: &SharedRepository,
    chainlink: &ChainlinkPriceSource,
    block_number: i64,
    timestamp: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let round = chainlink.latest_round_data().await?;
    let price_usd = u256_to_f64_safe(
        alloy::primitives::U256::from_str_radix(&round.answer.to_string(), 10).unwrap_or_default(),
        chainlink.answer_decimals() as u8,
    )
    .unwrap_or(0.0);
    let price_usd = validate_usd_price(price_usd);
    if price_usd == 0.0 {
        anyhow::bail!("chainlink returned an out-of-bounds AVAX/USD price: {}", round.answer);
    }

    shared
        .insert_block_price_skip_existing(&BlockPrice {
            block_number,
            timestamp,
            price_usd,
            chainlink_round_id: Some(round.round_id),
            chainlink_updated_at: chrono::DateTime::from_timestamp(round.updated_at, 0),
        })
        .await
}

/// P2 (swap level): price every swap whose pool trades directly against
/// AVAX or a tracked USD stablecoin, skipping swaps whose pool lacks
/// enough native-side liquidity to trust (manipulation guard from
/// `utils::validation::has_sufficient_native_liquidity`).
#[allow(clippy::too_many_arguments)]
pub async fn run_p2_direct_pricing(
    model: &ModelRepository,
    avax_price_usd: f64,
    avax_address: &Address,
    usd_stablecoins: &HashSet<Address>,
    denom: Denomination,
    batch_size: i64,
) -> anyhow::Result<Vec<PoolSwapDetail>> {
    let swaps = model.swaps_missing_price(denom, batch_size).await?;
    let mut details = Vec::with_capacity(swaps.len());

    for swap in swaps {
        let (price_method, base_price_usd) = if swap.quote_token == *avax_address {
            let quote_amount_f = amount_to_f64(&swap.quote_amount);
            let base_amount_f = amount_to_f64(&swap.base_amount);
            if base_amount_f == 0.0 || !has_sufficient_native_liquidity(quote_amount_f.abs(), avax_price_usd) {
                (SwapPriceMethod::Error, 0.0)
            } else {
                let price = validate_usd_price(direct_reference_price(quote_amount_f.abs(), base_amount_f.abs(), avax_price_usd));
                (SwapPriceMethod::DirectAvax, price)
            }
        } else if swap.base_token == *avax_address {
            (SwapPriceMethod::DirectAvax, avax_price_usd)
        } else if usd_stablecoins.contains(&swap.quote_token) {
            let quote_amount_f = amount_to_f64(&swap.quote_amount);
            let base_amount_f = amount_to_f64(&swap.base_amount);
            if base_amount_f == 0.0 {
                (SwapPriceMethod::Error, 0.0)
            } else {
                let price = validate_usd_price(direct_reference_price(quote_amount_f.abs(), base_amount_f.abs(), 1.0));
                (SwapPriceMethod::DirectUsd, price)
            }
        } else if usd_stablecoins.contains(&swap.base_token) {
            (SwapPriceMethod::DirectUsd, 1.0)
        } else {
            (SwapPriceMethod::Error, 0.0)
        };

        let volume_usd = base_price_usd * amount_to_f64(&swap.base_amount).abs();
        let volume_usd = validate_usd_volume(volume_usd);

        details.push(PoolSwapDetail {
            content_id: DomainEventId::from_fields("poolswap_detail", &[swap.content_id.as_str(), denom.as_str()]),
            poolswap_id: swap.content_id,
            denomination: denom,
            timestamp: swap.timestamp,
            base_price_usd,
            quote_price_usd: avax_price_usd,
            volume_usd,
            price_method,
        });
    }

    Ok(details)
}

/// P2 (trade level): roll each trade's already-priced constituent swaps up
/// into one `TradeDetail`, volume-weighting across pools with
/// `price = sum(volume) / sum(volume / price)`.
pub async fn run_p2_trade_pricing(model: &ModelRepository, denom: Denomination, batch_size: i64) -> anyhow::Result<Vec<TradeDetail>> {
    let trades = model.trades_missing_price(denom, batch_size).await?;
    let mut details = Vec::with_capacity(trades.len());

    for trade in trades {
        let base_pairs: Vec<(f64, f64)> = trade.swap_prices.iter().map(|(base, _, volume)| (*base, *volume)).collect();
        let quote_pairs: Vec<(f64, f64)> = trade.swap_prices.iter().map(|(_, quote, volume)| (*quote, *volume)).collect();

        let Some(base_price_usd) = trade_weighted_price(&base_pairs) else { continue };
        let quote_price_usd = trade_weighted_price(&quote_pairs).unwrap_or(0.0);
        let volume_usd = validate_usd_volume(trade.swap_prices.iter().map(|(_, _, volume)| volume).sum());

        details.push(TradeDetail {
            content_id: DomainEventId::from_fields("trade_detail", &[trade.content_id.as_str(), denom.as_str()]),
            trade_id: trade.content_id,
            denomination: denom,
            timestamp: trade.timestamp,
            base_price_usd: validate_usd_price(base_price_usd),
            quote_price_usd,
            volume_usd,
            price_method: TradePriceMethod::Direct,
        });
    }

    Ok(details)
}

/// P3: fold every swap priced in the last `window`, drawn only from the
/// asset's designated pricing pools, into per-minute volume-weighted
/// prices, then derive a 5-minute trailing VWAP by combining each minute
/// with the previous four.
pub async fn run_p3_canonical_vwap(
    shared: &SharedRepository,
    model: &ModelRepository,
    model_id: &str,
    denom: Denomination,
    since: DateTime<Utc>,
) -> anyhow::Result<Vec<PriceVwap>> {
    let inputs = model.vwap_inputs(denom, since).await?;

    let mut pricing_pools: HashMap<Address, HashSet<Address>> = HashMap::new();
    for input in &inputs {
        if !pricing_pools.contains_key(&input.base_token) {
            let pools = shared.get_pricing_pools(model_id, &input.base_token).await?;
            pricing_pools.insert(input.base_token.clone(), pools.into_iter().collect());
        }
    }

    #[derive(Default)]
    struct Bucket {
        weighted_price_sum: f64,
        base_volume: f64,
        quote_volume: f64,
        pools: HashSet<Address>,
        swap_count: i32,
    }

    let mut buckets: HashMap<(Address, i64), Bucket> = HashMap::new();
    for input in inputs {
        let allowed = pricing_pools.get(&input.base_token);
        if !allowed.is_some_and(|pools| pools.contains(&input.pool)) {
            continue;
        }

        let minute = crate::types::floor_to_minute(input.timestamp.timestamp());
        let bucket = buckets.entry((input.base_token.clone(), minute)).or_default();
        let base_amount_f = amount_to_f64(&input.base_amount).abs();
        bucket.weighted_price_sum += input.base_price_usd * base_amount_f;
        bucket.base_volume += base_amount_f;
        bucket.quote_volume += input.volume_usd;
        bucket.pools.insert(input.pool);
        bucket.swap_count += 1;
    }

    let mut results = Vec::with_capacity(buckets.len());
    for ((asset_address, minute), b) in buckets {
        if b.base_volume <= 0.0 {
            continue;
        }
        let price_period = volume_weighted_price(b.weighted_price_sum, b.base_volume);
        let price_vwap = trailing_vwap(shared, &asset_address, denom, minute, price_period, b.base_volume).await?;

        results.push(PriceVwap {
            asset_address,
            timestamp_minute: minute,
            denomination: denom,
            price_period,
            price_vwap,
            base_volume: b.base_volume,
            quote_volume: b.quote_volume,
            pool_count: b.pools.len() as i32,
            swap_count: b.swap_count,
        });
    }

    Ok(results)
}

/// Combines `minute`'s own `(price_period, base_volume)` with the previous
/// four canonical minutes (whichever of them exist) into one volume-
/// weighted 5-minute trailing price. Falls back to `price_period` itself
/// when no prior minute is on record.
async fn trailing_vwap(
    shared: &SharedRepository,
    asset: &Address,
    denom: Denomination,
    minute: i64,
    price_period: f64,
    base_volume: f64,
) -> anyhow::Result<f64> {
    let prior_minutes: Vec<i64> = (1..=4).map(|i| minute - i * 60).collect();
    let prior = shared.get_price_vwap_range(asset, denom, &prior_minutes).await?;

    let mut weighted_price_sum = price_period * base_volume;
    let mut total_volume = base_volume;
    for prior_minute in prior_minutes {
        if let Some(p) = prior.get(&prior_minute) {
            weighted_price_sum += p.price_period * p.base_volume;
            total_volume += p.base_volume;
        }
    }

    Ok(if total_volume > 0.0 { volume_weighted_price(weighted_price_sum, total_volume) } else { price_period })
}

/// P4: fall back to the nearest prior canonical VWAP within `max_lookback`
/// minutes when no price exists for `minute` exactly. Returns `None`
/// (pricing gap, not an error) if nothing is found within the window.
pub async fn run_p4_global_fallback(
    shared: &SharedRepository,
    asset: &Address,
    denom: Denomination,
    minute: i64,
    max_lookback_minutes: i64,
) -> anyhow::Result<Option<PriceVwap>> {
    let minutes: Vec<i64> = (0..=max_lookback_minutes).map(|i| minute - i * 60).collect();
    let range = shared.get_price_vwap_range(asset, denom, &minutes).await?;

    Ok(minutes.into_iter().find_map(|m| range.get(&m).cloned()))
}

fn amount_to_f64(amount: &Amount) -> f64 {
    amount.to_f64().unwrap_or(0.0)
}

/// Converts a quote/base amount ratio into a price against `reference_price_usd`
/// -- the USD price of whatever the quote side is pegged or tied to (AVAX's
/// block price, or 1.0 for a USD stablecoin).
fn direct_reference_price(quote_amount_abs: f64, base_amount_abs: f64, reference_price_usd: f64) -> f64 {
    (quote_amount_abs / base_amount_abs) * reference_price_usd
}

/// Volume-weighted average price for a bucket: sum(price * volume) / volume.
fn volume_weighted_price(weighted_price_sum: f64, base_volume: f64) -> f64 {
    weighted_price_sum / base_volume
}

/// Volume-weighted average of `(price, volume)` pairs using
/// `price = sum(volume) / sum(volume / price)` -- aggregates several
/// already-priced swaps into one trade-level price.
fn trade_weighted_price(pairs: &[(f64, f64)]) -> Option<f64> {
    let total_volume: f64 = pairs.iter().map(|(_, volume)| volume).sum();
    if total_volume <= 0.0 {
        return None;
    }
    let sum_volume_over_price: f64 = pairs.iter().filter(|(price, _)| *price > 0.0).map(|(price, volume)| volume / price).sum();
    if sum_volume_over_price <= 0.0 {
        return None;
    }
    Some(total_volume / sum_volume_over_price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_reference_price_converts_quote_base_ratio_to_usd() {
        assert_eq!(direct_reference_price(5.0, 100.0, 1.0), 0.05);
        assert_eq!(direct_reference_price(10.0, 100.0, 20.0), 2.0);
    }

    #[test]
    fn volume_weighted_price_matches_worked_example() {
        let sum = 10.0 * 1.00 + 30.0 * 1.10;
        assert_eq!(volume_weighted_price(sum, 40.0), 1.075);
    }

    #[test]
    fn trade_weighted_price_single_swap_equals_its_price() {
        assert_eq!(trade_weighted_price(&[(1.5, 100.0)]), Some(1.5));
    }

    #[test]
    fn trade_weighted_price_combines_multiple_pools() {
        // two swaps, equal volume, different prices -> harmonic-style blend
        let price = trade_weighted_price(&[(1.0, 10.0), (1.1, 30.0)]).unwrap();
        assert!((price - 1.0732).abs() < 0.001);
    }

    #[test]
    fn trade_weighted_price_ignores_zero_total_volume() {
        assert_eq!(trade_weighted_price(&[(1.5, 0.0)]), None);
    }
}
