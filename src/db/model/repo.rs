//! Generic bulk-insert repository over `DomainRecord` types, plus the
//! `DomainEventWriter` that fans a transformed transaction's events and
//! positions out to their tables in one pass.
//!
//! A manual multi-row `VALUES (...)` batch-upsert idiom, generalised across
//! event kinds via `DomainRecord` instead of one hardcoded struct per insert
//! function.

use anyhow::Context;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use postgres_types::ToSql;

use crate::db::shared::Denomination;
use crate::types::{DomainEventId, Hash};

use super::analytics::{AssetPrice, AssetVolume};
use super::column::DomainRecord;
use super::details::{EventDetail, PoolSwapDetail, TradeDetail};
use super::events::{Liquidity, PoolSwap, Position, Reward, Trade, Transfer};
use super::processing::{BlockProcessing, TransactionProcessing};

/// Rows per `INSERT` statement. Keeps a single statement under Postgres'
/// bind-parameter ceiling even for the widest tables (`trade`, 13 columns).
const BATCH_SIZE: usize = 200;

#[derive(Clone)]
pub struct ModelRepository {
    pool: Pool,
}

/// One swap awaiting a price, as read back for the P2 direct-pricing phase.
#[derive(Debug, Clone)]
pub struct SwapForPricing {
    pub content_id: DomainEventId,
    pub pool: crate::types::Address,
    pub base_token: crate::types::Address,
    pub base_amount: num_bigint::BigInt,
    pub quote_token: crate::types::Address,
    pub quote_amount: num_bigint::BigInt,
    pub timestamp: DateTime<Utc>,
}

/// A transfer/liquidity/reward/position row awaiting an `EventDetail`
/// valuation, as read back for `calculate_event_valuations`.
#[derive(Debug, Clone)]
pub struct UnvaluedEvent {
    pub content_id: DomainEventId,
    pub timestamp: DateTime<Utc>,
    pub amount: num_bigint::BigInt,
}

/// One priced swap, as read back for the P3 VWAP-aggregation phase.
#[derive(Debug, Clone)]
pub struct VwapInput {
    pub base_token: crate::types::Address,
    pub pool: crate::types::Address,
    pub timestamp: DateTime<Utc>,
    pub base_price_usd: f64,
    pub base_amount: num_bigint::BigInt,
    pub volume_usd: f64,
}

/// One trade awaiting a volume-weighted roll-up of its constituent swaps'
/// prices, as read back for the P2 trade-pricing phase. Each tuple in
/// `swap_prices` is `(base_price_usd, quote_price_usd, volume_usd)` for one
/// already-priced `PoolSwap` belonging to the trade.
#[derive(Debug, Clone)]
pub struct TradeForPricing {
    pub content_id: DomainEventId,
    pub timestamp: DateTime<Utc>,
    pub swap_prices: Vec<(f64, f64, f64)>,
}

impl ModelRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Bulk-insert `records` into `table`, skipping rows whose `content_id`
    /// already exists. This is the idempotency mechanism: the unique index
    /// on `content_id` plus `DO NOTHING` makes re-processing a block a
    /// no-op rather than a duplicate.
    pub async fn bulk_create_skip_existing<T: DomainRecord>(&self, table: &str, records: &[T]) -> anyhow::Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let columns = T::column_names();
        let client = self.pool.get().await?;
        let mut total = 0u64;

        for chunk in records.chunks(BATCH_SIZE) {
            let mut placeholders = Vec::with_capacity(chunk.len());
            let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(chunk.len() * columns.len());
            let mut owned = Vec::with_capacity(chunk.len());
            for record in chunk {
                owned.push(record.columns());
            }
            let mut idx = 1usize;
            for row in &owned {
                let marks: Vec<String> = (0..row.len()).map(|_| {
                    let m = format!("${idx}");
                    idx += 1;
                    m
                }).collect();
                placeholders.push(format!("({})", marks.join(", ")));
            }
            for row in &owned {
                for value in row {
                    params.push(value);
                }
            }

            let sql = format!(
                "INSERT INTO {table} ({cols}) VALUES {values} ON CONFLICT (content_id) DO NOTHING",
                table = table,
                cols = columns.join(", "),
                values = placeholders.join(", "),
            );

            let affected = client.execute(sql.as_str(), &params[..]).await.context("bulk_create_skip_existing")?;
            total += affected;
        }

        Ok(total)
    }

    pub async fn mark_block_processed(&self, block: &BlockProcessing) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO block_processing (block_number, block_hash, timestamp, transaction_count, processed_at) \
                 VALUES ($1, $2, $3, $4, $5) ON CONFLICT (block_number) DO UPDATE SET \
                   transaction_count = EXCLUDED.transaction_count, processed_at = EXCLUDED.processed_at",
                &[&block.block_number, &block.block_hash.as_str(), &block.timestamp, &block.transaction_count, &block.processed_at],
            )
            .await
            .context("mark_block_processed")?;
        Ok(())
    }

    pub async fn mark_transaction_processed(&self, tx: &TransactionProcessing) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO transaction_processing (tx_hash, block_number, success, event_count, error, processed_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (tx_hash) DO UPDATE SET \
                   success = EXCLUDED.success, event_count = EXCLUDED.event_count, \
                   error = EXCLUDED.error, processed_at = EXCLUDED.processed_at",
                &[&tx.tx_hash.as_str(), &tx.block_number, &tx.success, &tx.event_count, &tx.error, &tx.processed_at],
            )
            .await
            .context("mark_transaction_processed")?;
        Ok(())
    }

    pub async fn last_processed_block(&self) -> anyhow::Result<Option<i64>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT max(block_number) FROM block_processing", &[])
            .await
            .context("last_processed_block")?;
        Ok(row.and_then(|r| r.get::<_, Option<i64>>(0)))
    }

    /// Block numbers in `[start, end]` with no `block_processing` row,
    /// used by the `missing` CLI mode to find gaps left by a crashed run
    /// whose jobs never got queued in the first place.
    pub async fn missing_blocks(&self, start: i64, end: i64) -> anyhow::Result<Vec<i64>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT g.block_number FROM generate_series($1::bigint, $2::bigint) AS g(block_number) \
                 LEFT JOIN block_processing b ON b.block_number = g.block_number \
                 WHERE b.block_number IS NULL ORDER BY g.block_number",
                &[&start, &end],
            )
            .await
            .context("missing_blocks")?;
        Ok(rows.into_iter().map(|r| r.get(0)).collect())
    }

    /// Swaps with no corresponding `poolswap_detail` row yet for `denom` --
    /// P2's input queue. Ordered oldest-first so pricing makes forward
    /// progress even if it's interrupted mid-run.
    pub async fn swaps_missing_price(&self, denom: Denomination, limit: i64) -> anyhow::Result<Vec<SwapForPricing>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT s.content_id, s.pool, s.base_token, s.base_amount::text, s.quote_token, s.quote_amount::text, s.timestamp \
                 FROM poolswap s \
                 LEFT JOIN poolswap_detail d ON d.poolswap_id = s.content_id AND d.denomination = $1 \
                 WHERE d.content_id IS NULL \
                 ORDER BY s.timestamp ASC LIMIT $2",
                &[&denom.as_str(), &limit],
            )
            .await
            .context("swaps_missing_price")?;

        Ok(rows
            .into_iter()
            .map(|r| SwapForPricing {
                content_id: DomainEventId(r.get(0)),
                pool: crate::types::Address::new(r.get(1)),
                base_token: crate::types::Address::new(r.get(2)),
                base_amount: r.get::<_, String>(3).parse().unwrap_or_default(),
                quote_token: crate::types::Address::new(r.get(4)),
                quote_amount: r.get::<_, String>(5).parse().unwrap_or_default(),
                timestamp: r.get(6),
            })
            .collect())
    }

    /// Trades with no corresponding `trade_detail` row yet for `denom`
    /// whose constituent swaps are all already priced -- P2's trade-level
    /// input queue. A trade with any still-unpriced swap is skipped until
    /// the next run, since its volume-weighted price would be incomplete.
    pub async fn trades_missing_price(&self, denom: Denomination, limit: i64) -> anyhow::Result<Vec<TradeForPricing>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT t.content_id, t.timestamp \
                 FROM trade t \
                 LEFT JOIN trade_detail td ON td.trade_id = t.content_id AND td.denomination = $1 \
                 WHERE td.content_id IS NULL \
                 ORDER BY t.timestamp ASC LIMIT $2",
                &[&denom.as_str(), &limit],
            )
            .await
            .context("trades_missing_price")?;

        let mut trades = Vec::with_capacity(rows.len());
        for row in rows {
            let content_id = DomainEventId(row.get(0));
            let timestamp: DateTime<Utc> = row.get(1);

            let swap_rows = client
                .query(
                    "SELECT d.base_price_usd::text, d.quote_price_usd::text, d.volume_usd::text \
                     FROM poolswap_detail d \
                     JOIN poolswap s ON s.content_id = d.poolswap_id \
                     WHERE s.trade_id = $1 AND d.denomination = $2",
                    &[&content_id.as_str(), &denom.as_str()],
                )
                .await
                .context("trades_missing_price: constituent swaps")?;

            if swap_rows.is_empty() {
                continue;
            }
            let swap_prices: Vec<(f64, f64, f64)> = swap_rows
                .into_iter()
                .map(|r| {
                    (
                        r.get::<_, String>(0).parse().unwrap_or(0.0),
                        r.get::<_, String>(1).parse().unwrap_or(0.0),
                        r.get::<_, String>(2).parse().unwrap_or(0.0),
                    )
                })
                .collect();

            trades.push(TradeForPricing { content_id, timestamp, swap_prices });
        }

        Ok(trades)
    }

    /// Priced swaps in `[since, now)` for `denom`, the raw input to P3's
    /// per-minute VWAP aggregation.
    pub async fn vwap_inputs(&self, denom: Denomination, since: DateTime<Utc>) -> anyhow::Result<Vec<VwapInput>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT s.base_token, s.pool, d.timestamp, d.base_price_usd::text, \
                        s.base_amount::text, d.volume_usd::text \
                 FROM poolswap_detail d \
                 JOIN poolswap s ON s.content_id = d.poolswap_id \
                 WHERE d.denomination = $1 AND d.timestamp >= $2",
                &[&denom.as_str(), &since],
            )
            .await
            .context("vwap_inputs")?;

        Ok(rows
            .into_iter()
            .map(|r| VwapInput {
                base_token: crate::types::Address::new(r.get(0)),
                pool: crate::types::Address::new(r.get(1)),
                timestamp: r.get(2),
                base_price_usd: r.get::<_, String>(3).parse().unwrap_or(0.0),
                base_amount: r.get::<_, String>(4).parse().unwrap_or_default(),
                volume_usd: r.get::<_, String>(5).parse().unwrap_or(0.0),
            })
            .collect())
    }

    /// Transfers of `asset` since `since` that have no `event_detail` row
    /// yet -- CalculationService's input queue for `calculate_event_valuations`.
    pub async fn unvalued_transfers(&self, asset: &crate::types::Address, since: DateTime<Utc>) -> anyhow::Result<Vec<UnvaluedEvent>> {
        self.unvalued_events_single_token("transfer", "token", "amount", asset, since).await
    }

    pub async fn unvalued_rewards(&self, asset: &crate::types::Address, since: DateTime<Utc>) -> anyhow::Result<Vec<UnvaluedEvent>> {
        self.unvalued_events_single_token("reward", "token", "amount", asset, since).await
    }

    pub async fn unvalued_positions(&self, asset: &crate::types::Address, since: DateTime<Utc>) -> anyhow::Result<Vec<UnvaluedEvent>> {
        self.unvalued_events_single_token("position", "token", "amount", asset, since).await
    }

    async fn unvalued_events_single_token(
        &self,
        table: &str,
        token_col: &str,
        amount_col: &str,
        asset: &crate::types::Address,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<UnvaluedEvent>> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT e.content_id, e.timestamp, e.{amount_col}::text \
             FROM {table} e \
             LEFT JOIN event_detail d ON d.event_id = e.content_id AND d.event_type = '{table}' \
             WHERE e.{token_col} = $1 AND e.timestamp >= $2 AND d.content_id IS NULL \
             ORDER BY e.timestamp ASC"
        );
        let rows = client.query(sql.as_str(), &[&asset.as_str(), &since]).await.context("unvalued_events_single_token")?;
        Ok(rows
            .into_iter()
            .map(|r| UnvaluedEvent {
                content_id: DomainEventId(r.get(0)),
                timestamp: r.get(1),
                amount: r.get::<_, String>(2).parse().unwrap_or_default(),
            })
            .collect())
    }

    /// Liquidity events touching `asset` on either side, since `since`,
    /// without an `event_detail` row yet.
    pub async fn unvalued_liquidity(&self, asset: &crate::types::Address, since: DateTime<Utc>) -> anyhow::Result<Vec<UnvaluedEvent>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT e.content_id, e.timestamp, \
                        CASE WHEN e.token0 = $1 THEN e.amount0 ELSE e.amount1 END::text \
                 FROM liquidity e \
                 LEFT JOIN event_detail d ON d.event_id = e.content_id AND d.event_type = 'liquidity' \
                 WHERE (e.token0 = $1 OR e.token1 = $1) AND e.timestamp >= $2 AND d.content_id IS NULL \
                 ORDER BY e.timestamp ASC",
                &[&asset.as_str(), &since],
            )
            .await
            .context("unvalued_liquidity")?;
        Ok(rows
            .into_iter()
            .map(|r| UnvaluedEvent {
                content_id: DomainEventId(r.get(0)),
                timestamp: r.get(1),
                amount: r.get::<_, String>(2).parse().unwrap_or_default(),
            })
            .collect())
    }

    /// Priced trades of `asset` since `since` for `denom`, oldest first --
    /// OHLC input.
    pub async fn trade_details_since(
        &self,
        asset: &crate::types::Address,
        denom: Denomination,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<(DateTime<Utc>, f64, f64)>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT d.timestamp, d.base_price_usd::text, d.volume_usd::text \
                 FROM trade_detail d \
                 JOIN trade t ON t.content_id = d.trade_id \
                 WHERE t.base_token = $1 AND d.denomination = $2 AND d.timestamp >= $3 \
                 ORDER BY d.timestamp ASC",
                &[&asset.as_str(), &denom.as_str(), &since],
            )
            .await
            .context("trade_details_since")?;
        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.get(0),
                    r.get::<_, String>(1).parse().unwrap_or(0.0),
                    r.get::<_, String>(2).parse().unwrap_or(0.0),
                )
            })
            .collect())
    }

    /// Per-pool priced swap volume of `asset` since `since` -- grouped by
    /// pool so CalculationService can roll it up by `Contract.project` in
    /// application code (project lives in the shared database).
    pub async fn pool_swap_volume_since(
        &self,
        asset: &crate::types::Address,
        denom: Denomination,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<(crate::types::Address, DateTime<Utc>, f64, i32)>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT s.pool, d.timestamp, d.volume_usd::text \
                 FROM poolswap_detail d \
                 JOIN poolswap s ON s.content_id = d.poolswap_id \
                 WHERE s.base_token = $1 AND d.denomination = $2 AND d.timestamp >= $3 \
                 ORDER BY d.timestamp ASC",
                &[&asset.as_str(), &denom.as_str(), &since],
            )
            .await
            .context("pool_swap_volume_since")?;
        Ok(rows
            .into_iter()
            .map(|r| (crate::types::Address::new(r.get(0)), r.get(1), r.get::<_, String>(2).parse().unwrap_or(0.0), 1))
            .collect())
    }

    pub async fn failed_transactions(&self) -> anyhow::Result<Vec<TransactionProcessing>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT tx_hash, block_number, success, event_count, error, processed_at \
                 FROM transaction_processing WHERE success = false ORDER BY block_number ASC",
                &[],
            )
            .await
            .context("failed_transactions")?;
        Ok(rows
            .into_iter()
            .map(|r| TransactionProcessing {
                tx_hash: Hash::new(r.get(0)),
                block_number: r.get(1),
                success: r.get(2),
                event_count: r.get(3),
                error: r.get(4),
                processed_at: r.get(5),
            })
            .collect())
    }
}

/// Everything a transformed transaction can produce, ready to be fanned
/// out to its tables in one call. `trades` already own their constituent
/// `PoolSwap`s; the writer is what flattens them into the `poolswap` table.
#[derive(Debug, Clone, Default)]
pub struct TransactionResult {
    pub trades: Vec<Trade>,
    pub transfers: Vec<Transfer>,
    pub liquidity: Vec<Liquidity>,
    pub rewards: Vec<Reward>,
    pub positions: Vec<Position>,
}

#[derive(Debug, Clone, Default)]
pub struct WriteSummary {
    pub trades_written: u64,
    pub swaps_written: u64,
    pub transfers_written: u64,
    pub liquidity_written: u64,
    pub rewards_written: u64,
    pub positions_written: u64,
}

/// Writes a transformed transaction's events to the model database,
/// idempotently, and marks the transaction processed. Pricing details
/// (`PoolSwapDetail`/`TradeDetail`/`EventDetail`) are written separately
/// by the pricing services once a price is available -- the writer never
/// blocks on pricing.
pub struct DomainEventWriter {
    repo: ModelRepository,
}

impl DomainEventWriter {
    pub fn new(repo: ModelRepository) -> Self {
        Self { repo }
    }

    pub async fn write_transaction_results(
        &self,
        tx_hash: &Hash,
        block_number: i64,
        timestamp: DateTime<Utc>,
        result: &TransactionResult,
        tx_success: bool,
    ) -> anyhow::Result<WriteSummary> {
        let mut swaps: Vec<PoolSwap> = Vec::new();
        for trade in &result.trades {
            swaps.extend(trade.swaps.iter().cloned());
        }

        let trades_written = self.repo.bulk_create_skip_existing("trade", &result.trades).await?;
        let swaps_written = self.repo.bulk_create_skip_existing("poolswap", &swaps).await?;
        let transfers_written = self.repo.bulk_create_skip_existing("transfer", &result.transfers).await?;
        let liquidity_written = self.repo.bulk_create_skip_existing("liquidity", &result.liquidity).await?;
        let rewards_written = self.repo.bulk_create_skip_existing("reward", &result.rewards).await?;
        let positions_written = self.repo.bulk_create_skip_existing("position", &result.positions).await?;

        let event_count = (trades_written
            + swaps_written
            + transfers_written
            + liquidity_written
            + rewards_written
            + positions_written) as i32;

        self.repo
            .mark_transaction_processed(&TransactionProcessing {
                tx_hash: tx_hash.clone(),
                block_number,
                success: tx_success,
                event_count,
                error: None,
                processed_at: timestamp,
            })
            .await?;

        Ok(WriteSummary {
            trades_written,
            swaps_written,
            transfers_written,
            liquidity_written,
            rewards_written,
            positions_written,
        })
    }

    pub async fn write_poolswap_details(&self, details: &[PoolSwapDetail]) -> anyhow::Result<u64> {
        self.repo.bulk_create_skip_existing("poolswap_detail", details).await
    }

    pub async fn write_trade_details(&self, details: &[TradeDetail]) -> anyhow::Result<u64> {
        self.repo.bulk_create_skip_existing("trade_detail", details).await
    }

    pub async fn write_event_details(&self, details: &[EventDetail]) -> anyhow::Result<u64> {
        self.repo.bulk_create_skip_existing("event_detail", details).await
    }

    pub async fn write_asset_prices(&self, prices: &[AssetPrice]) -> anyhow::Result<u64> {
        self.repo.bulk_create_skip_existing("asset_price", prices).await
    }

    pub async fn write_asset_volumes(&self, volumes: &[AssetVolume]) -> anyhow::Result<u64> {
        self.repo.bulk_create_skip_existing("asset_volume", volumes).await
    }

    pub fn repo(&self) -> &ModelRepository {
        &self.repo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::model::events::{Direction, TradeType};
    use num_bigint::BigInt;

    fn sample_trade(n: u32) -> Trade {
        Trade {
            content_id: DomainEventId::from_fields("trade", &[&n.to_string()]),
            tx_hash: Hash::new("0xabc"),
            block_number: 1,
            timestamp: Utc::now(),
            taker: crate::types::Address::new("0x1"),
            direction: Direction::Buy,
            base_token: crate::types::Address::new("0x2"),
            base_amount: BigInt::from(100),
            quote_token: crate::types::Address::new("0x3"),
            quote_amount: BigInt::from(200),
            trade_type: TradeType::User,
            swap_count: 1,
            transfer_count: 0,
            swaps: vec![],
        }
    }

    #[test]
    fn column_names_and_values_line_up() {
        let trade = sample_trade(1);
        assert_eq!(Trade::column_names().len(), trade.columns().len());
    }
}
