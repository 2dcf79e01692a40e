//! Repository methods over the shared (infra) database.
//!
//! `get_*` reads, `set_*`/`upsert_*` writes, manual multi-row `VALUES`
//! construction for bulk paths, rather than an ORM.

use std::collections::HashMap;

use anyhow::Context;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use log::warn;

use crate::types::Address;

use super::models::{BlockPrice, Contract, Denomination, Model, Period, PeriodType, PriceVwap, Source, Token};

#[derive(Clone)]
pub struct SharedRepository {
    pub pool: Pool,
}

impl SharedRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub async fn get_model(&self, name: &str) -> anyhow::Result<Option<Model>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT name, version, model_db_name, model_token_address, status \
                 FROM model WHERE name = $1",
                &[&name],
            )
            .await
            .context("get_model")?;
        Ok(row.map(|r| Model {
            name: r.get(0),
            version: r.get(1),
            model_db_name: r.get(2),
            model_token_address: Address::new(r.get(3)),
            status: r.get(4),
        }))
    }

    pub async fn get_contracts_for_model(&self, model_name: &str) -> anyhow::Result<Vec<Contract>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT c.address, c.name, c.project, c.type, c.abi_dir, c.abi_file, \
                        c.transformer_name, c.transformer_config, c.base_token_address \
                 FROM contract c \
                 JOIN model_contract mc ON mc.contract_address = c.address \
                 JOIN model m ON m.name = mc.model_name \
                 WHERE m.name = $1",
                &[&model_name],
            )
            .await
            .context("get_contracts_for_model")?;

        Ok(rows
            .into_iter()
            .map(|r| Contract {
                address: Address::new(r.get(0)),
                name: r.get(1),
                project: r.get(2),
                contract_type: r.get(3),
                abi_dir: r.get(4),
                abi_file: r.get(5),
                transformer_name: r.get(6),
                transformer_config: r.get::<_, Option<serde_json::Value>>(7),
                base_token_address: r.get::<_, Option<String>>(8).map(|s| Address::new(&s)),
            })
            .collect())
    }

    pub async fn get_tracked_tokens(&self, model_name: &str) -> anyhow::Result<Vec<Token>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT t.address, t.type, t.symbol, t.name, t.decimals, t.project \
                 FROM token t \
                 JOIN model_token mt ON mt.token_address = t.address \
                 WHERE mt.model_name = $1",
                &[&model_name],
            )
            .await
            .context("get_tracked_tokens")?;

        Ok(rows
            .into_iter()
            .map(|r| Token {
                address: Address::new(r.get(0)),
                token_type: r.get(1),
                symbol: r.get(2),
                name: r.get(3),
                decimals: r.get::<_, i16>(4) as u8,
                project: r.get(5),
            })
            .collect())
    }

    pub async fn get_sources_for_model(&self, model_name: &str) -> anyhow::Result<Vec<Source>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT s.name, s.path, s.format FROM source s \
                 JOIN model_source ms ON ms.source_name = s.name \
                 WHERE ms.model_name = $1",
                &[&model_name],
            )
            .await
            .context("get_sources_for_model")?;
        Ok(rows.into_iter().map(|r| Source { name: r.get(0), path: r.get(1), format: r.get(2) }).collect())
    }

    pub async fn get_pricing_pools(&self, model_id: &str, asset: &Address) -> anyhow::Result<Vec<Address>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT ppc.contract_id FROM pool_pricing_config ppc \
                 JOIN contract c ON c.address = ppc.contract_id \
                 WHERE ppc.model_id = $1 AND ppc.pricing_pool = true \
                   AND c.base_token_address = $2 \
                   AND ppc.valid_from <= now() AND (ppc.valid_to IS NULL OR ppc.valid_to > now())",
                &[&model_id, &asset.as_str()],
            )
            .await
            .context("get_pricing_pools")?;
        Ok(rows.into_iter().map(|r| Address::new(r.get(0))).collect())
    }

    pub async fn last_period(&self, period_type: PeriodType) -> anyhow::Result<Option<Period>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT period_type, time_open, time_close, block_open, block_close, is_complete \
                 FROM period WHERE period_type = $1 ORDER BY time_open DESC LIMIT 1",
                &[&period_type.as_str()],
            )
            .await
            .context("last_period")?;
        Ok(row.map(row_to_period))
    }

    pub async fn upsert_period(&self, period: &Period) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO period (period_type, time_open, time_close, block_open, block_close, is_complete) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (period_type, time_open) DO UPDATE SET \
                   time_close = EXCLUDED.time_close, block_close = EXCLUDED.block_close, \
                   is_complete = EXCLUDED.is_complete",
                &[
                    &period.period_type.as_str(),
                    &period.time_open,
                    &period.time_close,
                    &period.block_open,
                    &period.block_close,
                    &period.is_complete,
                ],
            )
            .await
            .context("upsert_period")?;
        Ok(())
    }

    /// Insert a block price, skipping silently if one already exists for
    /// this block (at most one row per block).
    pub async fn insert_block_price_skip_existing(&self, price: &BlockPrice) -> anyhow::Result<bool> {
        let client = self.pool.get().await?;
        let rows = client
            .execute(
                "INSERT INTO block_price (block_number, timestamp, price_usd, chainlink_round_id, chainlink_updated_at) \
                 VALUES ($1, $2, $3, $4, $5) ON CONFLICT (block_number) DO NOTHING",
                &[
                    &price.block_number,
                    &price.timestamp,
                    &price.price_usd,
                    &price.chainlink_round_id,
                    &price.chainlink_updated_at,
                ],
            )
            .await
            .context("insert_block_price_skip_existing")?;
        Ok(rows > 0)
    }

    pub async fn get_price_vwap(
        &self,
        asset: &Address,
        minute: i64,
        denom: Denomination,
    ) -> anyhow::Result<Option<PriceVwap>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT asset_address, timestamp_minute, denomination, price_period, price_vwap, \
                        base_volume, quote_volume, pool_count, swap_count \
                 FROM price_vwap WHERE asset_address = $1 AND timestamp_minute = $2 AND denomination = $3",
                &[&asset.as_str(), &minute, &denom.as_str()],
            )
            .await
            .context("get_price_vwap")?;
        Ok(row.map(row_to_price_vwap))
    }

    pub async fn get_price_vwap_range(
        &self,
        asset: &Address,
        denom: Denomination,
        minutes: &[i64],
    ) -> anyhow::Result<HashMap<i64, PriceVwap>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT asset_address, timestamp_minute, denomination, price_period, price_vwap, \
                        base_volume, quote_volume, pool_count, swap_count \
                 FROM price_vwap WHERE asset_address = $1 AND denomination = $2 \
                   AND timestamp_minute = ANY($3)",
                &[&asset.as_str(), &denom.as_str(), &minutes],
            )
            .await
            .context("get_price_vwap_range")?;
        Ok(rows.into_iter().map(row_to_price_vwap).map(|p| (p.timestamp_minute, p)).collect())
    }

    pub async fn upsert_price_vwap(&self, vwap: &PriceVwap) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO price_vwap (asset_address, timestamp_minute, denomination, price_period, \
                        price_vwap, base_volume, quote_volume, pool_count, swap_count) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 ON CONFLICT (asset_address, timestamp_minute, denomination) DO UPDATE SET \
                   price_period = EXCLUDED.price_period, price_vwap = EXCLUDED.price_vwap, \
                   base_volume = EXCLUDED.base_volume, quote_volume = EXCLUDED.quote_volume, \
                   pool_count = EXCLUDED.pool_count, swap_count = EXCLUDED.swap_count",
                &[
                    &vwap.asset_address.as_str(),
                    &vwap.timestamp_minute,
                    &vwap.denomination.as_str(),
                    &vwap.price_period,
                    &vwap.price_vwap,
                    &vwap.base_volume,
                    &vwap.quote_volume,
                    &vwap.pool_count,
                    &vwap.swap_count,
                ],
            )
            .await
            .context("upsert_price_vwap")?;
        Ok(())
    }
}

fn row_to_period(row: tokio_postgres::Row) -> Period {
    Period {
        period_type: PeriodType::from_str_opt(row.get(0)).unwrap_or(PeriodType::OneMin),
        time_open: row.get(1),
        time_close: row.get(2),
        block_open: row.get(3),
        block_close: row.get(4),
        is_complete: row.get(5),
    }
}

fn row_to_price_vwap(row: tokio_postgres::Row) -> PriceVwap {
    PriceVwap {
        asset_address: Address::new(row.get(0)),
        timestamp_minute: row.get(1),
        denomination: Denomination::from_str_opt(row.get(2)).unwrap_or(Denomination::Usd),
        price_period: row.get(3),
        price_vwap: row.get(4),
        base_volume: row.get(5),
        quote_volume: row.get(6),
        pool_count: row.get(7),
        swap_count: row.get(8),
    }
}

/// Fully materialised, immutable configuration snapshot for a model.
///
/// ConfigService's output: `Model` row, address-keyed contract map,
/// tracked-token set, and source list, validated at load time.
pub struct ModelConfig {
    pub model: Model,
    pub contracts: HashMap<Address, Contract>,
    pub tracked_tokens: std::collections::HashSet<Address>,
    pub sources: Vec<Source>,
}

impl SharedRepository {
    pub async fn load_model_config(&self, model_name: &str) -> anyhow::Result<ModelConfig> {
        let model = self
            .get_model(model_name)
            .await?
            .ok_or_else(|| crate::error::IndexerError::ConfigInvalid(format!("model '{model_name}' not found")))?;

        if !model.is_active() {
            return Err(crate::error::IndexerError::ConfigInvalid(format!(
                "model '{model_name}' is not active (status={})",
                model.status
            ))
            .into());
        }

        let contracts = self.get_contracts_for_model(model_name).await?;
        for c in &contracts {
            if c.abi_dir.is_empty() || c.abi_file.is_empty() {
                return Err(crate::error::IndexerError::ConfigInvalid(format!(
                    "contract {} has no resolvable ABI",
                    c.address
                ))
                .into());
            }
        }

        let tokens = self.get_tracked_tokens(model_name).await?;
        let tracked_tokens = tokens.iter().map(|t| t.address.clone()).collect();

        let sources = self.get_sources_for_model(model_name).await?;
        if sources.is_empty() {
            warn!("model '{model_name}' has no configured sources; BlockSource will rely on RPC only");
        }

        Ok(ModelConfig {
            model,
            contracts: contracts.into_iter().map(|c| (c.address.clone(), c)).collect(),
            tracked_tokens,
            sources,
        })
    }
}
