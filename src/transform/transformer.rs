//! The `Transformer` seam: one implementation per protocol family,
//! each turning a single decoded log into raw event fragments. Fragments
//! are aggregated into `Trade`/`Transfer`/`Liquidity`/`Reward`/`Position`
//! rows by `finalize_transaction` once every log in a transaction has been
//! transformed, since a trade can only be identified after seeing all of
//! its constituent swaps.
//!
//! Each protocol family is an `async-trait` object registered by name
//! (`Contract::transformer_name`) rather than matched on inline, so new
//! protocols are added without touching the dispatch path.

use async_trait::async_trait;
use num_bigint::BigInt;
use serde_json::Value;

use crate::db::shared::Contract;
use crate::decode::DecodedLog;
use crate::types::Address;

pub struct TransformContext<'a> {
    pub contract: &'a Contract,
    pub config: Option<&'a Value>,
}

/// One decoded log's worth of raw, unaggregated effect. `finalize_transaction`
/// groups `Swap` fragments into trades and passes the rest through largely
/// unchanged.
#[derive(Debug, Clone)]
pub enum RawTransform {
    Swap {
        pool: Address,
        taker: Address,
        token0: Address,
        amount0: BigInt,
        token1: Address,
        amount1: BigInt,
    },
    Transfer {
        token: Address,
        from: Address,
        to: Address,
        amount: BigInt,
    },
    Liquidity {
        pool: Address,
        provider: Address,
        is_add: bool,
        token0: Address,
        amount0: BigInt,
        token1: Address,
        amount1: BigInt,
    },
    Reward {
        recipient: Address,
        token: Address,
        amount: BigInt,
    },
    /// No domain-relevant effect; logged and dropped.
    Ignored,
}

#[async_trait]
pub trait Transformer: Send + Sync {
    /// Stable name a `Contract.transformer_name` column refers to.
    fn name(&self) -> &'static str;

    async fn transform(&self, ctx: &TransformContext<'_>, log: &DecodedLog) -> anyhow::Result<RawTransform>;
}

pub(crate) fn parse_amount(raw: &str) -> BigInt {
    // Decoded signed/unsigned ints render as plain decimal strings
    // (`decode::log_decoder::normalize_value`); a negative sign is the only
    // punctuation ever present.
    raw.parse::<BigInt>().unwrap_or_else(|_| BigInt::from(0))
}
