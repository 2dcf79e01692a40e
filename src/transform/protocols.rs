//! Concrete `Transformer` implementations, one per protocol family.
//! Parameter names match each protocol's event ABI, read dynamically off
//! the decoded log rather than through a generated binding struct.

use async_trait::async_trait;
use num_bigint::BigInt;

use crate::decode::DecodedLog;
use crate::types::Address;

use super::transformer::{parse_amount, RawTransform, TransformContext, Transformer};

/// Uniswap V2-style pools: `Swap(sender, amount0In, amount1Out, amount0Out, amount1In, to)`.
pub struct UniswapV2Transformer;

#[async_trait]
impl Transformer for UniswapV2Transformer {
    fn name(&self) -> &'static str {
        "uniswap_v2"
    }

    async fn transform(&self, ctx: &TransformContext<'_>, log: &DecodedLog) -> anyhow::Result<RawTransform> {
        if log.event_name != "Swap" {
            return Ok(RawTransform::Ignored);
        }
        let token0 = ctx.contract.base_token_address.clone().unwrap_or_else(Address::zero);
        let token1 = Address::zero();

        let amount0_in = parse_amount(log.get("amount0In").unwrap_or("0"));
        let amount1_out = parse_amount(log.get("amount1Out").unwrap_or("0"));
        let amount1_in = parse_amount(log.get("amount1In").unwrap_or("0"));
        let amount0_out = parse_amount(log.get("amount0Out").unwrap_or("0"));

        let amount0: BigInt = amount0_in - amount0_out;
        let amount1: BigInt = amount1_in - amount1_out;

        let taker = log
            .get("to")
            .map(Address::new)
            .or_else(|| log.get("sender").map(Address::new))
            .unwrap_or_else(Address::zero);

        Ok(RawTransform::Swap { pool: log.address.clone(), taker, token0, amount0, token1, amount1 })
    }
}

/// Uniswap V3/V4-style pools: `Swap(sender, recipient, amount0, amount1, sqrtPriceX96, liquidity, tick)`,
/// where `amount0`/`amount1` are signed (positive = into the pool).
pub struct UniswapV3Transformer;

#[async_trait]
impl Transformer for UniswapV3Transformer {
    fn name(&self) -> &'static str {
        "uniswap_v3"
    }

    async fn transform(&self, ctx: &TransformContext<'_>, log: &DecodedLog) -> anyhow::Result<RawTransform> {
        if log.event_name != "Swap" {
            return Ok(RawTransform::Ignored);
        }
        let token0 = ctx.contract.base_token_address.clone().unwrap_or_else(Address::zero);
        let token1 = Address::zero();

        let amount0 = parse_amount(log.get("amount0").unwrap_or("0"));
        let amount1 = parse_amount(log.get("amount1").unwrap_or("0"));

        let taker = log.get("recipient").map(Address::new).unwrap_or_else(Address::zero);

        Ok(RawTransform::Swap { pool: log.address.clone(), taker, token0, amount0, token1, amount1 })
    }
}

/// Plain ERC-20 `Transfer(from, to, value)`.
pub struct Erc20TransferTransformer;

#[async_trait]
impl Transformer for Erc20TransferTransformer {
    fn name(&self) -> &'static str {
        "erc20_transfer"
    }

    async fn transform(&self, _ctx: &TransformContext<'_>, log: &DecodedLog) -> anyhow::Result<RawTransform> {
        if log.event_name != "Transfer" {
            return Ok(RawTransform::Ignored);
        }
        let from = log.get("from").map(Address::new).unwrap_or_else(Address::zero);
        let to = log.get("to").map(Address::new).unwrap_or_else(Address::zero);
        let amount = parse_amount(log.get("value").unwrap_or("0"));

        Ok(RawTransform::Transfer { token: log.address.clone(), from, to, amount })
    }
}

/// Uniswap V2/V3-style liquidity: `Mint`/`Burn(sender, amount0, amount1, ...)`.
pub struct LiquidityTransformer;

#[async_trait]
impl Transformer for LiquidityTransformer {
    fn name(&self) -> &'static str {
        "liquidity"
    }

    async fn transform(&self, ctx: &TransformContext<'_>, log: &DecodedLog) -> anyhow::Result<RawTransform> {
        let is_add = match log.event_name.as_str() {
            "Mint" => true,
            "Burn" => false,
            _ => return Ok(RawTransform::Ignored),
        };
        let token0 = ctx.contract.base_token_address.clone().unwrap_or_else(Address::zero);
        let token1 = Address::zero();
        let amount0 = parse_amount(log.get("amount0").unwrap_or("0"));
        let amount1 = parse_amount(log.get("amount1").unwrap_or("0"));
        let provider = log
            .get("owner")
            .or_else(|| log.get("sender"))
            .map(Address::new)
            .unwrap_or_else(Address::zero);

        Ok(RawTransform::Liquidity { pool: log.address.clone(), provider, is_add, token0, amount0, token1, amount1 })
    }
}
