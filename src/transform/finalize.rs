//! Transaction-level finalisation: groups the raw per-log fragments
//! a transaction's `Transformer`s produced into `Trade`/`Transfer`/
//! `Liquidity`/`Reward` rows, deciding trade direction against each pool's
//! configured base token and classifying each resulting trade as `user` or
//! `arbitrage`.
//!
//! Arbitrage heuristic (Open Question 2, resolved): a trade is arbitrage
//! when its taker is a contract (has non-empty code, checked via
//! `CodeChecker`) *and* the taker's net base-token delta across every swap
//! it took in this transaction is zero -- it bought and sold the same base
//! token back to itself within one transaction, which a simple user-facing
//! swap never does.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

use crate::db::model::events::{Direction, LiquidityAction, TradeType};
use crate::db::model::repo::TransactionResult;
use crate::db::model::{Liquidity, Position, PoolSwap, Reward, Trade, Transfer};
use crate::types::{Address, DomainEventId, Hash};

use super::transformer::RawTransform;

#[async_trait]
pub trait CodeChecker: Send + Sync {
    async fn has_code(&self, address: &Address) -> anyhow::Result<bool>;
}

/// One log's transform output plus the log index it came from, needed for
/// a stable per-swap content id.
pub struct IndexedTransform {
    pub log_index: i64,
    pub transform: RawTransform,
}

fn classify_swap(
    token0: Address,
    amount0: BigInt,
    token1: Address,
    amount1: BigInt,
    base_token: Option<&Address>,
) -> (Address, BigInt, Address, BigInt) {
    let base_is_token1 = base_token.is_some_and(|b| *b == token1) && !base_token.is_some_and(|b| *b == token0);
    if base_is_token1 {
        (token1, amount1, token0, amount0)
    } else {
        (token0, amount0, token1, amount1)
    }
}

/// Finalises every transform a transaction's logs produced into domain
/// events. `base_tokens` maps each pool's address to its configured
/// `Contract.base_token_address` -- base/quote classification is decided
/// per pool, not per transaction, since two swaps in the same tx can
/// belong to pools with different base tokens.
pub async fn finalize_transaction(
    tx_hash: &Hash,
    block_number: i64,
    timestamp: DateTime<Utc>,
    base_tokens: &HashMap<Address, Address>,
    transforms: Vec<IndexedTransform>,
    code_checker: &dyn CodeChecker,
) -> anyhow::Result<TransactionResult> {
    let mut swaps: Vec<PoolSwap> = Vec::new();
    let mut transfers: Vec<Transfer> = Vec::new();
    let mut liquidity: Vec<Liquidity> = Vec::new();
    let mut rewards: Vec<Reward> = Vec::new();

    for item in transforms {
        match item.transform {
            RawTransform::Swap { pool, taker, token0, amount0, token1, amount1 } => {
                let base_token = base_tokens.get(&pool);
                let (base, base_amount, quote, quote_amount) = classify_swap(token0, amount0, token1, amount1, base_token);
                let direction = if base_amount.is_negative() { Direction::Buy } else { Direction::Sell };
                let content_id = DomainEventId::from_fields(
                    "poolswap",
                    &[tx_hash.as_str(), &item.log_index.to_string()],
                );
                swaps.push(PoolSwap {
                    content_id,
                    tx_hash: tx_hash.clone(),
                    block_number,
                    timestamp,
                    pool,
                    taker,
                    direction,
                    base_token: base,
                    base_amount,
                    quote_token: quote,
                    quote_amount,
                    trade_id: None,
                });
            }
            RawTransform::Transfer { token, from, to, amount } => {
                let content_id = DomainEventId::from_fields(
                    "transfer",
                    &[tx_hash.as_str(), &item.log_index.to_string()],
                );
                transfers.push(Transfer { content_id, tx_hash: tx_hash.clone(), block_number, timestamp, token, from, to, amount });
            }
            RawTransform::Liquidity { pool, provider, is_add, token0, amount0, token1, amount1 } => {
                let content_id = DomainEventId::from_fields(
                    "liquidity",
                    &[tx_hash.as_str(), &item.log_index.to_string()],
                );
                liquidity.push(Liquidity {
                    content_id,
                    tx_hash: tx_hash.clone(),
                    block_number,
                    timestamp,
                    pool,
                    provider,
                    action: if is_add { LiquidityAction::Add } else { LiquidityAction::Remove },
                    token0,
                    amount0,
                    token1,
                    amount1,
                });
            }
            RawTransform::Reward { recipient, token, amount } => {
                let content_id = DomainEventId::from_fields(
                    "reward",
                    &[tx_hash.as_str(), &item.log_index.to_string()],
                );
                rewards.push(Reward { content_id, tx_hash: tx_hash.clone(), block_number, timestamp, recipient, token, amount });
            }
            RawTransform::Ignored => {}
        }
    }

    let trades = group_into_trades(tx_hash, block_number, timestamp, &mut swaps, code_checker).await?;
    let positions = derive_positions(tx_hash, block_number, timestamp, &liquidity, &rewards);

    Ok(TransactionResult { trades, transfers, liquidity, rewards, positions })
}

/// Derives one `Position` per balance-changing token leg of this
/// transaction's liquidity and reward events. A liquidity event moves two
/// token balances (signed by add/remove); a reward moves one, credited to
/// the recipient against no pool.
fn derive_positions(tx_hash: &Hash, block_number: i64, timestamp: DateTime<Utc>, liquidity: &[Liquidity], rewards: &[Reward]) -> Vec<Position> {
    let mut positions = Vec::with_capacity(liquidity.len() * 2 + rewards.len());

    for lq in liquidity {
        let sign = match lq.action {
            LiquidityAction::Add => BigInt::from(1),
            LiquidityAction::Remove => BigInt::from(-1),
        };
        for (leg, token, amount) in [(0, &lq.token0, &lq.amount0), (1, &lq.token1, &lq.amount1)] {
            positions.push(Position {
                content_id: DomainEventId::from_fields("position", &[tx_hash.as_str(), lq.content_id.as_str(), &leg.to_string()]),
                tx_hash: tx_hash.clone(),
                block_number,
                timestamp,
                owner: lq.provider.clone(),
                pool: lq.pool.clone(),
                token: token.clone(),
                amount: amount * &sign,
                parent_id: Some(lq.content_id.clone()),
                parent_type: Some("liquidity".to_string()),
            });
        }
    }

    for reward in rewards {
        positions.push(Position {
            content_id: DomainEventId::from_fields("position", &[tx_hash.as_str(), reward.content_id.as_str()]),
            tx_hash: tx_hash.clone(),
            block_number,
            timestamp,
            owner: reward.recipient.clone(),
            pool: Address::zero(),
            token: reward.token.clone(),
            amount: reward.amount.clone(),
            parent_id: Some(reward.content_id.clone()),
            parent_type: Some("reward".to_string()),
        });
    }

    positions
}

async fn group_into_trades(
    tx_hash: &Hash,
    block_number: i64,
    timestamp: DateTime<Utc>,
    swaps: &mut [PoolSwap],
    code_checker: &dyn CodeChecker,
) -> anyhow::Result<Vec<Trade>> {
    let mut groups: HashMap<(Address, Address, Address), Vec<usize>> = HashMap::new();
    for (idx, swap) in swaps.iter().enumerate() {
        groups
            .entry((swap.taker.clone(), swap.base_token.clone(), swap.quote_token.clone()))
            .or_default()
            .push(idx);
    }

    let mut trades = Vec::with_capacity(groups.len());
    for ((taker, base_token, quote_token), indices) in groups {
        let mut base_sum = BigInt::zero();
        let mut quote_sum = BigInt::zero();
        let mut transfer_count = 0i32;
        for &idx in &indices {
            base_sum += &swaps[idx].base_amount;
            quote_sum += &swaps[idx].quote_amount;
            transfer_count += 2; // each swap implies at least a base + quote leg
        }

        let has_code = code_checker.has_code(&taker).await.unwrap_or(false);
        let trade_type = if has_code && base_sum.is_zero() { TradeType::Arbitrage } else { TradeType::User };
        let direction = if base_sum.is_negative() || base_sum.is_zero() { Direction::Buy } else { Direction::Sell };

        let content_id = DomainEventId::from_fields(
            "trade",
            &[tx_hash.as_str(), taker.as_str(), base_token.as_str(), quote_token.as_str()],
        );

        for &idx in &indices {
            swaps[idx].trade_id = Some(content_id.clone());
        }

        trades.push(Trade {
            content_id,
            tx_hash: tx_hash.clone(),
            block_number,
            timestamp,
            taker,
            direction,
            base_token,
            base_amount: base_sum,
            quote_token,
            quote_amount: quote_sum,
            trade_type,
            swap_count: indices.len() as i32,
            transfer_count,
            swaps: indices.iter().map(|&i| swaps[i].clone()).collect(),
        });
    }

    Ok(trades)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysContract;

    #[async_trait]
    impl CodeChecker for AlwaysContract {
        async fn has_code(&self, _address: &Address) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    struct NeverContract;

    #[async_trait]
    impl CodeChecker for NeverContract {
        async fn has_code(&self, _address: &Address) -> anyhow::Result<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn zero_net_delta_with_contract_code_is_arbitrage() {
        let tx_hash = Hash::new("0xabc");
        let base = Address::new("0xbase");
        let quote = Address::new("0xquote");
        let pool1 = Address::new("0xpool1");
        let pool2 = Address::new("0xpool2");
        let transforms = vec![
            IndexedTransform {
                log_index: 0,
                transform: RawTransform::Swap {
                    pool: pool1.clone(),
                    taker: Address::new("0xtaker"),
                    token0: base.clone(),
                    amount0: BigInt::from(-100),
                    token1: quote.clone(),
                    amount1: BigInt::from(200),
                },
            },
            IndexedTransform {
                log_index: 1,
                transform: RawTransform::Swap {
                    pool: pool2.clone(),
                    taker: Address::new("0xtaker"),
                    token0: base.clone(),
                    amount0: BigInt::from(100),
                    token1: quote.clone(),
                    amount1: BigInt::from(-195),
                },
            },
        ];

        let base_tokens = HashMap::from([(pool1, base.clone()), (pool2, base.clone())]);
        let result = finalize_transaction(&tx_hash, 1, Utc::now(), &base_tokens, transforms, &AlwaysContract)
            .await
            .unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].trade_type, TradeType::Arbitrage);
    }

    #[tokio::test]
    async fn eoa_taker_is_never_arbitrage() {
        let tx_hash = Hash::new("0xdef");
        let base = Address::new("0xbase");
        let quote = Address::new("0xquote");
        let pool1 = Address::new("0xpool1");
        let transforms = vec![IndexedTransform {
            log_index: 0,
            transform: RawTransform::Swap {
                pool: pool1.clone(),
                taker: Address::new("0xuser"),
                token0: base.clone(),
                amount0: BigInt::from(-50),
                token1: quote.clone(),
                amount1: BigInt::from(100),
            },
        }];

        let base_tokens = HashMap::from([(pool1, base.clone())]);
        let result = finalize_transaction(&tx_hash, 1, Utc::now(), &base_tokens, transforms, &NeverContract)
            .await
            .unwrap();

        assert_eq!(result.trades[0].trade_type, TradeType::User);
    }

    #[tokio::test]
    async fn liquidity_add_produces_positive_positions_for_both_legs() {
        let tx_hash = Hash::new("0x1");
        let token0 = Address::new("0xtoken0");
        let token1 = Address::new("0xtoken1");
        let transforms = vec![IndexedTransform {
            log_index: 0,
            transform: RawTransform::Liquidity {
                pool: Address::new("0xpool"),
                provider: Address::new("0xprovider"),
                is_add: true,
                token0: token0.clone(),
                amount0: BigInt::from(100),
                token1: token1.clone(),
                amount1: BigInt::from(200),
            },
        }];

        let result = finalize_transaction(&tx_hash, 1, Utc::now(), &HashMap::new(), transforms, &NeverContract)
            .await
            .unwrap();

        assert_eq!(result.positions.len(), 2);
        assert_eq!(result.positions[0].amount, BigInt::from(100));
        assert_eq!(result.positions[1].amount, BigInt::from(200));
        assert_eq!(result.positions[0].parent_type.as_deref(), Some("liquidity"));
    }

    #[tokio::test]
    async fn liquidity_remove_produces_negative_positions() {
        let tx_hash = Hash::new("0x2");
        let transforms = vec![IndexedTransform {
            log_index: 0,
            transform: RawTransform::Liquidity {
                pool: Address::new("0xpool"),
                provider: Address::new("0xprovider"),
                is_add: false,
                token0: Address::new("0xtoken0"),
                amount0: BigInt::from(50),
                token1: Address::new("0xtoken1"),
                amount1: BigInt::from(75),
            },
        }];

        let result = finalize_transaction(&tx_hash, 1, Utc::now(), &HashMap::new(), transforms, &NeverContract)
            .await
            .unwrap();

        assert_eq!(result.positions[0].amount, BigInt::from(-50));
        assert_eq!(result.positions[1].amount, BigInt::from(-75));
    }

    #[tokio::test]
    async fn reward_produces_a_position_against_no_pool() {
        let tx_hash = Hash::new("0x3");
        let transforms = vec![IndexedTransform {
            log_index: 0,
            transform: RawTransform::Reward {
                recipient: Address::new("0xrecipient"),
                token: Address::new("0xtoken"),
                amount: BigInt::from(42),
            },
        }];

        let result = finalize_transaction(&tx_hash, 1, Utc::now(), &HashMap::new(), transforms, &NeverContract)
            .await
            .unwrap();

        assert_eq!(result.positions.len(), 1);
        assert_eq!(result.positions[0].owner, Address::new("0xrecipient"));
        assert_eq!(result.positions[0].pool, Address::zero());
        assert_eq!(result.positions[0].parent_type.as_deref(), Some("reward"));
    }
}
