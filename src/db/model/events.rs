//! Domain event types (model DB): Trade, PoolSwap, Transfer, Liquidity,
//! Reward, Position.
//!
//! Every type carries `{content_id, tx_hash, block_number, timestamp}` as
//! its identifying header and implements `DomainRecord` explicitly rather
//! than via reflection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount, DomainEventId, Hash};

use super::column::{ColumnValue, DomainRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeType {
    User,
    Arbitrage,
}

impl TradeType {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeType::User => "user",
            TradeType::Arbitrage => "arbitrage",
        }
    }
}

/// One or more pool swaps within the same transaction, aggregated by taker.
#[derive(Debug, Clone)]
pub struct Trade {
    pub content_id: DomainEventId,
    pub tx_hash: Hash,
    pub block_number: i64,
    pub timestamp: DateTime<Utc>,
    pub taker: Address,
    pub direction: Direction,
    pub base_token: Address,
    pub base_amount: Amount,
    pub quote_token: Address,
    pub quote_amount: Amount,
    pub trade_type: TradeType,
    pub swap_count: i32,
    pub transfer_count: i32,
    /// Constituent swaps. The writer (`DomainEventWriter`) is the single
    /// place that flattens this into the `poolswap` group -- no other code
    /// should read `swaps` directly off a `Trade` once it leaves the
    /// transformer.
    pub swaps: Vec<PoolSwap>,
}

impl DomainRecord for Trade {
    fn content_id(&self) -> &DomainEventId {
        &self.content_id
    }

    fn column_names() -> &'static [&'static str] {
        &[
            "content_id", "tx_hash", "block_number", "timestamp", "taker", "direction",
            "base_token", "base_amount", "quote_token", "quote_amount", "trade_type",
            "swap_count", "transfer_count",
        ]
    }

    fn columns(&self) -> Vec<ColumnValue> {
        vec![
            ColumnValue::from(&self.content_id),
            ColumnValue::from(&self.tx_hash),
            ColumnValue::BigInt(self.block_number),
            ColumnValue::Timestamp(self.timestamp),
            ColumnValue::from(&self.taker),
            ColumnValue::Text(self.direction.as_str().to_string()),
            ColumnValue::from(&self.base_token),
            ColumnValue::Numeric(self.base_amount.to_string()),
            ColumnValue::from(&self.quote_token),
            ColumnValue::Numeric(self.quote_amount.to_string()),
            ColumnValue::Text(self.trade_type.as_str().to_string()),
            ColumnValue::Int(self.swap_count),
            ColumnValue::Int(self.transfer_count),
        ]
    }
}

/// A single pool-level swap; `trade_id` links back to its parent `Trade`.
#[derive(Debug, Clone)]
pub struct PoolSwap {
    pub content_id: DomainEventId,
    pub tx_hash: Hash,
    pub block_number: i64,
    pub timestamp: DateTime<Utc>,
    pub pool: Address,
    pub taker: Address,
    pub direction: Direction,
    pub base_token: Address,
    pub base_amount: Amount,
    pub quote_token: Address,
    pub quote_amount: Amount,
    pub trade_id: Option<DomainEventId>,
}

impl DomainRecord for PoolSwap {
    fn content_id(&self) -> &DomainEventId {
        &self.content_id
    }

    fn column_names() -> &'static [&'static str] {
        &[
            "content_id", "tx_hash", "block_number", "timestamp", "pool", "taker", "direction",
            "base_token", "base_amount", "quote_token", "quote_amount", "trade_id",
        ]
    }

    fn columns(&self) -> Vec<ColumnValue> {
        vec![
            ColumnValue::from(&self.content_id),
            ColumnValue::from(&self.tx_hash),
            ColumnValue::BigInt(self.block_number),
            ColumnValue::Timestamp(self.timestamp),
            ColumnValue::from(&self.pool),
            ColumnValue::from(&self.taker),
            ColumnValue::Text(self.direction.as_str().to_string()),
            ColumnValue::from(&self.base_token),
            ColumnValue::Numeric(self.base_amount.to_string()),
            ColumnValue::from(&self.quote_token),
            ColumnValue::Numeric(self.quote_amount.to_string()),
            ColumnValue::OptText(self.trade_id.as_ref().map(|id| id.as_str().to_string())),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct Transfer {
    pub content_id: DomainEventId,
    pub tx_hash: Hash,
    pub block_number: i64,
    pub timestamp: DateTime<Utc>,
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
}

impl DomainRecord for Transfer {
    fn content_id(&self) -> &DomainEventId {
        &self.content_id
    }

    fn column_names() -> &'static [&'static str] {
        &["content_id", "tx_hash", "block_number", "timestamp", "token", "from_address", "to_address", "amount"]
    }

    fn columns(&self) -> Vec<ColumnValue> {
        vec![
            ColumnValue::from(&self.content_id),
            ColumnValue::from(&self.tx_hash),
            ColumnValue::BigInt(self.block_number),
            ColumnValue::Timestamp(self.timestamp),
            ColumnValue::from(&self.token),
            ColumnValue::from(&self.from),
            ColumnValue::from(&self.to),
            ColumnValue::Numeric(self.amount.to_string()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidityAction {
    Add,
    Remove,
}

impl LiquidityAction {
    pub fn as_str(self) -> &'static str {
        match self {
            LiquidityAction::Add => "add",
            LiquidityAction::Remove => "remove",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Liquidity {
    pub content_id: DomainEventId,
    pub tx_hash: Hash,
    pub block_number: i64,
    pub timestamp: DateTime<Utc>,
    pub pool: Address,
    pub provider: Address,
    pub action: LiquidityAction,
    pub token0: Address,
    pub amount0: Amount,
    pub token1: Address,
    pub amount1: Amount,
}

impl DomainRecord for Liquidity {
    fn content_id(&self) -> &DomainEventId {
        &self.content_id
    }

    fn column_names() -> &'static [&'static str] {
        &[
            "content_id", "tx_hash", "block_number", "timestamp", "pool", "provider", "action",
            "token0", "amount0", "token1", "amount1",
        ]
    }

    fn columns(&self) -> Vec<ColumnValue> {
        vec![
            ColumnValue::from(&self.content_id),
            ColumnValue::from(&self.tx_hash),
            ColumnValue::BigInt(self.block_number),
            ColumnValue::Timestamp(self.timestamp),
            ColumnValue::from(&self.pool),
            ColumnValue::from(&self.provider),
            ColumnValue::Text(self.action.as_str().to_string()),
            ColumnValue::from(&self.token0),
            ColumnValue::Numeric(self.amount0.to_string()),
            ColumnValue::from(&self.token1),
            ColumnValue::Numeric(self.amount1.to_string()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct Reward {
    pub content_id: DomainEventId,
    pub tx_hash: Hash,
    pub block_number: i64,
    pub timestamp: DateTime<Utc>,
    pub recipient: Address,
    pub token: Address,
    pub amount: Amount,
}

impl DomainRecord for Reward {
    fn content_id(&self) -> &DomainEventId {
        &self.content_id
    }

    fn column_names() -> &'static [&'static str] {
        &["content_id", "tx_hash", "block_number", "timestamp", "recipient", "token", "amount"]
    }

    fn columns(&self) -> Vec<ColumnValue> {
        vec![
            ColumnValue::from(&self.content_id),
            ColumnValue::from(&self.tx_hash),
            ColumnValue::BigInt(self.block_number),
            ColumnValue::Timestamp(self.timestamp),
            ColumnValue::from(&self.recipient),
            ColumnValue::from(&self.token),
            ColumnValue::Numeric(self.amount.to_string()),
        ]
    }
}

/// A balance-changing position, never deleted once written. `parent_id`
/// references the event that caused the change by content id (opaque
/// value), not by in-memory pointer, so the graph has no cycles.
#[derive(Debug, Clone)]
pub struct Position {
    pub content_id: DomainEventId,
    pub tx_hash: Hash,
    pub block_number: i64,
    pub timestamp: DateTime<Utc>,
    pub owner: Address,
    pub pool: Address,
    pub token: Address,
    pub amount: Amount,
    pub parent_id: Option<DomainEventId>,
    pub parent_type: Option<String>,
}

impl DomainRecord for Position {
    fn content_id(&self) -> &DomainEventId {
        &self.content_id
    }

    fn column_names() -> &'static [&'static str] {
        &[
            "content_id", "tx_hash", "block_number", "timestamp", "owner", "pool", "token",
            "amount", "parent_id", "parent_type",
        ]
    }

    fn columns(&self) -> Vec<ColumnValue> {
        vec![
            ColumnValue::from(&self.content_id),
            ColumnValue::from(&self.tx_hash),
            ColumnValue::BigInt(self.block_number),
            ColumnValue::Timestamp(self.timestamp),
            ColumnValue::from(&self.owner),
            ColumnValue::from(&self.pool),
            ColumnValue::from(&self.token),
            ColumnValue::Numeric(self.amount.to_string()),
            ColumnValue::OptText(self.parent_id.as_ref().map(|id| id.as_str().to_string())),
            ColumnValue::OptText(self.parent_type.clone()),
        ]
    }
}

/// Every kind of non-swap analytics-relevant event, used uniformly by
/// `calculate_event_valuations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Trade,
    PoolSwap,
    Transfer,
    Liquidity,
    Reward,
    Position,
}

impl EventKind {
    pub fn table_name(self) -> &'static str {
        match self {
            EventKind::Trade => "trade",
            EventKind::PoolSwap => "poolswap",
            EventKind::Transfer => "transfer",
            EventKind::Liquidity => "liquidity",
            EventKind::Reward => "reward",
            EventKind::Position => "position",
        }
    }
}
