//! Per-event pricing detail tables: `poolswap_detail`, `trade_detail`,
//! `event_detail`. Each record is a 1:1 enrichment of its parent event,
//! written once a pricing phase has produced a value for it -- never
//! before, since pricing is a separate pass from transformation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::shared::Denomination;
use crate::types::DomainEventId;

use super::column::{ColumnValue, DomainRecord};

/// How a swap's price was resolved, across pricing phases P1-P4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapPriceMethod {
    DirectAvax,
    DirectUsd,
    Global,
    Error,
}

impl SwapPriceMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SwapPriceMethod::DirectAvax => "direct_avax",
            SwapPriceMethod::DirectUsd => "direct_usd",
            SwapPriceMethod::Global => "global",
            SwapPriceMethod::Error => "error",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "direct_avax" => Some(SwapPriceMethod::DirectAvax),
            "direct_usd" => Some(SwapPriceMethod::DirectUsd),
            "global" => Some(SwapPriceMethod::Global),
            "error" => Some(SwapPriceMethod::Error),
            _ => None,
        }
    }
}

/// How a trade's price was resolved -- coarser than swap-level pricing
/// since a trade aggregates one or more swaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradePriceMethod {
    Direct,
    Global,
}

impl TradePriceMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            TradePriceMethod::Direct => "direct",
            TradePriceMethod::Global => "global",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(TradePriceMethod::Direct),
            "global" => Some(TradePriceMethod::Global),
            _ => None,
        }
    }
}

/// How a non-trade event's valuation was resolved: canonical VWAP first,
/// falling back to a direct pool quote, falling back to the P4 global
/// price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricingMethod {
    Canonical,
    Direct,
    Global,
}

impl PricingMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PricingMethod::Canonical => "canonical",
            PricingMethod::Direct => "direct",
            PricingMethod::Global => "global",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "canonical" => Some(PricingMethod::Canonical),
            "direct" => Some(PricingMethod::Direct),
            "global" => Some(PricingMethod::Global),
            _ => None,
        }
    }
}

/// Pricing detail for one pool-level swap. Unique per `(poolswap_id,
/// denomination)` -- the same swap can carry both a USD-denominated and an
/// AVAX-denominated detail row.
#[derive(Debug, Clone)]
pub struct PoolSwapDetail {
    pub content_id: DomainEventId,
    pub poolswap_id: DomainEventId,
    pub denomination: Denomination,
    pub timestamp: DateTime<Utc>,
    pub base_price_usd: f64,
    pub quote_price_usd: f64,
    pub volume_usd: f64,
    pub price_method: SwapPriceMethod,
}

impl DomainRecord for PoolSwapDetail {
    fn content_id(&self) -> &DomainEventId {
        &self.content_id
    }

    fn column_names() -> &'static [&'static str] {
        &["content_id", "poolswap_id", "denomination", "timestamp", "base_price_usd", "quote_price_usd", "volume_usd", "price_method"]
    }

    fn columns(&self) -> Vec<ColumnValue> {
        vec![
            ColumnValue::from(&self.content_id),
            ColumnValue::from(&self.poolswap_id),
            ColumnValue::Text(self.denomination.as_str().to_string()),
            ColumnValue::Timestamp(self.timestamp),
            ColumnValue::Float(self.base_price_usd),
            ColumnValue::Float(self.quote_price_usd),
            ColumnValue::Float(self.volume_usd),
            ColumnValue::Text(self.price_method.as_str().to_string()),
        ]
    }
}

/// Pricing detail for one trade (one or more pool swaps by the same
/// taker). Unique per `(trade_id, denomination)`, same rationale as
/// `PoolSwapDetail`.
#[derive(Debug, Clone)]
pub struct TradeDetail {
    pub content_id: DomainEventId,
    pub trade_id: DomainEventId,
    pub denomination: Denomination,
    pub timestamp: DateTime<Utc>,
    pub base_price_usd: f64,
    pub quote_price_usd: f64,
    pub volume_usd: f64,
    pub price_method: TradePriceMethod,
}

impl DomainRecord for TradeDetail {
    fn content_id(&self) -> &DomainEventId {
        &self.content_id
    }

    fn column_names() -> &'static [&'static str] {
        &["content_id", "trade_id", "denomination", "timestamp", "base_price_usd", "quote_price_usd", "volume_usd", "price_method"]
    }

    fn columns(&self) -> Vec<ColumnValue> {
        vec![
            ColumnValue::from(&self.content_id),
            ColumnValue::from(&self.trade_id),
            ColumnValue::Text(self.denomination.as_str().to_string()),
            ColumnValue::Timestamp(self.timestamp),
            ColumnValue::Float(self.base_price_usd),
            ColumnValue::Float(self.quote_price_usd),
            ColumnValue::Float(self.volume_usd),
            ColumnValue::Text(self.price_method.as_str().to_string()),
        ]
    }
}

/// Valuation for any non-swap, non-trade event (transfer, liquidity,
/// reward, position) -- `event_type` + `event_id` together identify the
/// parent row, since these details are stored in one shared table rather
/// than one per event kind.
#[derive(Debug, Clone)]
pub struct EventDetail {
    pub content_id: DomainEventId,
    pub event_type: String,
    pub event_id: DomainEventId,
    pub timestamp: DateTime<Utc>,
    pub value_usd: f64,
    pub pricing_method: PricingMethod,
}

impl DomainRecord for EventDetail {
    fn content_id(&self) -> &DomainEventId {
        &self.content_id
    }

    fn column_names() -> &'static [&'static str] {
        &["content_id", "event_type", "event_id", "timestamp", "value_usd", "pricing_method"]
    }

    fn columns(&self) -> Vec<ColumnValue> {
        vec![
            ColumnValue::from(&self.content_id),
            ColumnValue::Text(self.event_type.clone()),
            ColumnValue::from(&self.event_id),
            ColumnValue::Timestamp(self.timestamp),
            ColumnValue::Float(self.value_usd),
            ColumnValue::Text(self.pricing_method.as_str().to_string()),
        ]
    }
}
