//! Row types for the shared (infra) database: `Model`, `Contract`, `Token`,
//! `Source`, `Period`, `BlockPrice`, `PriceVwap`, `PoolPricingConfig`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Address;

/// Time-bucket resolution tracked by the `Period` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodType {
    OneMin,
    FiveMin,
    OneHour,
    FourHour,
    OneDay,
}

impl PeriodType {
    pub fn duration_secs(self) -> i64 {
        match self {
            PeriodType::OneMin => 60,
            PeriodType::FiveMin => 300,
            PeriodType::OneHour => 3_600,
            PeriodType::FourHour => 14_400,
            PeriodType::OneDay => 86_400,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PeriodType::OneMin => "1min",
            PeriodType::FiveMin => "5min",
            PeriodType::OneHour => "1hr",
            PeriodType::FourHour => "4hr",
            PeriodType::OneDay => "1day",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Some(match s {
            "1min" => PeriodType::OneMin,
            "5min" => PeriodType::FiveMin,
            "1hr" => PeriodType::OneHour,
            "4hr" => PeriodType::FourHour,
            "1day" => PeriodType::OneDay,
            _ => return None,
        })
    }
}

/// Denomination an asset can be priced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Denomination {
    Usd,
    Avax,
}

impl Denomination {
    pub fn as_str(self) -> &'static str {
        match self {
            Denomination::Usd => "USD",
            Denomination::Avax => "AVAX",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Some(match s {
            "USD" => Denomination::Usd,
            "AVAX" => Denomination::Avax,
            _ => return None,
        })
    }
}

/// A named, versioned indexing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub version: String,
    pub model_db_name: String,
    pub model_token_address: Address,
    pub status: String,
}

impl Model {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// A tracked contract: address, protocol metadata, and its ABI/transformer
/// binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub address: Address,
    pub name: String,
    pub project: String,
    pub contract_type: String,
    pub abi_dir: String,
    pub abi_file: String,
    pub transformer_name: Option<String>,
    pub transformer_config: Option<serde_json::Value>,
    pub base_token_address: Option<Address>,
}

/// Global token metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub token_type: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub project: Option<String>,
}

/// An object-store prefix + key-format template for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub path: String,
    pub format: String,
}

/// A closed time bucket with a matching block range, for one resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Period {
    pub period_type: PeriodType,
    pub time_open: i64,
    pub time_close: i64,
    pub block_open: i64,
    pub block_close: i64,
    pub is_complete: bool,
}

/// AVAX/USD reference price at a given block, sourced from a Chainlink-like
/// oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockPrice {
    pub block_number: i64,
    pub timestamp: DateTime<Utc>,
    pub price_usd: f64,
    pub chainlink_round_id: Option<String>,
    pub chainlink_updated_at: Option<DateTime<Utc>>,
}

/// The authoritative per-minute canonical price for an asset/denomination,
/// volume-weighted from designated pricing pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceVwap {
    pub asset_address: Address,
    pub timestamp_minute: i64,
    pub denomination: Denomination,
    pub price_period: f64,
    pub price_vwap: f64,
    pub base_volume: f64,
    pub quote_volume: f64,
    pub pool_count: i32,
    pub swap_count: i32,
}

/// Which pools are canonical pricing sources for which asset, over what
/// interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolPricingConfig {
    pub model_id: String,
    pub contract_id: Address,
    pub pricing_pool: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
}
