//! Aggregated analytics tables written by CalculationService:
//! OHLC asset prices and rolling asset volumes, both keyed by
//! `(asset_address, period_type, period_open, denom)`.

use chrono::{DateTime, Utc};

use crate::db::shared::{Denomination, PeriodType};
use crate::types::Address;

use super::column::{ColumnValue, DomainRecord};

#[derive(Debug, Clone)]
pub struct AssetPrice {
    pub content_id: crate::types::DomainEventId,
    pub asset_address: Address,
    pub denom: Denomination,
    pub period_type: PeriodType,
    pub period_open: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl DomainRecord for AssetPrice {
    fn content_id(&self) -> &crate::types::DomainEventId {
        &self.content_id
    }

    fn column_names() -> &'static [&'static str] {
        &["content_id", "asset_address", "denom", "period_type", "period_open", "open", "high", "low", "close"]
    }

    fn columns(&self) -> Vec<ColumnValue> {
        vec![
            ColumnValue::from(&self.content_id),
            ColumnValue::from(&self.asset_address),
            ColumnValue::Text(self.denom.as_str().to_string()),
            ColumnValue::Text(self.period_type.as_str().to_string()),
            ColumnValue::Timestamp(self.period_open),
            ColumnValue::Float(self.open),
            ColumnValue::Float(self.high),
            ColumnValue::Float(self.low),
            ColumnValue::Float(self.close),
        ]
    }
}

/// Protocol-level volume for one asset/period, keyed by
/// `(asset_address, period_type, period_open, protocol, denom)` --
/// `protocol` is `Contract.project` from the shared DB (e.g. "lfj",
/// "pharaoh"), joined in application code since it lives in a different
/// database.
#[derive(Debug, Clone)]
pub struct AssetVolume {
    pub content_id: crate::types::DomainEventId,
    pub asset_address: Address,
    pub denom: Denomination,
    pub period_type: PeriodType,
    pub period_open: DateTime<Utc>,
    pub protocol: String,
    pub volume_usd: f64,
    pub pool_count: i32,
    pub swap_count: i32,
}

impl DomainRecord for AssetVolume {
    fn content_id(&self) -> &crate::types::DomainEventId {
        &self.content_id
    }

    fn column_names() -> &'static [&'static str] {
        &[
            "content_id", "asset_address", "denom", "period_type", "period_open", "protocol",
            "volume_usd", "pool_count", "swap_count",
        ]
    }

    fn columns(&self) -> Vec<ColumnValue> {
        vec![
            ColumnValue::from(&self.content_id),
            ColumnValue::from(&self.asset_address),
            ColumnValue::Text(self.denom.as_str().to_string()),
            ColumnValue::Text(self.period_type.as_str().to_string()),
            ColumnValue::Timestamp(self.period_open),
            ColumnValue::Text(self.protocol.clone()),
            ColumnValue::Float(self.volume_usd),
            ColumnValue::Int(self.pool_count),
            ColumnValue::Int(self.swap_count),
        ]
    }
}
