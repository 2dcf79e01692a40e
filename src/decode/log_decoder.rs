//! Event-log decoding: ABI-driven decoding against whatever `JsonAbi`
//! the `ContractRegistry` hands back for an address, rather than topic0
//! dispatch over a fixed set of compiled event types.
//!
//! Field normalisation: bytes become lowercase hex, booleans pass through
//! as `"true"`/`"false"`, everything else is rendered via its canonical
//! string form. A log whose topic0 matches no event in the ABI, whose
//! contract has no ABI at all, or whose body fails to decode against the
//! matched event is never dropped -- it comes back as an `EncodedLog`
//! (topics and data untouched) so every fetched log is accounted for.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::dyn_abi::{DynSolValue, EventExt};
use alloy::json_abi::JsonAbi;
use alloy::primitives::{Bytes, LogData, B256};
use chrono::{DateTime, Utc};

use crate::types::{Address, Hash};

/// A single EVM log exactly as fetched, before any ABI is applied.
#[derive(Debug, Clone)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
    pub block_number: i64,
    pub tx_hash: Hash,
    pub log_index: i64,
    pub timestamp: DateTime<Utc>,
    /// Set when a chain reorg has orphaned the block this log was fetched
    /// from. `eth_getLogs` keeps serving these for a window after the
    /// reorg; the worker skips them rather than indexing a log that no
    /// longer sits on the canonical chain.
    pub removed: bool,
}

/// A log decoded against a known event signature, with every parameter
/// normalised to a display string keyed by its ABI name.
#[derive(Debug, Clone)]
pub struct DecodedLog {
    pub address: Address,
    pub event_name: String,
    pub params: HashMap<String, String>,
    pub block_number: i64,
    pub tx_hash: Hash,
    pub log_index: i64,
    pub timestamp: DateTime<Utc>,
}

impl DecodedLog {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }
}

/// A log that was fetched but never matched a known event -- either its
/// contract carries no ABI, or nothing in the ABI recognises its topic0,
/// or the body failed to decode against the matching event. Carried
/// through untouched (topics and data as-is) rather than dropped.
#[derive(Debug, Clone)]
pub struct EncodedLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
    pub block_number: i64,
    pub tx_hash: Hash,
    pub log_index: i64,
    pub timestamp: DateTime<Utc>,
    pub removed: bool,
}

/// The outcome of attempting to decode a log: either a matched event, or
/// the log passed through encoded. Never drops the log.
#[derive(Debug, Clone)]
pub enum Decoded {
    Event(DecodedLog),
    Encoded(EncodedLog),
}

pub struct LogDecoder;

impl LogDecoder {
    /// Decode `raw` against `abi` if one is available. Falls back to
    /// `Decoded::Encoded` whenever `abi` is `None`, the log's topic0
    /// matches no event, or the body fails to decode -- `raw` itself is
    /// never discarded.
    pub fn decode(raw: &RawLog, abi: Option<&Arc<JsonAbi>>) -> Decoded {
        match abi.and_then(|abi| Self::try_decode_event(raw, abi)) {
            Some(decoded) => Decoded::Event(decoded),
            None => Decoded::Encoded(EncodedLog {
                address: raw.address.clone(),
                topics: raw.topics.clone(),
                data: raw.data.clone(),
                block_number: raw.block_number,
                tx_hash: raw.tx_hash.clone(),
                log_index: raw.log_index,
                timestamp: raw.timestamp,
                removed: raw.removed,
            }),
        }
    }

    fn try_decode_event(raw: &RawLog, abi: &Arc<JsonAbi>) -> Option<DecodedLog> {
        let topic0 = raw.topics.first()?;

        let event = abi.events().find(|e| &e.selector() == topic0)?;

        let log_data = LogData::new(raw.topics.clone(), Bytes::copy_from_slice(&raw.data))?;
        let decoded = event.decode_log_parts(log_data.topics().iter().copied(), log_data.data(), false).ok()?;

        let mut params = HashMap::with_capacity(event.inputs.len());
        let mut indexed_iter = decoded.indexed.into_iter();
        let mut body_iter = decoded.body.into_iter();

        for input in &event.inputs {
            let value = if input.indexed { indexed_iter.next() } else { body_iter.next() };
            if let Some(value) = value {
                params.insert(input.name.clone(), normalize_value(&value));
            }
        }

        Some(DecodedLog {
            address: raw.address.clone(),
            event_name: event.name.clone(),
            params,
            block_number: raw.block_number,
            tx_hash: raw.tx_hash.clone(),
            log_index: raw.log_index,
            timestamp: raw.timestamp,
        })
    }
}

/// Mirrors `_convert_web3_attribute`: bytes/addresses become lowercase hex,
/// booleans pass through, signed/unsigned integers render as decimal
/// strings (arbitrary precision, never truncated to a machine int), and
/// lists of bytes (e.g. Uniswap v4 `amounts`) become comma-joined hex.
fn normalize_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Address(addr) => format!("{addr:#x}").to_lowercase(),
        DynSolValue::Bytes(b) => format!("0x{}", alloy::primitives::hex::encode(b)),
        DynSolValue::FixedBytes(b, _) => format!("0x{}", alloy::primitives::hex::encode(b)),
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Uint(v, _) => v.to_string(),
        DynSolValue::Int(v, _) => v.to_string(),
        DynSolValue::String(s) => s.clone(),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => {
            items.iter().map(normalize_value).collect::<Vec<_>>().join(",")
        }
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bool_and_uint() {
        assert_eq!(normalize_value(&DynSolValue::Bool(true)), "true");
        assert_eq!(normalize_value(&DynSolValue::Uint(alloy::primitives::U256::from(42u64), 256)), "42");
    }
}
