//! Lightweight JSON-RPC `BlockSource`, used for live blocks and as the
//! fallback when the object store has no snapshot yet. Deliberately
//! a thin `reqwest` client rather than a purpose-built ingestion SDK: the
//! RPC surface needed here is just `eth_getLogs`/`eth_getBlockByNumber`/
//! `eth_blockNumber`/`eth_getCode`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::config::RpcSettings;
use crate::decode::RawLog;
use crate::transform::finalize::CodeChecker;
use crate::types::{Address, Hash};

use super::{BlockSource, FetchedBlock};

pub struct RpcSource {
    client: reqwest::Client,
    url: String,
    max_retries: u32,
}

impl RpcSource {
    pub fn new(settings: &RpcSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(settings.timeout_secs)).build()?;
        Ok(Self { client, url: settings.avax_rpc.clone(), max_retries: settings.max_retries })
    }

    async fn call(&self, method: &str, params: Value) -> anyhow::Result<Value> {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });

        let mut attempt = 0u32;
        loop {
            let resp = self.client.post(&self.url).json(&body).send().await;
            match resp {
                Ok(resp) => {
                    let resp: Value = resp.error_for_status()?.json().await?;
                    if let Some(err) = resp.get("error") {
                        anyhow::bail!("rpc error calling {method}: {err}");
                    }
                    return Ok(resp.get("result").cloned().unwrap_or(Value::Null));
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = Duration::from_millis(200 * 2u64.pow(attempt));
                    log::warn!("rpc call {method} failed (attempt {attempt}): {e}, retrying in {backoff:?}");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn parse_hex_u64(v: &Value) -> i64 {
        v.as_str()
            .and_then(|s| i64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
            .unwrap_or(0)
    }
}

#[async_trait]
impl BlockSource for RpcSource {
    async fn fetch_block(&self, block_number: i64) -> anyhow::Result<Option<FetchedBlock>> {
        let block_hex = format!("0x{block_number:x}");

        let block = self.call("eth_getBlockByNumber", json!([block_hex, false])).await?;
        if block.is_null() {
            return Ok(None);
        }
        let block_hash = Hash::new(block.get("hash").and_then(Value::as_str).unwrap_or_default());
        let timestamp_secs = Self::parse_hex_u64(block.get("timestamp").unwrap_or(&Value::Null));
        let timestamp: DateTime<Utc> = DateTime::from_timestamp(timestamp_secs, 0).unwrap_or_else(Utc::now);

        let log_filter = json!([{ "fromBlock": block_hex, "toBlock": block_hex }]);
        let logs = self.call("eth_getLogs", log_filter).await?;

        let logs = logs
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|entry| RawLog {
                address: Address::new(entry.get("address").and_then(Value::as_str).unwrap_or_default()),
                topics: entry
                    .get("topics")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(|t| t.as_str().and_then(|s| s.parse().ok())).collect())
                    .unwrap_or_default(),
                data: entry
                    .get("data")
                    .and_then(Value::as_str)
                    .and_then(|s| alloy::primitives::hex::decode(s.trim_start_matches("0x")).ok())
                    .unwrap_or_default(),
                block_number,
                tx_hash: Hash::new(entry.get("transactionHash").and_then(Value::as_str).unwrap_or_default()),
                log_index: Self::parse_hex_u64(entry.get("logIndex").unwrap_or(&Value::Null)),
                timestamp,
                removed: entry.get("removed").and_then(Value::as_bool).unwrap_or(false),
            })
            .collect();

        Ok(Some(FetchedBlock { block_number, block_hash, timestamp, logs }))
    }

    async fn latest_block_number(&self) -> anyhow::Result<i64> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        Ok(Self::parse_hex_u64(&result))
    }
}

#[async_trait]
impl CodeChecker for RpcSource {
    async fn has_code(&self, address: &Address) -> anyhow::Result<bool> {
        let result = self.call("eth_getCode", json!([address.as_str(), "latest"])).await?;
        let code = result.as_str().unwrap_or("0x");
        Ok(code.len() > 2)
    }
}
