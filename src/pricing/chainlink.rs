//! Minimal Chainlink `latestRoundData()` reader, used by P1 to stamp a
//! USD price onto each processed block. A raw `eth_call` rather than
//! a generated contract binding: one function, one fixed-width return
//! layout, not worth a `sol!` macro.

use serde_json::{json, Value};

use crate::types::Amount;

const LATEST_ROUND_DATA_SELECTOR: &str = "0xfeaf968c";

pub struct ChainlinkPriceSource {
    rpc_url: String,
    client: reqwest::Client,
    aggregator: String,
    /// Chainlink USD feeds report with 8 decimals almost universally.
    answer_decimals: u32,
}

#[derive(Debug, Clone)]
pub struct ChainlinkRound {
    pub round_id: String,
    pub answer: Amount,
    pub updated_at: i64,
}

impl ChainlinkPriceSource {
    pub fn new(rpc_url: String, aggregator: String) -> Self {
        Self { rpc_url, client: reqwest::Client::new(), aggregator, answer_decimals: 8 }
    }

    pub fn answer_decimals(&self) -> u32 {
        self.answer_decimals
    }

    pub async fn latest_round_data(&self) -> anyhow::Result<ChainlinkRound> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [{ "to": self.aggregator, "data": LATEST_ROUND_DATA_SELECTOR }, "latest"],
        });

        let resp: Value = self.client.post(&self.rpc_url).json(&body).send().await?.json().await?;
        if let Some(err) = resp.get("error") {
            anyhow::bail!("eth_call latestRoundData failed: {err}");
        }
        let result = resp.get("result").and_then(Value::as_str).unwrap_or("0x");
        parse_round_data(result)
    }
}

fn parse_round_data(hex_result: &str) -> anyhow::Result<ChainlinkRound> {
    let bytes = alloy::primitives::hex::decode(hex_result.trim_start_matches("0x"))?;
    if bytes.len() < 160 {
        anyhow::bail!("latestRoundData returned {} bytes, expected at least 160", bytes.len());
    }

    let word = |n: usize| -> &[u8] { &bytes[n * 32..(n + 1) * 32] };

    let round_id = num_bigint::BigInt::from_bytes_be(num_bigint::Sign::Plus, word(0));
    let answer = num_bigint::BigInt::from_signed_bytes_be(word(1));
    let updated_at = num_bigint::BigInt::from_bytes_be(num_bigint::Sign::Plus, word(3));

    Ok(ChainlinkRound {
        round_id: round_id.to_string(),
        answer,
        updated_at: updated_at.to_string().parse().unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixed_width_round_data() {
        // 5 words: roundId=1, answer=2500000000 (25.00000000), startedAt=0, updatedAt=1700000000, answeredInRound=1
        let mut hex = String::new();
        let words = [1u64, 2_500_000_000, 0, 1_700_000_000, 1];
        for w in words {
            hex.push_str(&format!("{:064x}", w));
        }
        let round = parse_round_data(&format!("0x{hex}")).unwrap();
        assert_eq!(round.answer, num_bigint::BigInt::from(2_500_000_000i64));
        assert_eq!(round.updated_at, 1_700_000_000);
    }
}
