//! Primitive value types shared across the indexing pipeline.
//!
//! These wrap plain strings/integers rather than re-exporting `alloy`'s
//! wire types directly: the pipeline stores everything as lowercase hex in
//! Postgres, and keeping that normalisation at the type boundary means no
//! call site has to remember to `.to_lowercase()` before a query.

use std::fmt;

use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// A 20-byte EVM address, normalised to lowercase `0x`-prefixed hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSql, FromSql)]
#[postgres(transparent)]
pub struct Address(pub String);

impl Address {
    pub fn new(raw: &str) -> Self {
        Self(raw.to_lowercase())
    }

    pub fn zero() -> Self {
        Self("0x0000000000000000000000000000000000000000".to_string())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == "0x0000000000000000000000000000000000000000"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<alloy::primitives::Address> for Address {
    fn from(addr: alloy::primitives::Address) -> Self {
        Self(format!("{addr:#x}"))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A 32-byte hash (block hash or transaction hash), lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSql, FromSql)]
#[postgres(transparent)]
pub struct Hash(pub String);

impl Hash {
    pub fn new(raw: &str) -> Self {
        Self(raw.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content-addressed idempotency key for a domain event or position.
///
/// Computed by hashing the canonical concatenation of the event's
/// identifying fields; two calls with the same identifying fields always
/// produce the same id, which is what makes reprocessing a block idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSql, FromSql)]
#[postgres(transparent)]
pub struct DomainEventId(pub String);

impl DomainEventId {
    /// Build a content id from an ordered list of identifying field values.
    ///
    /// Fields are joined with `|` before hashing so that, e.g., `("ab", "c")`
    /// and `("a", "bc")` never collide.
    pub fn from_fields(kind: &str, fields: &[&str]) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(kind.as_bytes());
        for field in fields {
            hasher.update(b"|");
            hasher.update(field.as_bytes());
        }
        let digest = hasher.finalize();
        Self(format!("0x{}", alloy::primitives::hex::encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw, unbounded on-chain integer amount. Human-scaled values are derived
/// only at pricing time via `crate::utils::str_to_f64_with_decimals`.
pub type Amount = num_bigint::BigInt;

/// Unix-seconds timestamp. Minute buckets are `floor(t/60)*60`.
pub fn floor_to_minute(ts: i64) -> i64 {
    ts - ts.rem_euclid(60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_lowercases() {
        let a = Address::new("0xABCDEF0000000000000000000000000000000000");
        assert_eq!(a.as_str(), "0xabcdef0000000000000000000000000000000000");
    }

    #[test]
    fn content_id_is_stable_for_identical_inputs() {
        let a = DomainEventId::from_fields("swap", &["0xdead", "3", "1000"]);
        let b = DomainEventId::from_fields("swap", &["0xdead", "3", "1000"]);
        assert_eq!(a, b);
    }

    #[test]
    fn content_id_distinguishes_field_boundaries() {
        let a = DomainEventId::from_fields("swap", &["ab", "c"]);
        let b = DomainEventId::from_fields("swap", &["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn minute_floor_rounds_down() {
        assert_eq!(floor_to_minute(125), 120);
        assert_eq!(floor_to_minute(120), 120);
    }
}
