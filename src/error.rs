//! Domain error taxonomy.
//!
//! Call sites still use `anyhow::Context` for ad-hoc error chaining
//! everywhere else in this codebase; this enum exists for the handful of
//! places that need to branch on error *kind* -- the job queue's
//! retry/fail decision and the CLI's exit code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexerError {
    /// Missing model, unresolvable ABI, contradictory pricing config. Fatal
    /// at startup.
    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    /// All sources and RPC failed with a non-404 error. Retryable.
    #[error("block fetch failed for block {block_number}: {reason}")]
    BlockFetchError { block_number: i64, reason: String },

    /// Malformed block payload. Non-retryable.
    #[error("decode error: {0}")]
    DecodeError(String),

    /// A transformer raised while processing a transaction.
    #[error("transform error in tx {tx_hash}: {reason}")]
    TransformError { tx_hash: String, reason: String },

    /// DB error during a bulk write; the whole transaction rolls back.
    #[error("persist error: {0}")]
    PersistError(String),

    /// Another worker took the lease; the current worker must abort without
    /// committing.
    #[error("lease lost for job {job_id}")]
    LeaseLost { job_id: String },
}

impl IndexerError {
    /// Whether a job that failed with this error should be retried
    /// (returned to `pending`) or moved straight to `failed`.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IndexerError::BlockFetchError { .. } | IndexerError::PersistError(_))
    }

    /// Process exit code per the CLI contract: `1` runtime error, `2` config
    /// error.
    pub fn exit_code(&self) -> i32 {
        match self {
            IndexerError::ConfigInvalid(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_fetch_and_persist_errors_are_retryable() {
        assert!(IndexerError::BlockFetchError { block_number: 1, reason: "x".into() }.is_retryable());
        assert!(IndexerError::PersistError("x".into()).is_retryable());
    }

    #[test]
    fn decode_and_transform_errors_are_not_retryable() {
        assert!(!IndexerError::DecodeError("x".into()).is_retryable());
        assert!(!IndexerError::TransformError { tx_hash: "x".into(), reason: "y".into() }.is_retryable());
    }

    #[test]
    fn config_invalid_exits_with_code_2() {
        assert_eq!(IndexerError::ConfigInvalid("missing model".into()).exit_code(), 2);
    }
}
