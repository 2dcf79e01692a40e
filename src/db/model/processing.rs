//! Processing-state bookkeeping: per-block and per-transaction progress
//! markers, plus the durable job queue's row shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Leased,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Leased => "leased",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "leased" => Some(JobStatus::Leased),
            "done" => Some(JobStatus::Done),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

/// A unit of work in the durable queue: one block to fetch, decode,
/// transform and write. Leases expire; `sweep` reclaims rows whose lease
/// has lapsed without a `complete`/`fail` call.
#[derive(Debug, Clone)]
pub struct ProcessingJob {
    pub id: Uuid,
    pub block_number: i64,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub leased_by: Option<String>,
    pub leased_until: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Marks a block as fully processed (all of its transactions transformed
/// and written) -- the high-water mark `continuous` mode resumes from.
#[derive(Debug, Clone)]
pub struct BlockProcessing {
    pub block_number: i64,
    pub block_hash: Hash,
    pub timestamp: DateTime<Utc>,
    pub transaction_count: i32,
    pub processed_at: DateTime<Utc>,
}

/// Marks a single transaction's processing outcome independently of its
/// block, so `failed`/`missing` CLI modes can target individual
/// transactions without reprocessing an entire block.
#[derive(Debug, Clone)]
pub struct TransactionProcessing {
    pub tx_hash: Hash,
    pub block_number: i64,
    pub success: bool,
    pub event_count: i32,
    pub error: Option<String>,
    pub processed_at: DateTime<Utc>,
}
