pub mod object_store;
pub mod rpc;

pub use object_store::ObjectStoreSource;
pub use rpc::RpcSource;

use async_trait::async_trait;
use log::debug;

use crate::decode::RawLog;

/// A fetched block: its logs plus enough header data to stamp every event
/// with a timestamp.
#[derive(Debug, Clone)]
pub struct FetchedBlock {
    pub block_number: i64,
    pub block_hash: crate::types::Hash,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub logs: Vec<RawLog>,
}

/// Source of raw block data: object-store-backed (cheap, historical)
/// or RPC-backed (authoritative, used for recent/live blocks and as a
/// fallback when the object store has no decoded snapshot yet).
///
/// A storage-backend-agnostic trait so the worker can try the object store
/// first and fall back to RPC without knowing which backend served the
/// block.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn fetch_block(&self, block_number: i64) -> anyhow::Result<Option<FetchedBlock>>;
    async fn latest_block_number(&self) -> anyhow::Result<i64>;
}

/// Tries the object store first, falling back to RPC when the store has no
/// snapshot for a block yet (e.g. it hasn't caught up to the chain head) or
/// errors outright. `latest_block_number` always goes to RPC, since the
/// object store has no notion of chain head.
pub struct FallbackSource {
    primary: ObjectStoreSource,
    fallback: RpcSource,
}

impl FallbackSource {
    pub fn new(primary: ObjectStoreSource, fallback: RpcSource) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl BlockSource for FallbackSource {
    async fn fetch_block(&self, block_number: i64) -> anyhow::Result<Option<FetchedBlock>> {
        match self.primary.fetch_block(block_number).await {
            Ok(Some(block)) => Ok(Some(block)),
            Ok(None) => self.fallback.fetch_block(block_number).await,
            Err(e) => {
                debug!("object store fetch for block {block_number} failed, falling back to rpc: {e:#}");
                self.fallback.fetch_block(block_number).await
            }
        }
    }

    async fn latest_block_number(&self) -> anyhow::Result<i64> {
        self.fallback.latest_block_number().await
    }
}
