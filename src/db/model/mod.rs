pub mod analytics;
pub mod column;
pub mod details;
pub mod events;
pub mod processing;
pub mod queue;
pub mod repo;

pub use analytics::{AssetPrice, AssetVolume};
pub use column::{ColumnValue, DomainRecord};
pub use details::{EventDetail, PoolSwapDetail, PricingMethod, SwapPriceMethod, TradeDetail, TradePriceMethod};
pub use events::{Direction, EventKind, Liquidity, LiquidityAction, PoolSwap, Position, Reward, Trade, TradeType, Transfer};
pub use processing::{BlockProcessing, JobStatus, ProcessingJob, TransactionProcessing};
pub use queue::JobQueue;
pub use repo::{DomainEventWriter, ModelRepository, SwapForPricing, TradeForPricing, TransactionResult, UnvaluedEvent, VwapInput, WriteSummary};
