//! PricingService: P0-P4 pricing phases, each a standalone async
//! function, composed by `PricingService` into the unit the cron scheduler
//! calls.

pub mod chainlink;
pub mod periods;
pub mod phases;
pub mod service;

pub use chainlink::{ChainlinkPriceSource, ChainlinkRound};
pub use periods::{periods_to_open, TRACKED_PERIODS};
pub use phases::{run_p1_block_price, run_p2_direct_pricing, run_p2_trade_pricing, run_p3_canonical_vwap, run_p4_global_fallback};
pub use service::PricingService;
