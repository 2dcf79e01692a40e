pub mod models;
pub mod repo;

pub use models::{BlockPrice, Contract, Denomination, Model, Period, PeriodType, PoolPricingConfig, PriceVwap, Source, Token};
pub use repo::{ModelConfig, SharedRepository};
