pub mod calculation;
pub mod config;
pub mod contracts;
pub mod cron;
pub mod db;
pub mod decode;
pub mod error;
pub mod pricing;
pub mod source;
pub mod transform;
pub mod types;
pub mod utils;
pub mod worker;

pub use calculation::CalculationService;
pub use config::Settings;
pub use cron::{CronScheduler, CronSettings};
pub use db::Database;
pub use error::IndexerError;
pub use pricing::PricingService;
pub use worker::{JobWorker, Orchestrator};
