pub mod registry;

pub use registry::ContractRegistry;
