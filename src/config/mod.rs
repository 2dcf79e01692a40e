mod settings;

pub use settings::{DatabaseSettings, RpcSettings, Settings, StoreSettings};
