pub mod config;
pub mod event;
pub mod pool;
pub mod status;

pub use config::{HubConfig, ServerSpec, TransportType};
pub use event::{ConfigChange, ConfigDiff};
pub use pool::{
    merge_pool_config, validate_pool_config, MergedPoolConfig, PoolConfig, PoolConfigValidation,
    PoolSettings, DEFAULT_POOL_CONFIG,
};
pub use status::{ConnectionStatus, ServerStatus};
