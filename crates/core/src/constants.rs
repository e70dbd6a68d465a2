//! Environment variable names and defaults used when resolving [`crate::config::CoreConfig`].

/// Dashboard role to open (`lab_user` or `manager`).
pub const ROLE_ENV: &str = "LIS_ROLE";

/// Name shown in the dashboard header and recorded as the actor of audit entries.
pub const DISPLAY_NAME_ENV: &str = "LIS_DISPLAY_NAME";

/// Path of a YAML seed file replacing the built-in sample data.
pub const SEED_FILE_ENV: &str = "LIS_SEED_FILE";

pub const LOW_STOCK_THRESHOLD_ENV: &str = "LIS_LOW_STOCK_THRESHOLD";
pub const MEDIUM_STOCK_THRESHOLD_ENV: &str = "LIS_MEDIUM_STOCK_THRESHOLD";
pub const WAREHOUSE_LOW_STOCK_THRESHOLD_ENV: &str = "LIS_WAREHOUSE_LOW_STOCK_THRESHOLD";
pub const WAREHOUSE_MEDIUM_STOCK_THRESHOLD_ENV: &str = "LIS_WAREHOUSE_MEDIUM_STOCK_THRESHOLD";

/// Artificial latency of a configuration sync, in milliseconds.
pub const SYNC_DELAY_MS_ENV: &str = "LIS_SYNC_DELAY_MS";

pub const DEFAULT_DISPLAY_NAME: &str = "Lab Staff";

/// Warehouse stock is held in bulk, so its badges use higher bounds than the bench.
pub const DEFAULT_WAREHOUSE_LOW_STOCK: u32 = 500;
pub const DEFAULT_WAREHOUSE_MEDIUM_STOCK: u32 = 1000;

pub const DEFAULT_SYNC_DELAY_MS: u64 = 1500;
