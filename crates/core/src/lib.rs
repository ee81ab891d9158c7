//! boi-rates core library
//!
//! Shared utilities for the rate daemon and its consumers:
//! - Configuration loading (XDG-compliant)
//! - File system utilities, including atomic file replacement
//! - The error taxonomy for the rate engine

mod config;
mod error;
pub mod fs;

pub use config::{find_config_file, get_xdg_cache_dir, load_config, ConfigSource};
pub use error::RatesError;
pub use fs::write_atomic;

/// Application name used for XDG paths
pub const APP_NAME: &str = "boi-rates";

/// Default fetch interval (the bank publishes at most daily, checked hourly)
pub const DEFAULT_FETCH_INTERVAL: u64 = 3600;

/// Default exchange-rate feed endpoint
pub const DEFAULT_FEED_URL: &str = "https://www.boi.org.il/currency.xml";

/// File name of the locally cached feed document
pub const CACHE_FILE_NAME: &str = "currency.xml";
