//! Error taxonomy for the rate engine
//!
//! The first three variants belong to the refresh cycle and are handled by
//! the daemon's failure policy (log, wait out the interval, retry). The
//! last two are returned to conversion callers and are always recoverable.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RatesError {
    /// Network or transport failure, or a malformed feed document
    #[error("feed fetch failed: {0}")]
    Fetch(String),

    /// Failure writing the cached feed document
    #[error("cache persist failed: {0}")]
    Persist(#[from] std::io::Error),

    /// Failure reading or parsing the cached feed document
    #[error("cache load failed: {0}")]
    Load(String),

    /// A conversion referenced a currency key the store does not hold
    #[error("unknown currency: {key}")]
    UnknownCurrency { key: String },

    /// A conversion amount was negative or NaN
    #[error("invalid amount: {amount}")]
    InvalidInput { amount: f64 },
}
