use boi_rates_core::RatesError;

use crate::{RateSnapshot, RateStore};

/// Convert `amount` from one currency to another via the domestic base.
///
/// The feed's convention is shekels per `unit` amount of foreign currency,
/// so `amount * rate(from) / unit(from)` lands in shekels and dividing by
/// `rate(to)` completes the hop. Plain IEEE-754 f64 arithmetic, no
/// rounding; formatting for display is the caller's concern.
///
/// A negative or NaN amount is rejected as [`RatesError::InvalidInput`] --
/// including the historical `-1.0` "parse failed" sentinel, which gets no
/// special treatment. An absent key (always the case before the first
/// successful refresh) is [`RatesError::UnknownCurrency`].
pub fn convert(
    snapshot: &RateSnapshot,
    from: &str,
    to: &str,
    amount: f64,
) -> Result<f64, RatesError> {
    if amount.is_nan() || amount < 0.0 {
        return Err(RatesError::InvalidInput { amount });
    }

    let from_record = snapshot
        .get(from)
        .ok_or_else(|| RatesError::UnknownCurrency {
            key: from.to_string(),
        })?;
    let to_record = snapshot.get(to).ok_or_else(|| RatesError::UnknownCurrency {
        key: to.to_string(),
    })?;

    let middle = amount * from_record.rate / f64::from(from_record.unit);
    Ok(middle / to_record.rate)
}

impl RateStore {
    /// Conversion entry point for callers that hold the store. Takes a
    /// fresh snapshot, so a call issued after a refresh completes sees
    /// that refresh's data or newer.
    pub fn convert(&self, from: &str, to: &str, amount: f64) -> Result<f64, RatesError> {
        convert(&self.snapshot(), from, to, amount)
    }
}
