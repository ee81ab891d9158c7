use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Composite key of the synthetic domestic-currency entry. The bank's feed
/// never lists the shekel itself, so the store injects it on every rebuild.
pub const BASE_CURRENCY_KEY: &str = "ILS - Israel";

/// One currency's rate as published by the bank.
///
/// `rate` is shekels per `unit` amount of the foreign currency; `unit` is a
/// divisor and is always positive. `name` and `change` are carried for
/// display only and never enter a calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct RateRecord {
    pub code: String,
    pub country: String,
    pub name: String,
    pub rate: f64,
    pub unit: u32,
    pub change: f64,
}

impl RateRecord {
    /// Composite lookup key, e.g. `"USD - USA"`.
    pub fn key(&self) -> String {
        format!("{} - {}", self.code, self.country)
    }

    fn base() -> Self {
        RateRecord {
            code: String::from("ILS"),
            country: String::from("Israel"),
            name: String::from("Shekel"),
            rate: 1.0,
            unit: 1,
            change: 0.0,
        }
    }
}

/// An immutable, fully-built view of the rate table.
///
/// Snapshots are built whole and swapped whole; a reader never observes a
/// table with some rows from one feed document and some from another.
#[derive(Debug, Default)]
pub struct RateSnapshot {
    last_update: String,
    rates: HashMap<String, RateRecord>,
}

impl RateSnapshot {
    pub fn get(&self, key: &str) -> Option<&RateRecord> {
        self.rates.get(key)
    }

    /// Timestamp of the feed document this snapshot was built from;
    /// empty for a store that has never been populated.
    pub fn last_update(&self) -> &str {
        &self.last_update
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// All currency keys, sorted for a stable presentation order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.rates.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// All records, sorted by key for a stable presentation order.
    pub fn rows(&self) -> Vec<RateRecord> {
        let mut rows: Vec<RateRecord> = self.rates.values().cloned().collect();
        rows.sort_by_key(|r| r.key());
        rows
    }
}

/// The authoritative in-memory rate table.
///
/// Writers (the refresh cycle) build a fresh [`RateSnapshot`] and swap the
/// shared `Arc` under a short lock; readers clone the `Arc` and work on an
/// immutable snapshot without holding any lock. A reader that starts after
/// a rebuild completes is guaranteed to see that rebuild's data or newer.
#[derive(Debug)]
pub struct RateStore {
    inner: RwLock<Arc<RateSnapshot>>,
}

impl Default for RateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RateStore {
    pub fn new() -> Self {
        RateStore {
            inner: RwLock::new(Arc::new(RateSnapshot::default())),
        }
    }

    /// Current snapshot. Cheap: clones an `Arc`, never the table.
    ///
    /// The lock guards nothing but an `Arc` swap, so a poisoned guard
    /// still holds a fully-formed snapshot; recover it rather than panic.
    pub fn snapshot(&self) -> Arc<RateSnapshot> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Read-only lookup; `None` for a key the store does not hold.
    pub fn get(&self, key: &str) -> Option<RateRecord> {
        self.snapshot().get(key).cloned()
    }

    /// Timestamp of the data currently held, empty before the first
    /// successful rebuild. The feed client compares against this for
    /// change detection.
    pub fn last_known_timestamp(&self) -> String {
        self.snapshot().last_update().to_string()
    }

    /// Atomically replace the whole table with `records`, re-injecting the
    /// domestic base-currency entry. Readers in flight keep the snapshot
    /// they already hold; new readers see the replacement in full.
    pub fn replace_all(&self, last_update: &str, records: Vec<RateRecord>) {
        let mut rates: HashMap<String, RateRecord> = HashMap::with_capacity(records.len() + 1);
        for record in records {
            rates.insert(record.key(), record);
        }
        let base = RateRecord::base();
        rates.insert(base.key(), base);

        let snapshot = Arc::new(RateSnapshot {
            last_update: last_update.to_string(),
            rates,
        });
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}
