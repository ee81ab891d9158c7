use std::sync::Arc;
use std::time::Duration;

use boi_rates_core::RatesError;
use slog::{debug, error, info, Logger};

use crate::{FeedClient, RateListener, RateStore};

/// What a single fetch-compare-update pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Timestamp changed: document persisted, store rebuilt, listener notified
    Updated,
    /// Timestamp unchanged: nothing persisted, rebuilt, or notified
    Unchanged,
}

/// Drives the recurring fetch-compare-update cycle.
///
/// One cycle is strictly sequential: fetch, compare, persist, rebuild,
/// notify. The recurring loop waits the configured interval from the end
/// of one cycle to the start of the next; there is no wall-clock
/// alignment. A failed cycle is logged and retried on the next tick
/// rather than taking the process down.
pub struct Scheduler {
    logger: Logger,
    client: FeedClient,
    store: Arc<RateStore>,
    listener: Arc<dyn RateListener>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        logger: Logger,
        client: FeedClient,
        store: Arc<RateStore>,
        listener: Arc<dyn RateListener>,
        interval: Duration,
    ) -> Self {
        Scheduler {
            logger,
            client,
            store,
            listener,
            interval,
        }
    }

    pub fn store(&self) -> &Arc<RateStore> {
        &self.store
    }

    /// Run one cycle synchronously. Public so the caller can run the first
    /// load before entering the recurring schedule and learn whether it
    /// succeeded.
    pub async fn run_once(&self) -> Result<CycleOutcome, RatesError> {
        let document = self.client.fetch_remote().await?;
        let held = self.store.last_known_timestamp();

        if !FeedClient::has_changed(&document.snapshot, &held) {
            debug!(
                self.logger,
                "feed unchanged, skipping rebuild";
                "last_update" => %held,
            );
            return Ok(CycleOutcome::Unchanged);
        }

        self.client.persist(&document)?;
        self.store
            .replace_all(&document.snapshot.last_update, document.snapshot.records);
        self.notify()?;
        Ok(CycleOutcome::Updated)
    }

    /// Populate the store from the cached document, if one is usable.
    /// Lets a restarted process serve conversions before the first
    /// network round-trip completes.
    pub fn warm_start(&self) -> Result<(), RatesError> {
        let snapshot = self.client.load_cached()?;
        self.store
            .replace_all(&snapshot.last_update, snapshot.records);
        self.notify()?;
        Ok(())
    }

    /// Recurring schedule: wait the interval, run a cycle, repeat forever.
    /// Call [`Scheduler::run_once`] first for the immediate startup load.
    pub async fn run(&self) {
        info!(
            self.logger,
            "entering refresh loop";
            "interval_secs" => self.interval.as_secs(),
        );
        loop {
            tokio::time::sleep(self.interval).await;
            match self.run_once().await {
                Ok(CycleOutcome::Updated) => {
                    info!(
                        self.logger,
                        "rates updated";
                        "last_update" => self.store.last_known_timestamp(),
                    );
                }
                Ok(CycleOutcome::Unchanged) => {
                    info!(self.logger, "rates unchanged");
                }
                Err(err) => {
                    error!(
                        self.logger,
                        "cycle failed, retrying after interval";
                        "error" => %err,
                    );
                }
            }
        }
    }

    // An empty refresh is a caller error by contract, never pushed.
    fn notify(&self) -> Result<(), RatesError> {
        let snapshot = self.store.snapshot();
        let rows = snapshot.rows();
        let keys = snapshot.keys();
        if rows.is_empty() || keys.is_empty() || snapshot.last_update().is_empty() {
            return Err(RatesError::Fetch(String::from(
                "refusing to push an empty refresh",
            )));
        }

        self.listener.on_table_refresh(&rows);
        self.listener.on_currency_list_refresh(&keys);
        self.listener.on_last_update_refresh(snapshot.last_update());
        Ok(())
    }
}
