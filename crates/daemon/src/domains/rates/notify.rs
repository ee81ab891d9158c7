use slog::{info, Logger};

use crate::RateRecord;

/// Push boundary to the presentation layer.
///
/// The scheduler calls these after every successful rebuild, always in
/// declaration order: table rows, then currency keys, then the update
/// timestamp. Implementations must apply the payload without blocking the
/// refresh cycle; anything slow belongs on the implementor's own thread.
/// Payloads are guaranteed non-empty -- the scheduler refuses to push an
/// empty refresh.
#[cfg_attr(test, mockall::automock)]
pub trait RateListener: Send + Sync {
    fn on_table_refresh(&self, rows: &[RateRecord]);
    fn on_currency_list_refresh(&self, keys: &[String]);
    fn on_last_update_refresh(&self, timestamp: &str);
}

/// Listener used by the daemon binary: logs each refresh. Stands in for a
/// UI when the daemon runs headless.
pub struct LogListener {
    logger: Logger,
}

impl LogListener {
    pub fn new(logger: Logger) -> Self {
        LogListener { logger }
    }
}

impl RateListener for LogListener {
    fn on_table_refresh(&self, rows: &[RateRecord]) {
        info!(self.logger, "rate table refreshed"; "rows" => rows.len());
    }

    fn on_currency_list_refresh(&self, keys: &[String]) {
        info!(self.logger, "currency list refreshed"; "currencies" => keys.len());
    }

    fn on_last_update_refresh(&self, timestamp: &str) {
        info!(self.logger, "feed timestamp refreshed"; "last_update" => timestamp);
    }
}
