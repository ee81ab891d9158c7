use daemon::{
    get_config_info, setup_logger, FeedClient, LogListener, RateStore, Scheduler, XmlFetcher,
};
use slog::{error, info, warn};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = get_config_info();
    let logger = setup_logger(&cli);

    info!(logger, "boi-rates daemon starting...");
    info!(logger, "  Feed URL: {}", cli.feed_url());
    info!(logger, "  Cache file: {}", cli.cache_file().display());
    info!(
        logger,
        "  Fetch interval: {} seconds",
        cli.fetch_interval().as_secs()
    );

    let fetcher = Arc::new(XmlFetcher::new(logger.clone(), cli.user_agent()));
    let client = FeedClient::new(logger.clone(), fetcher, cli.feed_url(), cli.cache_file());
    let store = Arc::new(RateStore::new());
    let listener = Arc::new(LogListener::new(logger.clone()));
    let scheduler = Scheduler::new(
        logger.clone(),
        client,
        Arc::clone(&store),
        listener,
        cli.fetch_interval(),
    );

    // Serve conversions from the cached document while the first fetch
    // is still in flight (or failing)
    match scheduler.warm_start() {
        Ok(()) => info!(
            logger,
            "warm start from cached feed, last update: {}",
            store.last_known_timestamp()
        ),
        Err(err) => info!(logger, "no usable cached feed: {}", err),
    }

    // First cycle runs before the recurring schedule so startup logs show
    // whether the initial load succeeded
    match scheduler.run_once().await {
        Ok(_) => info!(
            logger,
            "initial load complete, last update: {}",
            store.last_known_timestamp()
        ),
        Err(err) => {
            if store.snapshot().is_empty() {
                warn!(logger, "starting with an empty rate table");
            }
            error!(logger, "initial load failed: {}, will retry on schedule", err);
        }
    }

    scheduler.run().await;
    Ok(())
}
