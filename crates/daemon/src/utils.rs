use std::path::PathBuf;
use std::time::Duration;
use std::{env, fmt};

use anyhow::{anyhow, Error};
use boi_rates_core::{
    find_config_file, get_xdg_cache_dir, load_config, ConfigSource, CACHE_FILE_NAME,
    DEFAULT_FEED_URL, DEFAULT_FETCH_INTERVAL,
};
use clap::Parser;
use reqwest::Client;
use reqwest_middleware::ClientBuilder;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use slog::{debug, o, Drain, Level, Logger};

#[derive(Parser, Clone, Debug, serde::Deserialize, Default)]
#[command(
    author,
    version,
    about = "boi-rates daemon - keeps a local exchange-rate snapshot in sync with the bank feed"
)]
pub struct Cli {
    /// Path to config file (TOML format)
    /// Searched in order: this flag, $BOI_RATES_CONFIG, ./boi-rates.toml,
    /// $XDG_CONFIG_HOME/boi-rates/boi-rates.toml, /etc/boi-rates/boi-rates.toml
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, env = "BOI_RATES_LEVEL")]
    pub level: Option<String>,

    /// Exchange-rate feed URL
    #[arg(short, long, env = "BOI_RATES_FEED_URL")]
    pub feed_url: Option<String>,

    /// Directory holding the cached feed document
    #[arg(short = 'd', long, env = "BOI_RATES_CACHE_DIR")]
    pub cache_dir: Option<String>,

    /// Fetch interval in seconds (the bank publishes at most daily)
    #[arg(short = 'i', long, env = "BOI_RATES_FETCH_INTERVAL")]
    pub fetch_interval: Option<u64>,

    /// HTTP User-Agent header for feed requests
    #[arg(short, long, env = "BOI_RATES_USER_AGENT")]
    pub user_agent: Option<String>,
}

impl Cli {
    /// Get the effective configuration value with defaults
    pub fn feed_url(&self) -> String {
        self.feed_url
            .clone()
            .unwrap_or_else(|| DEFAULT_FEED_URL.to_string())
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(get_xdg_cache_dir)
    }

    /// Full path of the cached feed document
    pub fn cache_file(&self) -> PathBuf {
        self.cache_dir().join(CACHE_FILE_NAME)
    }

    pub fn fetch_interval(&self) -> Duration {
        // A zero interval would turn the refresh loop into a hot spin
        let secs = self
            .fetch_interval
            .unwrap_or(DEFAULT_FETCH_INTERVAL)
            .max(1);
        Duration::from_secs(secs)
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("boi-rates-daemon/{}", env!("CARGO_PKG_VERSION")))
    }
}

/// Load configuration from CLI args, config file, and environment
pub fn get_config_info() -> Cli {
    let cli_args = Cli::parse();

    // Determine config file path
    let source = if let Some(ref path) = cli_args.config {
        ConfigSource::Explicit(path.into())
    } else {
        find_config_file("BOI_RATES_CONFIG", "boi-rates.toml")
    };

    // Load from config file
    let file_config: Cli = load_config(&source).unwrap_or_default();

    // CLI args override file config (env vars are handled by clap)
    Cli {
        config: cli_args.config,
        level: cli_args.level.or(file_config.level),
        feed_url: cli_args.feed_url.or(file_config.feed_url),
        cache_dir: cli_args.cache_dir.or(file_config.cache_dir),
        fetch_interval: cli_args.fetch_interval.or(file_config.fetch_interval),
        user_agent: cli_args.user_agent.or(file_config.user_agent),
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::Trace,
        "debug" => Level::Debug,
        "info" => Level::Info,
        "warn" => Level::Warning,
        "error" => Level::Error,
        _ => Level::Info,
    }
}

pub fn setup_logger(cli: &Cli) -> Logger {
    let log_level = match cli.level.as_ref() {
        Some(level) => parse_level(level),
        None => parse_level(&env::var("RUST_LOG").unwrap_or_default()),
    };

    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::CompactFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = drain.filter_level(log_level).fuse();
    slog::Logger::root(drain, o!("version" => env!("CARGO_PKG_VERSION")))
}

/// HTTP fetcher for the feed document: retrying client with a fixed
/// timeout and a configurable User-Agent.
pub struct XmlFetcher {
    logger: Logger,
    user_agent: String,
}

impl fmt::Debug for XmlFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlFetcher")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl XmlFetcher {
    pub fn new(logger: Logger, user_agent: String) -> XmlFetcher {
        Self { logger, user_agent }
    }

    pub async fn fetch_xml(&self, url: &str) -> Result<String, Error> {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(Client::builder().user_agent(&self.user_agent).build()?)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        debug!(self.logger, "requesting: {}", url);
        let response = client
            .get(url)
            .timeout(Duration::from_secs(20))
            .send()
            .await
            .map_err(|e| anyhow!("error sending request: {}", e))?;
        if !response.status().is_success() {
            return Err(anyhow!("feed endpoint returned {}", response.status()));
        }
        match response.text().await {
            Ok(xml_content) => Ok(xml_content),
            Err(e) => Err(anyhow!("error reading body of request: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_when_nothing_is_configured() {
        let cli = Cli::default();
        assert_eq!(cli.feed_url(), DEFAULT_FEED_URL);
        assert_eq!(cli.fetch_interval(), Duration::from_secs(3600));
        assert!(cli.cache_file().ends_with("currency.xml"));
        assert!(cli.user_agent().starts_with("boi-rates-daemon/"));
    }

    #[test]
    fn test_zero_fetch_interval_is_clamped() {
        let cli = Cli {
            fetch_interval: Some(0),
            ..Cli::default()
        };
        assert_eq!(cli.fetch_interval(), Duration::from_secs(1));

        let cli = Cli {
            fetch_interval: Some(60),
            ..Cli::default()
        };
        assert_eq!(cli.fetch_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_level_defaults_to_info() {
        assert_eq!(parse_level("debug"), Level::Debug);
        assert_eq!(parse_level("WARN"), Level::Warning);
        assert_eq!(parse_level("gibberish"), Level::Info);
        assert_eq!(parse_level(""), Level::Info);
    }
}
