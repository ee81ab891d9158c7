use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use boi_rates_core::{fs::write_atomic, RatesError};
use serde::Deserialize;
use serde_xml_rs::from_str;
use slog::{debug, info, Logger};

use crate::{RateRecord, XmlFetcher};

/// Parsed feed content, transient between fetch and store rebuild.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub last_update: String,
    pub records: Vec<RateRecord>,
}

/// A fetched document: the raw XML exactly as received (what gets cached)
/// plus its parsed form.
#[derive(Debug, Clone)]
pub struct FeedDocument {
    pub raw: String,
    pub snapshot: FeedSnapshot,
}

/// Transport seam between the feed client and the HTTP layer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_document(&self, url: &str) -> Result<String, anyhow::Error>;
}

#[async_trait]
impl FeedSource for XmlFetcher {
    async fn fetch_document(&self, url: &str) -> Result<String, anyhow::Error> {
        self.fetch_xml(url).await
    }
}

// Wire format of the bank's currency.xml: one LAST_UPDATE node and one
// CURRENCY element per listed currency. Parsing per record (rather than
// collecting parallel tag lists) makes field misalignment impossible.
#[derive(Debug, Deserialize)]
struct RawFeed {
    #[serde(rename = "LAST_UPDATE")]
    last_update: String,
    #[serde(rename = "CURRENCY", default)]
    currencies: Vec<RawCurrency>,
}

#[derive(Debug, Deserialize)]
struct RawCurrency {
    #[serde(rename = "NAME")]
    name: String,
    #[serde(rename = "UNIT")]
    unit: u32,
    #[serde(rename = "CURRENCYCODE")]
    code: String,
    #[serde(rename = "COUNTRY")]
    country: String,
    #[serde(rename = "RATE")]
    rate: f64,
    #[serde(rename = "CHANGE")]
    change: f64,
}

/// Parse and validate a feed document.
///
/// A document with zero currency records is malformed, not "no update":
/// an empty exchange table must never replace a populated one.
pub fn parse_feed(xml: &str) -> Result<FeedSnapshot, RatesError> {
    let raw: RawFeed =
        from_str(xml).map_err(|e| RatesError::Fetch(format!("malformed feed document: {e}")))?;

    if raw.last_update.trim().is_empty() {
        return Err(RatesError::Fetch(String::from(
            "feed document has an empty LAST_UPDATE",
        )));
    }
    if raw.currencies.is_empty() {
        return Err(RatesError::Fetch(String::from(
            "feed document contains no currency records",
        )));
    }

    let mut records = Vec::with_capacity(raw.currencies.len());
    for currency in raw.currencies {
        if currency.unit == 0 {
            return Err(RatesError::Fetch(format!(
                "currency {} has unit 0",
                currency.code
            )));
        }
        if !(currency.rate.is_finite() && currency.rate > 0.0) {
            return Err(RatesError::Fetch(format!(
                "currency {} has non-positive rate {}",
                currency.code, currency.rate
            )));
        }
        records.push(RateRecord {
            code: currency.code,
            country: currency.country,
            name: currency.name,
            rate: currency.rate,
            unit: currency.unit,
            change: currency.change,
        });
    }

    Ok(FeedSnapshot {
        last_update: raw.last_update,
        records,
    })
}

/// Fetches the remote feed and maintains the local cached copy.
pub struct FeedClient {
    logger: Logger,
    source: Arc<dyn FeedSource>,
    feed_url: String,
    cache_path: PathBuf,
}

impl FeedClient {
    pub fn new(
        logger: Logger,
        source: Arc<dyn FeedSource>,
        feed_url: String,
        cache_path: PathBuf,
    ) -> Self {
        FeedClient {
            logger,
            source,
            feed_url,
            cache_path,
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Fetch and parse the remote feed document.
    pub async fn fetch_remote(&self) -> Result<FeedDocument, RatesError> {
        debug!(self.logger, "fetching feed"; "url" => %self.feed_url);
        let raw = self
            .source
            .fetch_document(&self.feed_url)
            .await
            .map_err(|e| RatesError::Fetch(e.to_string()))?;
        let snapshot = parse_feed(&raw)?;
        Ok(FeedDocument { raw, snapshot })
    }

    /// True iff the fetched document carries a different timestamp than
    /// the data we currently hold.
    pub fn has_changed(snapshot: &FeedSnapshot, cached_timestamp: &str) -> bool {
        snapshot.last_update != cached_timestamp
    }

    /// Atomically write the raw document to the cache path. Only called
    /// when the timestamp changed.
    pub fn persist(&self, document: &FeedDocument) -> Result<(), RatesError> {
        if let Some(dir) = self.cache_path.parent() {
            fs::create_dir_all(dir)?;
        }
        write_atomic(&self.cache_path, document.raw.as_bytes())?;
        info!(
            self.logger,
            "cached feed document";
            "path" => %self.cache_path.display(),
            "last_update" => %document.snapshot.last_update,
        );
        Ok(())
    }

    /// Re-parse the last persisted document, for warm starts without a
    /// network round-trip.
    pub fn load_cached(&self) -> Result<FeedSnapshot, RatesError> {
        let raw = fs::read_to_string(&self.cache_path).map_err(|e| {
            RatesError::Load(format!(
                "cannot read {}: {e}",
                self.cache_path.display()
            ))
        })?;
        parse_feed(&raw).map_err(|e| RatesError::Load(format!("cached document invalid: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::o;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<CURRENCIES>
  <LAST_UPDATE>2024-01-01</LAST_UPDATE>
  <CURRENCY>
    <NAME>Dollar</NAME>
    <UNIT>1</UNIT>
    <CURRENCYCODE>USD</CURRENCYCODE>
    <COUNTRY>USA</COUNTRY>
    <RATE>3.60</RATE>
    <CHANGE>0.112</CHANGE>
  </CURRENCY>
  <CURRENCY>
    <NAME>Yen</NAME>
    <UNIT>100</UNIT>
    <CURRENCYCODE>JPY</CURRENCYCODE>
    <COUNTRY>Japan</COUNTRY>
    <RATE>2.44</RATE>
    <CHANGE>-0.31</CHANGE>
  </CURRENCY>
</CURRENCIES>"#;

    fn test_logger() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    fn scratch_cache(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "boi-rates-feed-{}-{}",
            std::process::id(),
            name
        ))
    }

    #[test]
    fn parses_a_well_formed_document() {
        let snapshot = parse_feed(SAMPLE_FEED).unwrap();
        assert_eq!(snapshot.last_update, "2024-01-01");
        assert_eq!(snapshot.records.len(), 2);

        let usd = &snapshot.records[0];
        assert_eq!(usd.key(), "USD - USA");
        assert_eq!(usd.name, "Dollar");
        assert_eq!(usd.rate, 3.60);
        assert_eq!(usd.unit, 1);
        assert_eq!(usd.change, 0.112);

        let jpy = &snapshot.records[1];
        assert_eq!(jpy.key(), "JPY - Japan");
        assert_eq!(jpy.unit, 100);
    }

    #[test]
    fn zero_records_is_malformed_not_no_update() {
        let xml = "<CURRENCIES><LAST_UPDATE>2024-01-01</LAST_UPDATE></CURRENCIES>";
        let err = parse_feed(xml).unwrap_err();
        assert!(matches!(err, RatesError::Fetch(_)), "{err}");
    }

    #[test]
    fn record_missing_a_field_is_malformed() {
        let xml = r#"<CURRENCIES>
  <LAST_UPDATE>2024-01-01</LAST_UPDATE>
  <CURRENCY>
    <NAME>Dollar</NAME>
    <CURRENCYCODE>USD</CURRENCYCODE>
    <COUNTRY>USA</COUNTRY>
    <RATE>3.60</RATE>
    <CHANGE>0.112</CHANGE>
  </CURRENCY>
</CURRENCIES>"#;
        assert!(parse_feed(xml).is_err());
    }

    #[test]
    fn zero_unit_is_malformed() {
        let xml = SAMPLE_FEED.replace("<UNIT>1</UNIT>", "<UNIT>0</UNIT>");
        let err = parse_feed(&xml).unwrap_err();
        assert!(err.to_string().contains("unit 0"), "{err}");
    }

    #[test]
    fn non_positive_rate_is_malformed() {
        let xml = SAMPLE_FEED.replace("<RATE>3.60</RATE>", "<RATE>-3.60</RATE>");
        assert!(parse_feed(&xml).is_err());
    }

    #[test]
    fn non_xml_body_is_malformed() {
        assert!(parse_feed("service temporarily unavailable").is_err());
    }

    #[test]
    fn has_changed_is_pure_timestamp_inequality() {
        let snapshot = parse_feed(SAMPLE_FEED).unwrap();
        assert!(FeedClient::has_changed(&snapshot, ""));
        assert!(FeedClient::has_changed(&snapshot, "2023-12-31"));
        assert!(!FeedClient::has_changed(&snapshot, "2024-01-01"));
    }

    #[test]
    fn persist_then_load_round_trips() {
        let cache = scratch_cache("roundtrip.xml");
        let source = Arc::new(MockFeedSource::new());
        let client = FeedClient::new(
            test_logger(),
            source,
            String::from("http://unused"),
            cache.clone(),
        );

        let snapshot = parse_feed(SAMPLE_FEED).unwrap();
        let document = FeedDocument {
            raw: SAMPLE_FEED.to_string(),
            snapshot: snapshot.clone(),
        };
        client.persist(&document).unwrap();

        let loaded = client.load_cached().unwrap();
        assert_eq!(loaded, snapshot);

        let _ = fs::remove_file(&cache);
    }

    #[test]
    fn load_cached_on_a_cold_cache_is_a_load_error() {
        let client = FeedClient::new(
            test_logger(),
            Arc::new(MockFeedSource::new()),
            String::from("http://unused"),
            scratch_cache("missing.xml"),
        );
        let err = client.load_cached().unwrap_err();
        assert!(matches!(err, RatesError::Load(_)), "{err}");
    }

    #[tokio::test]
    async fn fetch_remote_surfaces_transport_failures_as_fetch_errors() {
        let mut source = MockFeedSource::new();
        source
            .expect_fetch_document()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("connection refused")));

        let client = FeedClient::new(
            test_logger(),
            Arc::new(source),
            String::from("https://example.invalid/currency.xml"),
            scratch_cache("unused.xml"),
        );
        let err = client.fetch_remote().await.unwrap_err();
        assert!(matches!(err, RatesError::Fetch(_)), "{err}");
    }

    #[tokio::test]
    async fn fetch_remote_parses_the_body() {
        let mut source = MockFeedSource::new();
        source
            .expect_fetch_document()
            .times(1)
            .returning(|_| Ok(SAMPLE_FEED.to_string()));

        let client = FeedClient::new(
            test_logger(),
            Arc::new(source),
            String::from("https://example.invalid/currency.xml"),
            scratch_cache("unused2.xml"),
        );
        let document = client.fetch_remote().await.unwrap();
        assert_eq!(document.raw, SAMPLE_FEED);
        assert_eq!(document.snapshot.last_update, "2024-01-01");
    }
}
