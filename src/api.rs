//! App metadata lookup with exponential backoff retry logic.
//!
//! This module talks to the public iTunes lookup endpoint
//! (`GET /lookup?id=<id>&country=<cc>&entity=software`) and returns the first
//! entry of its `results` array.
//!
//! # Architecture
//!
//! The module uses a trait-based design for flexibility:
//! - [`MetadataLookup`]: Core trait defining an async metadata lookup
//! - [`ItunesLookup`]: `reqwest` implementation against the live endpoint
//! - [`RetryLookup`]: Decorator that adds retry logic to any `MetadataLookup`
//!
//! # Retry Strategy
//!
//! - Transport errors and non-success statuses are retried
//! - "No such app in this storefront" is an answer, not an error, and is not retried
//! - Exponential backoff starting at 1 second, capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::error::{AssetError, Result};
use crate::models::{AppMetadata, LookupResponse};
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

pub const LOOKUP_ENDPOINT: &str = "https://itunes.apple.com/lookup";

/// Trait for async app metadata lookups.
pub trait MetadataLookup {
    /// Look up `app_id` in the `country` storefront.
    ///
    /// Returns `Ok(None)` when the storefront has no such app.
    async fn lookup(&self, app_id: &str, country: &str) -> Result<Option<AppMetadata>>;
}

/// Lookup client for the iTunes endpoint.
#[derive(Debug, Clone)]
pub struct ItunesLookup {
    client: reqwest::Client,
    endpoint: String,
    timeout: StdDuration,
}

impl ItunesLookup {
    pub fn new(client: reqwest::Client, timeout: StdDuration) -> Self {
        Self {
            client,
            endpoint: LOOKUP_ENDPOINT.to_string(),
            timeout,
        }
    }
}

impl MetadataLookup for ItunesLookup {
    #[instrument(level = "info", skip_all, fields(%app_id, %country))]
    async fn lookup(&self, app_id: &str, country: &str) -> Result<Option<AppMetadata>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("id", app_id), ("country", country), ("entity", "software")])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::HttpStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        // The endpoint answers with text/javascript, so parse the body ourselves
        let body = response.text().await?;
        parse_lookup_body(&body)
    }
}

/// First result of a lookup response body, if any.
pub fn parse_lookup_body(body: &str) -> Result<Option<AppMetadata>> {
    let parsed: LookupResponse = serde_json::from_str(body)?;
    Ok(parsed.results.into_iter().next())
}

/// Wrapper that adds exponential backoff retry logic to any [`MetadataLookup`].
///
/// # Backoff Strategy
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryLookup<T> {
    /// The underlying lookup client to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryLookup<T>
where
    T: MetadataLookup,
{
    /// Create a new retry wrapper around an existing [`MetadataLookup`].
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = ItunesLookup::new(reqwest::Client::new(), Duration::from_secs(15));
    /// let lookup = RetryLookup::new(client, 2, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryLookup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryLookup")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> MetadataLookup for RetryLookup<T>
where
    T: MetadataLookup,
{
    #[instrument(level = "info", skip_all, fields(%app_id, %country))]
    async fn lookup(&self, app_id: &str, country: &str) -> Result<Option<AppMetadata>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.lookup(app_id, country).await {
                Ok(found) => return Ok(found),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "lookup() exhausted retries"
                        );
                        return Err(e);
                    }

                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "lookup() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Look up metadata, logging and swallowing every failure.
///
/// This is what the per-country pipeline uses: a missing app, a dead network
/// or a malformed body all mean "no metadata for this storefront".
#[instrument(level = "info", skip(lookup))]
pub async fn lookup_or_none<L: MetadataLookup>(
    lookup: &L,
    app_id: &str,
    country: &str,
) -> Option<AppMetadata> {
    match lookup.lookup(app_id, country).await {
        Ok(Some(metadata)) => {
            info!(track_name = ?metadata.track_name, "Found app metadata");
            Some(metadata)
        }
        Ok(None) => {
            let e = AssetError::MetadataNotFound {
                country: country.to_string(),
            };
            warn!(error = %e, "App not found (the ID may be wrong for this storefront)");
            None
        }
        Err(e) => {
            error!(error = %e, "Metadata lookup failed");
            None
        }
    }
}
