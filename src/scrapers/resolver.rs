//! Screenshot URL resolution for one app/country pair.
//!
//! The lookup API's `screenshotUrls` are used first. The storefront page is
//! rendered and run through the extraction cascade when the API had nothing
//! or when a non-English language was requested, since API screenshots are
//! not localized.

use crate::error::AssetError;
use crate::models::{AppMetadata, AssetRequest};
use crate::render::{PageAction, PageRenderer, RenderRequest};
use crate::scrapers::srcset::normalize_image_url;
use crate::scrapers::stages::{MAX_SCREENSHOTS, all_cdn_urls, run_cascade};
use crate::scrapers::storefront::build_app_store_url;
use crate::settings::Settings;
use itertools::Itertools;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

pub const DEBUG_HTML_FILE: &str = "debug_html_full.txt";
pub const DEBUG_URLS_FILE: &str = "debug_urls.txt";

/// Screenshot URLs from lookup metadata: normalized, non-empty, first ten.
pub fn api_stage(metadata: Option<&AppMetadata>) -> Vec<String> {
    metadata
        .map(|m| {
            m.screenshot_urls
                .iter()
                .map(|u| normalize_image_url(u))
                .filter(|u| !u.is_empty())
                .take(MAX_SCREENSHOTS)
                .collect()
        })
        .unwrap_or_default()
}

/// Combine API and scraped URLs.
///
/// For non-English requests a successful scrape replaces the API results
/// outright. Otherwise API URLs come first and duplicates are dropped,
/// keeping first-seen order.
pub fn merge_results(api: Vec<String>, scraped: Vec<String>, non_english: bool) -> Vec<String> {
    if non_english {
        return if scraped.is_empty() { api } else { scraped };
    }
    api.into_iter()
        .chain(scraped)
        .unique()
        .take(MAX_SCREENSHOTS)
        .collect()
}

/// Resolves screenshot URLs, rendering storefront pages with `R`.
#[derive(Debug)]
pub struct ScreenshotResolver<'a, R> {
    renderer: &'a R,
    settle: Duration,
    timeout: Duration,
}

impl<'a, R: PageRenderer> ScreenshotResolver<'a, R> {
    pub fn new(renderer: &'a R, settings: &Settings) -> Self {
        ScreenshotResolver {
            renderer,
            settle: settings.settle_delay,
            timeout: settings.render_timeout,
        }
    }

    /// Up to ten screenshot URLs for `request`, or none.
    ///
    /// `country_dir` receives the debug dump when scraping finds nothing.
    #[instrument(level = "info", skip_all, fields(country = %request.country, language = ?request.language))]
    pub async fn resolve(
        &self,
        request: &AssetRequest,
        metadata: Option<&AppMetadata>,
        country_dir: &Path,
    ) -> Vec<String> {
        let api = api_stage(metadata);
        let non_english = request.wants_non_english();
        if !api.is_empty() {
            info!(count = api.len(), "Lookup API provided screenshots");
        }

        let scraped = if non_english || api.is_empty() {
            self.scrape(request, country_dir).await
        } else {
            Vec::new()
        };

        let merged = merge_results(api, scraped, non_english);
        info!(count = merged.len(), "Resolved screenshot URLs");
        merged
    }

    fn render_request(&self, request: &AssetRequest) -> RenderRequest {
        let url = build_app_store_url(
            &request.app_id,
            &request.country,
            request.slug.as_deref(),
            request.language.as_deref(),
            Some("iphone"),
        );
        let mut render = RenderRequest::new(url);
        if let Some(lang) = request.language.as_deref().filter(|l| !l.is_empty()) {
            render
                .headers
                .push(("Accept-Language".to_string(), lang.replace('_', "-")));
        }
        render.actions = PageAction::lazy_load_sequence();
        render.settle = self.settle;
        render.timeout = self.timeout;
        render
    }

    /// Render the storefront page and run the extraction cascade over it.
    async fn scrape(&self, request: &AssetRequest, country_dir: &Path) -> Vec<String> {
        let render = self.render_request(request);
        info!(url = %render.url, "Scraping storefront page");

        let page = match self.renderer.render(&render).await {
            Ok(page) if page.success => page,
            Ok(_) => {
                warn!(url = %render.url, "Storefront page did not load");
                return Vec::new();
            }
            Err(e) => {
                warn!(url = %render.url, error = %e, "Storefront render failed");
                return Vec::new();
            }
        };

        match run_cascade(&page.html) {
            Some(extraction) => {
                debug!(stage = extraction.stage, "Scrape succeeded");
                extraction.urls
            }
            None => {
                warn!(error = %AssetError::NothingExtracted, "Writing debug files");
                write_debug_files(country_dir, &page.html).await;
                Vec::new()
            }
        }
    }
}

async fn write_debug_files(country_dir: &Path, html: &str) {
    let urls = all_cdn_urls(html);
    let urls_body: String = urls.iter().map(|u| format!("{u}\n")).collect();

    let writes = [
        (country_dir.join(DEBUG_HTML_FILE), html.to_string()),
        (country_dir.join(DEBUG_URLS_FILE), urls_body),
    ];
    if let Err(e) = fs::create_dir_all(country_dir).await {
        warn!(dir = %country_dir.display(), error = %e, "Cannot create debug directory");
        return;
    }
    for (path, body) in writes {
        match fs::write(&path, body).await {
            Ok(()) => info!(path = %path.display(), "Wrote debug file"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to write debug file"),
        }
    }
}
