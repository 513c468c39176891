//! Per-country asset pipeline.
//!
//! For every storefront: look up metadata, pick the language and slug,
//! download the logo, resolve and download screenshots, and record a
//! [`CountryResult`]. Countries run one after another with a fixed pause in
//! between. Nothing in here fails a run; a country that yields nothing simply
//! has an empty row in the report.

use crate::api::{MetadataLookup, lookup_or_none};
use crate::download::Downloader;
use crate::models::{AppMetadata, AssetRequest, CountryResult};
use crate::render::PageRenderer;
use crate::scrapers::resolver::ScreenshotResolver;
use crate::scrapers::storefront::{build_app_store_url, extract_slug};
use crate::settings::Settings;
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use tokio::time::sleep;
use tracing::{error, info, instrument};

/// Display name for the app: explicit name, else the storefront title,
/// else `app_<id>`.
pub fn resolve_app_name(explicit: Option<&str>, metadata: Option<&AppMetadata>, app_id: &str) -> String {
    explicit
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .or_else(|| {
            metadata
                .and_then(|m| m.track_name.as_deref())
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("app_{app_id}"))
}

pub struct AssetPipeline<'a, L, R> {
    lookup: &'a L,
    resolver: ScreenshotResolver<'a, R>,
    downloader: Downloader,
    settings: &'a Settings,
    /// Language overrides from the command line, keyed by country code.
    language_overrides: &'a HashMap<String, String>,
}

impl<'a, L, R> AssetPipeline<'a, L, R>
where
    L: MetadataLookup,
    R: PageRenderer,
{
    pub fn new(
        lookup: &'a L,
        renderer: &'a R,
        downloader: Downloader,
        settings: &'a Settings,
        language_overrides: &'a HashMap<String, String>,
    ) -> Self {
        AssetPipeline {
            lookup,
            resolver: ScreenshotResolver::new(renderer, settings),
            downloader,
            settings,
            language_overrides,
        }
    }

    /// Process `countries` in order, pausing between them.
    ///
    /// `prefetched` is metadata already looked up for the first country and
    /// saves a second lookup there.
    #[instrument(level = "info", skip_all, fields(%app_id, countries = countries.len()))]
    pub async fn download_all_countries(
        &self,
        app_id: &str,
        countries: &[String],
        app_dir: &Path,
        mut prefetched: Option<AppMetadata>,
    ) -> Vec<CountryResult> {
        let mut results = Vec::with_capacity(countries.len());

        for (idx, country) in countries.iter().enumerate() {
            if idx > 0 && !self.settings.country_delay.is_zero() {
                sleep(self.settings.country_delay).await;
            }
            info!(
                progress = %format!("{}/{}", idx + 1, countries.len()),
                %country,
                "Processing country"
            );
            let result = self
                .download_country(app_id, country, app_dir, prefetched.take())
                .await;
            info!(
                %country,
                logo = result.logo_path.is_some(),
                screenshots = result.screenshot_count,
                "Country finished"
            );
            results.push(result);
        }
        results
    }

    /// Download the logo and screenshots of one storefront into
    /// `<app_dir>/<country>/`.
    #[instrument(level = "info", skip(self, app_dir, prefetched))]
    pub async fn download_country(
        &self,
        app_id: &str,
        country: &str,
        app_dir: &Path,
        prefetched: Option<AppMetadata>,
    ) -> CountryResult {
        let country = country.to_lowercase();
        let country_dir = app_dir.join(&country);
        let override_lang = self.language_overrides.get(&country).map(String::as_str);
        let language = self.settings.resolve_language(&country, override_lang);

        let mut result = CountryResult {
            country: country.clone(),
            language: Some(language.clone()),
            ..Default::default()
        };

        if let Err(e) = fs::create_dir_all(&country_dir).await {
            error!(dir = %country_dir.display(), error = %e, "Cannot create country directory");
            result.app_store_url = build_app_store_url(app_id, &country, None, Some(&language), None);
            return result;
        }

        let metadata = match prefetched {
            Some(m) => Some(m),
            None => lookup_or_none(self.lookup, app_id, &country).await,
        };
        let slug = extract_slug(metadata.as_ref());
        result.app_store_url =
            build_app_store_url(app_id, &country, slug.as_deref(), Some(&language), None);

        if let Some(logo) = self
            .downloader
            .download_logo(metadata.as_ref(), &country, &country_dir)
            .await
        {
            result.logo_path = Some(logo.display().to_string());
        }

        let request = AssetRequest {
            app_id: app_id.to_string(),
            country: country.clone(),
            language: Some(language),
            slug,
        };
        let urls = self
            .resolver
            .resolve(&request, metadata.as_ref(), &country_dir)
            .await;
        if urls.is_empty() {
            info!("No screenshots found for this storefront");
        }

        let shots = self.downloader.download_screenshots(&urls, &country_dir).await;
        result.screenshot_paths = shots.iter().map(|p| p.display().to_string()).collect();
        result.screenshot_count = result.screenshot_paths.len();
        result
    }
}
