//! Data models for lookup metadata, screenshot candidates and reports.
//!
//! This module defines the core data structures used throughout the application:
//! - [`AppMetadata`]: one entry of the iTunes lookup `results` array
//! - [`AssetRequest`]: the app/country/language combination being resolved
//! - [`Candidate`]: a scored URL parsed out of a responsive-image `srcset`
//! - [`CountryResult`], [`AppInfo`], [`DownloadReport`]: the JSON report
//!
//! The lookup API uses camelCase keys, so [`AppMetadata`] renames its fields
//! instead of using `#[allow(non_snake_case)]`.

use serde::{Deserialize, Serialize};

/// Response envelope of the lookup endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub results: Vec<AppMetadata>,
}

/// App metadata as returned by the lookup API.
///
/// Only the keys this tool reads are modelled; everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadata {
    pub track_name: Option<String>,
    pub track_view_url: Option<String>,
    /// Ordered iPhone screenshot URLs, usually the English storefront set.
    #[serde(default)]
    pub screenshot_urls: Vec<String>,
    pub artwork_url512: Option<String>,
    pub artwork_url100: Option<String>,
    pub artwork_url60: Option<String>,
    pub artist_name: Option<String>,
    pub bundle_id: Option<String>,
    pub version: Option<String>,
    pub formatted_price: Option<String>,
    pub average_user_rating: Option<f64>,
    pub user_rating_count: Option<u64>,
    pub primary_genre_name: Option<String>,
    pub release_date: Option<String>,
}

impl AppMetadata {
    /// Highest resolution artwork URL available, 512 first.
    pub fn best_artwork_url(&self) -> Option<&str> {
        [&self.artwork_url512, &self.artwork_url100, &self.artwork_url60]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|u| !u.is_empty())
    }
}

/// One app/country combination to resolve screenshots for.
#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub app_id: String,
    pub country: String,
    pub language: Option<String>,
    pub slug: Option<String>,
}

impl AssetRequest {
    /// `true` when a language other than English was requested.
    ///
    /// Lookup API screenshots are not localized, so such requests prefer
    /// scraped results.
    pub fn wants_non_english(&self) -> bool {
        self.language
            .as_deref()
            .is_some_and(|l| !l.is_empty() && !l.to_lowercase().starts_with("en"))
    }
}

/// A URL parsed from a `srcset` entry.
///
/// `score` is the width descriptor, or the density descriptor times 1000.
/// Entries without a usable descriptor score 0. `order` is the position in the
/// source attribute and breaks ties.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub score: f64,
    pub order: usize,
    pub url: String,
}

/// Per-country row of the download report.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CountryResult {
    pub country: String,
    pub language: Option<String>,
    pub app_store_url: String,
    pub logo_path: Option<String>,
    pub screenshot_paths: Vec<String>,
    pub screenshot_count: usize,
}

impl CountryResult {
    pub fn has_assets(&self) -> bool {
        self.logo_path.is_some() || !self.screenshot_paths.is_empty()
    }
}

/// Descriptive app fields copied from the primary country's metadata.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppInfo {
    pub developer: Option<String>,
    pub bundle_id: Option<String>,
    pub version: Option<String>,
    pub price: Option<String>,
    pub rating: Option<f64>,
    pub rating_count: Option<u64>,
    pub primary_genre: Option<String>,
    pub release_date: Option<String>,
}

impl From<&AppMetadata> for AppInfo {
    fn from(m: &AppMetadata) -> Self {
        AppInfo {
            developer: m.artist_name.clone(),
            bundle_id: m.bundle_id.clone(),
            version: m.version.clone(),
            price: Some(
                m.formatted_price
                    .clone()
                    .unwrap_or_else(|| "Free".to_string()),
            ),
            rating: m.average_user_rating,
            rating_count: m.user_rating_count,
            primary_genre: m.primary_genre_name.clone(),
            release_date: m.release_date.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReportSummary {
    pub total_countries: usize,
    pub total_logos_downloaded: usize,
    pub total_screenshots_downloaded: usize,
}

impl ReportSummary {
    pub fn from_results(results: &[CountryResult]) -> Self {
        ReportSummary {
            total_countries: results.len(),
            total_logos_downloaded: results.iter().filter(|r| r.logo_path.is_some()).count(),
            total_screenshots_downloaded: results.iter().map(|r| r.screenshot_count).sum(),
        }
    }
}

/// The `download_report.json` document written at the app directory root.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadReport {
    pub app_id: String,
    pub app_name: String,
    pub app_info: AppInfo,
    /// UTC timestamp in RFC 3339 format.
    pub downloaded_at: String,
    pub summary: ReportSummary,
    pub countries: Vec<CountryResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_response_deserialization() {
        let json = r#"{
            "resultCount": 1,
            "results": [{
                "trackName": "Example",
                "trackViewUrl": "https://apps.apple.com/us/app/example/id123?uo=4",
                "screenshotUrls": ["https://is1-ssl.mzstatic.com/a/392x696bb.jpg"],
                "artworkUrl512": "https://is1-ssl.mzstatic.com/a/512x512bb.jpg",
                "averageUserRating": 4.5,
                "userRatingCount": 1200,
                "kind": "software"
            }]
        }"#;

        let response: LookupResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.results.len(), 1);
        let m = &response.results[0];
        assert_eq!(m.track_name.as_deref(), Some("Example"));
        assert_eq!(m.screenshot_urls.len(), 1);
        assert_eq!(m.average_user_rating, Some(4.5));
        assert_eq!(m.user_rating_count, Some(1200));
    }

    #[test]
    fn test_lookup_response_missing_results() {
        let response: LookupResponse = serde_json::from_str(r#"{"resultCount": 0}"#).unwrap();
        assert!(response.results.is_empty());
    }

    #[test]
    fn test_best_artwork_url_prefers_512() {
        let m = AppMetadata {
            artwork_url512: Some("big".to_string()),
            artwork_url100: Some("medium".to_string()),
            ..Default::default()
        };
        assert_eq!(m.best_artwork_url(), Some("big"));

        let m = AppMetadata {
            artwork_url60: Some("small".to_string()),
            ..Default::default()
        };
        assert_eq!(m.best_artwork_url(), Some("small"));
        assert_eq!(AppMetadata::default().best_artwork_url(), None);
    }

    #[test]
    fn test_wants_non_english() {
        let mut req = AssetRequest {
            app_id: "1".to_string(),
            country: "tr".to_string(),
            language: Some("tr".to_string()),
            slug: None,
        };
        assert!(req.wants_non_english());
        req.language = Some("EN-gb".to_string());
        assert!(!req.wants_non_english());
        req.language = None;
        assert!(!req.wants_non_english());
    }

    #[test]
    fn test_app_info_defaults_price_to_free() {
        let info = AppInfo::from(&AppMetadata::default());
        assert_eq!(info.price.as_deref(), Some("Free"));
        assert!(info.developer.is_none());
    }

    #[test]
    fn test_summary_counts() {
        let results = vec![
            CountryResult {
                country: "us".to_string(),
                logo_path: Some("logo_us.jpg".to_string()),
                screenshot_paths: vec!["a".to_string(), "b".to_string()],
                screenshot_count: 2,
                ..Default::default()
            },
            CountryResult {
                country: "tr".to_string(),
                ..Default::default()
            },
        ];
        let summary = ReportSummary::from_results(&results);
        assert_eq!(summary.total_countries, 2);
        assert_eq!(summary.total_logos_downloaded, 1);
        assert_eq!(summary.total_screenshots_downloaded, 2);
        assert!(results[0].has_assets());
        assert!(!results[1].has_assets());
    }
}
