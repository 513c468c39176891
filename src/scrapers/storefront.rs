//! App Store storefront page URLs.
//!
//! # URL Pattern
//!
//! `https://apps.apple.com/<country>/app/<slug>/id<appId>?l=<language>&platform=<platform>`
//!
//! The slug segment is dropped when unknown, and the query only carries the
//! parameters that are set.

use crate::models::AppMetadata;
use crate::utils::slugify;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

pub const STOREFRONT_HOST: &str = "apps.apple.com";

static TRACK_URL_SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/app/([^/]+)/id\d+").expect("static slug regex"));

/// Slug from `trackViewUrl`, else derived from `trackName`.
pub fn extract_slug(metadata: Option<&AppMetadata>) -> Option<String> {
    let metadata = metadata?;
    if let Some(caps) = metadata
        .track_view_url
        .as_deref()
        .and_then(|u| TRACK_URL_SLUG.captures(u))
    {
        return Some(caps[1].to_string());
    }
    metadata.track_name.as_deref().and_then(slugify)
}

/// Build the storefront page URL for an app.
pub fn build_app_store_url(
    app_id: &str,
    country: &str,
    slug: Option<&str>,
    language: Option<&str>,
    platform: Option<&str>,
) -> String {
    let country = match country.trim() {
        "" => "us".to_string(),
        c => c.to_lowercase(),
    };
    let path = match slug.filter(|s| !s.is_empty()) {
        Some(slug) => format!("/{country}/app/{slug}/id{app_id}"),
        None => format!("/{country}/app/id{app_id}"),
    };
    let base = format!("https://{STOREFRONT_HOST}{path}");

    let params: Vec<(&str, &str)> = [("l", language), ("platform", platform)]
        .into_iter()
        .filter_map(|(key, value)| value.filter(|v| !v.is_empty()).map(|v| (key, v)))
        .collect();

    match Url::parse(&base) {
        Ok(mut url) => {
            if !params.is_empty() {
                url.query_pairs_mut().extend_pairs(params);
            }
            url.to_string()
        }
        // Unparseable ids or slugs: hand back the raw path rather than nothing
        Err(_) => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_with_slug_and_params() {
        let url = build_app_store_url("389801252", "TR", Some("instagram"), Some("tr"), Some("iphone"));
        assert_eq!(
            url,
            "https://apps.apple.com/tr/app/instagram/id389801252?l=tr&platform=iphone"
        );
    }

    #[test]
    fn test_build_url_without_slug_or_params() {
        assert_eq!(
            build_app_store_url("1", "us", None, None, None),
            "https://apps.apple.com/us/app/id1"
        );
        assert_eq!(
            build_app_store_url("1", "", Some(""), Some("en-gb"), None),
            "https://apps.apple.com/us/app/id1?l=en-gb"
        );
    }

    #[test]
    fn test_extract_slug_from_track_view_url() {
        let m = AppMetadata {
            track_view_url: Some("https://apps.apple.com/us/app/my-app/id123?uo=4".to_string()),
            track_name: Some("Ignored".to_string()),
            ..Default::default()
        };
        assert_eq!(extract_slug(Some(&m)).as_deref(), Some("my-app"));
    }

    #[test]
    fn test_extract_slug_from_track_name() {
        let m = AppMetadata {
            track_name: Some("Duolingo - Language Lessons".to_string()),
            ..Default::default()
        };
        assert_eq!(
            extract_slug(Some(&m)).as_deref(),
            Some("duolingo-language-lessons")
        );
        assert_eq!(extract_slug(None), None);
        assert_eq!(extract_slug(Some(&AppMetadata::default())), None);
    }
}
