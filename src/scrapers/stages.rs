//! Screenshot extraction heuristics for a rendered storefront page.
//!
//! Each stage is a pure function over the parsed document and its raw text.
//! [`STAGES`] lists them in priority order and [`run_cascade`] returns the
//! output of the first stage that finds anything. A stage that errors is
//! logged and counts as having found nothing.
//!
//! | Stage | Looks at | Accepts |
//! |-------|----------|---------|
//! | `picture_strict` | JPEG `<source>` inside `<picture>` | best candidate with a small/medium size token, deduped by base path |
//! | `picture_loose` | any `<source>` inside `<picture>` | every candidate of a srcset naming a device resolution |
//! | `img_tags` | `<img>` src / lazy-load attributes | device-resolution URLs, resized to 1290x2796 |
//! | `source_tags` | every `<source>` | candidates whose URL names a device resolution |
//! | `raw_regex` | raw HTML text | CDN thumbnail URLs with a WxH token |

use crate::error::{AssetError, Result};
use crate::scrapers::srcset::{best_candidate, normalize_image_url, parse_srcset};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

/// Most screenshots any stage returns.
pub const MAX_SCREENSHOTS: usize = 10;

/// Apple's image CDN.
pub const CDN_HOST: &str = "mzstatic.com";
/// The CDN subdomain screenshots are served from.
pub const SCREENSHOT_HOST: &str = "is.mzstatic.com";

/// Fragments marking icons, marketing art and social previews.
const EXCLUDED_FRAGMENTS: [&str; 3] = ["AppIcon", "marketing", "1200x630"];

/// Device resolutions screenshots are rendered at.
const DEVICE_SIZE_TOKENS: [&str; 8] = [
    "1290x", "1242x", "1170x", "1179x", "1284x", "828x", "750x", "640x",
];

/// Size every `<img>` hit is rewritten to.
const CANONICAL_SIZE: &str = "/1290x2796bb.";

static STRICT_SIZE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/(300x|600x|460x|314x|230x|157x)\d+bb").expect("static strict size regex")
});
static SIZE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\d+x\d+bb.*$").expect("static size suffix regex"));
static SIZE_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\d+x\d+bb\.").expect("static size segment regex"));
static WXH_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{3,4}x\d{3,4}").expect("static WxH regex"));
static CDN_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"https://[a-zA-Z0-9\-._~:/?#\[\]@!$&()*+,;=%]+mzstatic\.com/[a-zA-Z0-9\-._~:/?#\[\]@!$&()*+,;=%]+",
    )
    .expect("static CDN URL regex")
});
static DEBUG_CDN_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https://[^\s"'<>]+mzstatic\.com/[^\s"'<>]+"#).expect("static debug URL regex")
});

/// Signature shared by every extraction stage.
pub type Stage = fn(&Html, &str) -> Result<Vec<String>>;

/// Extraction stages in priority order.
pub const STAGES: [(&str, Stage); 5] = [
    ("picture_strict", picture_strict),
    ("picture_loose", picture_loose),
    ("img_tags", img_tags),
    ("source_tags", source_tags),
    ("raw_regex", raw_regex),
];

/// Result of a successful cascade run.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub stage: &'static str,
    pub urls: Vec<String>,
}

/// Parse `html` and run the stages in order until one yields URLs.
pub fn run_cascade(html: &str) -> Option<Extraction> {
    let document = Html::parse_document(html);
    run_stages(&STAGES, &document, html)
}

fn run_stages(stages: &[(&'static str, Stage)], document: &Html, raw: &str) -> Option<Extraction> {
    for (name, stage) in stages {
        match stage(document, raw) {
            Ok(urls) if !urls.is_empty() => {
                info!(stage = %name, count = urls.len(), "Extraction stage found screenshots");
                return Some(Extraction { stage: *name, urls });
            }
            Ok(_) => debug!(stage = %name, "Extraction stage found nothing"),
            Err(e) => warn!(stage = %name, error = %e, "Extraction stage failed; continuing"),
        }
    }
    None
}

/// Every CDN URL in the raw page, sorted and unique, for the debug dump.
pub fn all_cdn_urls(raw: &str) -> Vec<String> {
    DEBUG_CDN_URL
        .find_iter(raw)
        .map(|m| m.as_str().to_string())
        .sorted()
        .dedup()
        .collect()
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| AssetError::Selector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

/// First non-empty attribute among `names`.
fn first_attr<'a>(el: &ElementRef<'a>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| el.value().attr(name))
        .find(|v| !v.is_empty())
}

fn has_device_size(s: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|t| s.contains(t))
}

fn is_excluded(url: &str) -> bool {
    EXCLUDED_FRAGMENTS.iter().any(|f| url.contains(f))
}

fn push_unique(urls: &mut Vec<String>, url: String) -> bool {
    if !urls.contains(&url) {
        urls.push(url);
    }
    urls.len() >= MAX_SCREENSHOTS
}

/// JPEG `<source>`s inside `<picture>`: one best candidate per source, only
/// small/medium screenshot sizes, deduplicated by the size-stripped base path.
fn picture_strict(document: &Html, _raw: &str) -> Result<Vec<String>> {
    let pictures = selector("picture")?;
    let sources = selector("source")?;
    let mut urls = Vec::new();
    let mut seen_bases: Vec<String> = Vec::new();

    'pictures: for picture in document.select(&pictures) {
        let jpeg_sources = picture
            .select(&sources)
            .filter(|s| s.value().attr("type").is_some_and(|t| t.contains("image/jpeg")));

        for source in jpeg_sources {
            let Some(srcset) = first_attr(&source, &["srcset", "data-srcset"]) else {
                continue;
            };
            if !srcset.contains(CDN_HOST) {
                continue;
            }
            let candidates = parse_srcset(srcset);
            let Some(best) = best_candidate(&candidates) else {
                continue;
            };
            if is_excluded(&best.url) || !STRICT_SIZE.is_match(&best.url) {
                continue;
            }
            let base = SIZE_SUFFIX.replace(&best.url, "").into_owned();
            if seen_bases.contains(&base) {
                continue;
            }
            seen_bases.push(base);
            debug!(url = %best.url, score = best.score, "Strict picture match");
            urls.push(best.url.clone());
            if urls.len() >= MAX_SCREENSHOTS {
                break 'pictures;
            }
        }
    }
    Ok(urls)
}

/// Any `<source>` inside `<picture>` whose srcset names a device resolution.
fn picture_loose(document: &Html, _raw: &str) -> Result<Vec<String>> {
    let pictures = selector("picture")?;
    let sources = selector("source")?;
    let mut urls = Vec::new();

    for picture in document.select(&pictures) {
        for source in picture.select(&sources) {
            let srcset = source.value().attr("srcset").unwrap_or_default();
            if !srcset.contains(SCREENSHOT_HOST) || !has_device_size(srcset, &DEVICE_SIZE_TOKENS) {
                continue;
            }
            for candidate in parse_srcset(srcset) {
                if push_unique(&mut urls, candidate.url) {
                    return Ok(urls);
                }
            }
        }
    }
    Ok(urls)
}

/// `<img>` tags pointing at a device-resolution CDN image.
fn img_tags(document: &Html, _raw: &str) -> Result<Vec<String>> {
    let imgs = selector("img")?;
    let mut urls = Vec::new();

    for img in document.select(&imgs) {
        let Some(src) = first_attr(&img, &["src", "data-src", "data-lazy-src"]) else {
            continue;
        };
        if !src.contains(SCREENSHOT_HOST) || !has_device_size(src, &DEVICE_SIZE_TOKENS) {
            continue;
        }
        let resized = SIZE_SEGMENT.replace(src, CANONICAL_SIZE);
        let url = normalize_image_url(&resized);
        if push_unique(&mut urls, url) {
            break;
        }
    }
    Ok(urls)
}

/// Every `<source>` in the page, inside `<picture>` or not.
fn source_tags(document: &Html, _raw: &str) -> Result<Vec<String>> {
    let sources = selector("source")?;
    let tokens = &DEVICE_SIZE_TOKENS[..7];
    let mut urls = Vec::new();

    for source in document.select(&sources) {
        let srcset = first_attr(&source, &["srcset", "data-srcset"]).unwrap_or_default();
        if !srcset.contains(CDN_HOST) {
            continue;
        }
        for candidate in parse_srcset(srcset) {
            if has_device_size(&candidate.url, tokens) && push_unique(&mut urls, candidate.url) {
                return Ok(urls);
            }
        }
    }
    Ok(urls)
}

/// Last resort: regex every CDN URL out of the raw page text.
fn raw_regex(_document: &Html, raw: &str) -> Result<Vec<String>> {
    let found: Vec<&str> = CDN_URL.find_iter(raw).map(|m| m.as_str()).collect();
    debug!(count = found.len(), "CDN URLs in raw HTML");

    let mut candidates: Vec<&str> = found
        .iter()
        .copied()
        .filter(|u| !["1200x630", "AppIcon-", "marketing"].iter().any(|x| u.contains(x)))
        .filter(|u| u.contains("/image/thumb/") && WXH_TOKEN.is_match(u))
        .collect();

    if candidates.is_empty() {
        candidates = found
            .iter()
            .copied()
            .filter(|u| !u.contains("AppIcon") && !u.contains("1200x630"))
            .filter(|u| ["/image/thumb/", "/Purple", "/Features"].iter().any(|p| u.contains(p)))
            .filter(|u| WXH_TOKEN.is_match(u))
            .collect();
        debug!(count = candidates.len(), "Loosened raw HTML filter");
    }

    let mut urls = Vec::new();
    for url in candidates.into_iter().unique() {
        if push_unique(&mut urls, canonicalize_extension(trim_url_artifacts(url))) {
            break;
        }
    }
    Ok(urls)
}

/// Cut a regex hit at the first character that cannot belong to the image URL.
fn trim_url_artifacts(url: &str) -> &str {
    url.split(['&', '"', '\'', ')', ',']).next().unwrap_or(url)
}

/// Make the URL end in `.jpg` or `.jpeg`.
fn canonicalize_extension(url: &str) -> String {
    if let Some(stem) = url.strip_suffix(".webp").or_else(|| url.strip_suffix(".png")) {
        format!("{stem}.jpg")
    } else if url.ends_with(".jpg") || url.ends_with(".jpeg") {
        url.to_string()
    } else {
        format!("{url}.jpg")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THUMB: &str = "https://is1-ssl.mzstatic.com/image/thumb/PurpleSource/v4/aa/bb";

    fn run(stage: Stage, html: &str) -> Vec<String> {
        stage(&Html::parse_document(html), html).unwrap()
    }

    #[test]
    fn test_picture_strict_picks_best_jpeg_source() {
        let html = format!(
            r#"<picture>
                <source type="image/webp" srcset="{THUMB}/one.png/300x650bb.webp 300w, {THUMB}/one.png/600x1300bb.webp 600w">
                <source type="image/jpeg" srcset="{THUMB}/one.png/300x650bb.jpg 300w, {THUMB}/one.png/600x1300bb.jpg 600w">
            </picture>"#
        );
        assert_eq!(run(picture_strict, &html), vec![format!("{THUMB}/one.png/600x1300bb.jpg")]);
    }

    #[test]
    fn test_picture_strict_dedupes_by_base_path() {
        let html = format!(
            r#"<picture><source type="image/jpeg" srcset="{THUMB}/one.png/300x650bb.jpg 1x"></picture>
               <picture><source type="image/jpeg" srcset="{THUMB}/one.png/600x1300bb.jpg 2x"></picture>
               <picture><source type="image/jpeg" srcset="{THUMB}/two.png/460x996bb.jpg 1x"></picture>"#
        );
        assert_eq!(
            run(picture_strict, &html),
            vec![
                format!("{THUMB}/one.png/300x650bb.jpg"),
                format!("{THUMB}/two.png/460x996bb.jpg"),
            ]
        );
    }

    #[test]
    fn test_picture_strict_rejects_icons_and_unknown_sizes() {
        let html = format!(
            r#"<picture><source type="image/jpeg" srcset="{THUMB}/AppIcon-0.png/300x300bb.jpg 1x"></picture>
               <picture><source type="image/jpeg" srcset="{THUMB}/og.png/1200x630bb.jpg 1x"></picture>
               <picture><source type="image/jpeg" srcset="{THUMB}/big.png/1290x2796bb.jpg 1x"></picture>"#
        );
        assert!(run(picture_strict, &html).is_empty());
    }

    #[test]
    fn test_picture_strict_caps_at_ten() {
        let html: String = (0..15)
            .map(|i| {
                format!(r#"<picture><source type="image/jpeg" srcset="{THUMB}/s{i}.png/300x650bb.jpg 1x"></picture>"#)
            })
            .collect();
        assert_eq!(run(picture_strict, &html).len(), MAX_SCREENSHOTS);
    }

    #[test]
    fn test_picture_loose_takes_all_candidates() {
        let html = r#"<picture><source srcset="https://is.mzstatic.com/a/1290x2796bb.webp 1x, https://is.mzstatic.com/a/645x1398bb.webp 2x"></picture>"#;
        assert_eq!(
            run(picture_loose, html),
            vec![
                "https://is.mzstatic.com/a/1290x2796bb.jpg",
                "https://is.mzstatic.com/a/645x1398bb.jpg",
            ]
        );
    }

    #[test]
    fn test_img_tags_rewrites_size() {
        let html = r#"<img class="x" data-src="https://is.mzstatic.com/s/828x1792bb.webp">
                      <img src="https://is.mzstatic.com/s/828x1792bb.webp">
                      <img src="https://example.com/828x1792bb.jpg">"#;
        assert_eq!(run(img_tags, html), vec!["https://is.mzstatic.com/s/1290x2796bb.jpg"]);
    }

    #[test]
    fn test_source_tags_outside_picture() {
        let html = r#"<video><source srcset="https://a1.mzstatic.com/v/1242x2688bb.jpg 1x, https://a1.mzstatic.com/v/640x1136bb.jpg 2x"></video>"#;
        assert_eq!(run(source_tags, html), vec!["https://a1.mzstatic.com/v/1242x2688bb.jpg"]);
    }

    #[test]
    fn test_raw_regex_prefers_thumbnails_and_cleans_urls() {
        let html = format!(
            r#"<script>var a = "{THUMB}/one.png/392x696bb.webp"; var b = '{THUMB}/AppIcon-1.png/512x512bb.jpg';
               url({THUMB}/two.png/392x696bb.png), "{THUMB}/one.png/392x696bb.webp"</script>"#
        );
        assert_eq!(
            run(raw_regex, &html),
            vec![
                format!("{THUMB}/one.png/392x696bb.jpg"),
                format!("{THUMB}/two.png/392x696bb.jpg"),
            ]
        );
    }

    #[test]
    fn test_raw_regex_loose_fallback() {
        let html = "https://is1-ssl.mzstatic.com/Features/v4/aa/392x696sr";
        assert_eq!(
            run(raw_regex, html),
            vec!["https://is1-ssl.mzstatic.com/Features/v4/aa/392x696sr.jpg"]
        );
    }

    #[test]
    fn test_run_cascade_stops_at_first_hit() {
        let html = format!(
            r#"<picture><source type="image/jpeg" srcset="{THUMB}/one.png/300x650bb.jpg 1x"></picture>
               <img src="https://is.mzstatic.com/s/828x1792bb.jpg">"#
        );
        let extraction = run_cascade(&html).unwrap();
        assert_eq!(extraction.stage, "picture_strict");
        assert_eq!(extraction.urls.len(), 1);
    }

    #[test]
    fn test_run_cascade_falls_through_to_img() {
        let html = r#"<img src="https://is.mzstatic.com/s/750x1334bb.jpg">"#;
        let extraction = run_cascade(html).unwrap();
        assert_eq!(extraction.stage, "img_tags");
        assert_eq!(extraction.urls, vec!["https://is.mzstatic.com/s/1290x2796bb.jpg"]);
    }

    #[test]
    fn test_run_cascade_nothing_found() {
        assert!(run_cascade("<html><body>No images</body></html>").is_none());
    }

    #[test]
    fn test_failing_stage_is_skipped() {
        fn broken(_: &Html, _: &str) -> Result<Vec<String>> {
            Err(selector("<<invalid").unwrap_err())
        }
        fn fixed(_: &Html, _: &str) -> Result<Vec<String>> {
            Ok(vec!["https://is.mzstatic.com/ok.jpg".to_string()])
        }
        let stages: [(&'static str, Stage); 2] = [("broken", broken), ("fixed", fixed)];
        let doc = Html::parse_document("");
        let extraction = run_stages(&stages, &doc, "").unwrap();
        assert_eq!(extraction.stage, "fixed");
    }

    #[test]
    fn test_all_cdn_urls_sorted_unique() {
        let raw = r#"<a href="https://b.mzstatic.com/2.jpg"></a> https://a.mzstatic.com/1.jpg 'https://b.mzstatic.com/2.jpg'"#;
        assert_eq!(
            all_cdn_urls(raw),
            vec!["https://a.mzstatic.com/1.jpg", "https://b.mzstatic.com/2.jpg"]
        );
    }

    #[test]
    fn test_canonicalize_extension() {
        assert_eq!(canonicalize_extension("https://x/a.webp"), "https://x/a.jpg");
        assert_eq!(canonicalize_extension("https://x/a.png"), "https://x/a.jpg");
        assert_eq!(canonicalize_extension("https://x/a.jpeg"), "https://x/a.jpeg");
        assert_eq!(canonicalize_extension("https://x/a"), "https://x/a.jpg");
    }
}
