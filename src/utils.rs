//! Utility functions for string handling and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - String truncation for log lines carrying long CDN URLs
//! - Slug generation for storefront URLs
//! - Folder name sanitization for the per-app output directory
//! - File system validation for the output directory

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Names Windows refuses for files or folders, compared case-insensitively.
const WINDOWS_RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Longest folder name we produce, well under Windows' MAX_PATH.
const MAX_DIR_NAME_CHARS: usize = 200;

static NON_SLUG_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("static slug regex"));

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` bytes (backing off to a char boundary) with
/// an ellipsis and byte count appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Convert an app title to a storefront slug.
///
/// Lowercases, drops non-ASCII characters, and collapses every run of other
/// characters into a single hyphen. Returns `None` when nothing is left.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify("Hello World!").as_deref(), Some("hello-world"));
/// ```
pub fn slugify(title: &str) -> Option<String> {
    let ascii: String = title.chars().filter(char::is_ascii).collect();
    let lowered = ascii.to_lowercase();
    let slug = NON_SLUG_CHARS.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    (!slug.is_empty()).then(|| slug.to_string())
}

/// Return a filesystem-safe folder name for storing app assets.
///
/// - Replaces `<>:"/\|?*` and control characters with `_`
/// - Trims surrounding whitespace and dots
/// - Suffixes Windows reserved device names with `_app`
/// - Caps the length at 200 characters
/// - Falls back to `fallback`, then `"app"`, when nothing usable remains
pub fn sanitize_app_dir_name(value: Option<&str>, fallback: Option<&str>) -> String {
    let candidate = [value, fallback]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or("app");

    let replaced: String = candidate
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let mut sanitized = trim_dots_and_spaces(&replaced).to_string();
    if sanitized.is_empty() {
        sanitized = trim_dots_and_spaces(fallback.unwrap_or("app")).to_string();
    }
    if sanitized.is_empty() {
        return "app".to_string();
    }

    if WINDOWS_RESERVED_NAMES.contains(&sanitized.to_uppercase().as_str()) {
        sanitized.push_str("_app");
    }

    if sanitized.chars().count() > MAX_DIR_NAME_CHARS {
        let capped: String = sanitized.chars().take(MAX_DIR_NAME_CHARS).collect();
        let trimmed = capped.trim_end_matches([' ', '.']);
        sanitized = if trimmed.is_empty() { capped } else { trimmed.to_string() };
    }

    sanitized
}

fn trim_dots_and_spaces(s: &str) -> &str {
    s.trim().trim_matches('.').trim()
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    // Plain std fs keeps the error surface simple for the probe
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "https://is1-ssl.mzstatic.com/a.jpg";
        assert_eq!(truncate_for_log(s, 100), s);
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_char_boundary() {
        let result = truncate_for_log("ééé", 3);
        assert!(result.starts_with('é'));
        assert!(result.ends_with("…(+4 bytes)"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World").as_deref(), Some("hello-world"));
        assert_eq!(slugify("Test-Article!").as_deref(), Some("test-article"));
        assert_eq!(slugify("Multiple   Spaces").as_deref(), Some("multiple-spaces"));
        assert_eq!(slugify("  --Instagram--  ").as_deref(), Some("instagram"));
        assert_eq!(slugify("日本語"), None);
        assert_eq!(slugify(""), None);
    }

    #[test]
    fn test_sanitize_replaces_invalid_chars() {
        assert_eq!(
            sanitize_app_dir_name(Some("Foo: Bar/Baz?"), None),
            "Foo_ Bar_Baz_"
        );
        assert_eq!(sanitize_app_dir_name(Some("tab\there"), None), "tab_here");
    }

    #[test]
    fn test_sanitize_trims_dots_and_spaces() {
        assert_eq!(sanitize_app_dir_name(Some("  ..My App..  "), None), "My App");
    }

    #[test]
    fn test_sanitize_fallbacks() {
        assert_eq!(sanitize_app_dir_name(None, Some("app_123")), "app_123");
        assert_eq!(sanitize_app_dir_name(Some("..."), Some("app_123")), "app_123");
        assert_eq!(sanitize_app_dir_name(Some("  "), None), "app");
        assert_eq!(sanitize_app_dir_name(None, None), "app");
    }

    #[test]
    fn test_sanitize_reserved_names() {
        assert_eq!(sanitize_app_dir_name(Some("con"), None), "con_app");
        assert_eq!(sanitize_app_dir_name(Some("LPT1"), None), "LPT1_app");
    }

    #[test]
    fn test_sanitize_length_cap() {
        let long = "x".repeat(300);
        assert_eq!(sanitize_app_dir_name(Some(&long), None).chars().count(), 200);
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join("..__probe_write__").exists());
    }
}
