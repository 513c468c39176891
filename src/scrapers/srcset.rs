//! Responsive-image descriptor parsing and CDN URL normalization.
//!
//! A `srcset` value is a comma separated list of `<url> <descriptor>` pairs
//! where the descriptor is either a width (`750w`) or a pixel density (`2x`).
//! Each entry becomes a [`Candidate`] scored so that larger images always
//! compare greater.

use crate::models::Candidate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

static DESCRIPTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<value>\d+(?:\.\d+)?)(?P<unit>[wx])").expect("static descriptor regex")
});

/// Force `https:` on protocol-relative URLs and swap `.webp` for `.jpg`.
///
/// Returns an empty string for blank input.
pub fn normalize_image_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let absolute = if trimmed.starts_with("//") {
        format!("https:{trimmed}")
    } else {
        trimmed.to_string()
    };
    absolute.replace(".webp", ".jpg")
}

/// Score one descriptor: the width for `w`, density times 1000 for `x`, else 0.
pub fn descriptor_score(descriptor: &str) -> f64 {
    DESCRIPTOR
        .captures(descriptor)
        .and_then(|caps| {
            let value: f64 = caps["value"].parse().ok()?;
            Some(if &caps["unit"] == "w" { value } else { value * 1000.0 })
        })
        .unwrap_or(0.0)
}

/// Parse a `srcset` attribute into candidates, keeping only absolute HTTP(S)
/// URLs after normalization.
pub fn parse_srcset(srcset: &str) -> Vec<Candidate> {
    srcset
        .split(',')
        .enumerate()
        .filter_map(|(order, chunk)| {
            let mut parts = chunk.split_whitespace();
            let url = normalize_image_url(parts.next()?);
            let score = parts.next().map(descriptor_score).unwrap_or(0.0);
            url.starts_with("http").then_some(Candidate { score, order, url })
        })
        .collect()
}

/// Larger score first; equal scores keep document order.
fn by_preference(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.order.cmp(&b.order))
}

/// The preferred candidate, if any.
pub fn best_candidate(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().min_by(|a, b| by_preference(a, b))
}
