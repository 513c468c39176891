//! Error type shared by the lookup client, renderer, resolver and reports.
//!
//! Every per-country failure is recovered by the caller (logged and treated as
//! "no asset"), so these variants mostly exist to give log lines a precise
//! cause.

use thiserror::Error;

/// Errors produced while collecting App Store assets.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("no app found for country {country}")]
    MetadataNotFound { country: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("page render failed: {0}")]
    Render(String),

    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },

    #[error("no screenshot URLs could be extracted")]
    NothingExtracted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid input: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, AssetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = AssetError::MetadataNotFound {
            country: "tr".to_string(),
        };
        assert_eq!(e.to_string(), "no app found for country tr");

        let e = AssetError::HttpStatus {
            status: 404,
            url: "https://example.com".to_string(),
        };
        assert_eq!(e.to_string(), "HTTP 404 from https://example.com");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: AssetError = io.into();
        assert!(matches!(e, AssetError::Io(_)));
    }
}
