//! Command-line interface definitions for the App Store asset downloader.
//!
//! This module defines the CLI arguments and options using the `clap` crate,
//! plus the validation that turns raw flags into a run configuration.

use crate::error::{AssetError, Result};
use crate::render::RendererKind;
use crate::settings::Settings;
use clap::Parser;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

static APP_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9._]+$").expect("static app id regex"));

/// Command-line arguments for the App Store asset downloader.
///
/// # Examples
///
/// ```sh
/// # Default storefronts
/// app_store_assets --app-id 389801252
///
/// # Chosen storefronts with language overrides, no PDF
/// app_store_assets --app-id 389801252 -c tr,jp,br -l tr:tr-tr,br:pt-br --no-pdf
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Numeric App Store id of the app
    #[arg(long)]
    pub app_id: String,

    /// Name used for the output folder and reports (defaults to the store title)
    #[arg(long)]
    pub app_name: Option<String>,

    /// Comma separated country codes, e.g. `us,tr,jp`
    #[arg(short, long, value_delimiter = ',')]
    pub countries: Option<Vec<String>>,

    /// Per-country language overrides, e.g. `tr:tr-tr,jp:ja-jp`
    #[arg(short, long)]
    pub languages: Option<String>,

    /// Base output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Skip the PDF report
    #[arg(long)]
    pub no_pdf: bool,

    /// Optional path to a YAML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// How storefront pages are fetched
    #[arg(long, value_enum, default_value_t = RendererKind::Auto)]
    pub renderer: RendererKind,

    /// Path to a Chromium-family browser binary
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Seconds to wait between countries
    #[arg(long)]
    pub delay_secs: Option<u64>,
}

impl Cli {
    /// Check the app id format.
    pub fn validate_app_id(&self) -> Result<&str> {
        let id = self.app_id.trim();
        if id.is_empty() {
            return Err(AssetError::Validation("app id cannot be empty".to_string()));
        }
        if !APP_ID.is_match(id) {
            return Err(AssetError::Validation(format!("invalid app id format: {id:?}")));
        }
        Ok(id)
    }

    /// Countries to process: the `--countries` list, else the configured ones.
    ///
    /// Codes are lowercased, blanks dropped, duplicates removed in order.
    pub fn countries(&self, settings: &Settings) -> Result<Vec<String>> {
        let raw = self.countries.as_ref().unwrap_or(&settings.countries);
        let countries: Vec<String> = raw
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .unique()
            .collect();

        if countries.is_empty() {
            return Err(AssetError::Validation("at least one country is required".to_string()));
        }
        if let Some(bad) = countries
            .iter()
            .find(|c| c.len() != 2 || !c.chars().all(|ch| ch.is_ascii_alphabetic()))
        {
            return Err(AssetError::Validation(format!(
                "country code must be 2 letters (e.g. us, tr), got {bad:?}"
            )));
        }
        Ok(countries)
    }

    pub fn language_overrides(&self) -> HashMap<String, String> {
        self.languages
            .as_deref()
            .map(parse_language_map)
            .unwrap_or_default()
    }

    /// Fold output dir and delay flags into `settings`.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(dir) = &self.output_dir {
            settings.output_dir = dir.clone();
        }
        if let Some(secs) = self.delay_secs {
            settings.country_delay = Duration::from_secs(secs);
        }
    }
}

/// Parse `cc:lang,cc:lang`. Pairs without a colon or with an empty side are
/// ignored.
pub fn parse_language_map(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| pair.split_once(':'))
        .map(|(country, lang)| (country.trim().to_lowercase(), lang.trim().to_string()))
        .filter(|(country, lang)| !country.is_empty() && !lang.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "app_store_assets",
            "--app-id",
            "389801252",
            "--countries",
            "US,tr, jp",
            "--languages",
            "tr:tr-tr,jp:ja-jp",
            "--no-pdf",
        ]);

        assert_eq!(cli.validate_app_id().unwrap(), "389801252");
        assert!(cli.no_pdf);
        assert_eq!(cli.renderer, RendererKind::Auto);
        assert_eq!(
            cli.countries(&Settings::default()).unwrap(),
            vec!["us", "tr", "jp"]
        );
        assert_eq!(cli.language_overrides().get("jp").map(String::as_str), Some("ja-jp"));
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "app_store_assets",
            "--app-id",
            "1",
            "-c",
            "de",
            "-l",
            "de:de-at",
            "-o",
            "/tmp/assets",
            "--renderer",
            "http",
            "--delay-secs",
            "0",
        ]);

        let mut settings = Settings::default();
        cli.apply_to(&mut settings);
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/assets"));
        assert_eq!(settings.country_delay, Duration::ZERO);
        assert_eq!(cli.renderer, RendererKind::Http);
        assert_eq!(cli.countries(&settings).unwrap(), vec!["de"]);
    }

    #[test]
    fn test_default_countries_come_from_settings() {
        let cli = Cli::parse_from(["app_store_assets", "--app-id", "1"]);
        let settings = Settings::default();
        assert_eq!(cli.countries(&settings).unwrap(), settings.countries);
    }

    #[test]
    fn test_validation_errors() {
        let cli = Cli::parse_from(["app_store_assets", "--app-id", "12 34"]);
        assert!(matches!(cli.validate_app_id(), Err(AssetError::Validation(_))));

        let cli = Cli::parse_from(["app_store_assets", "--app-id", "com.example.app", "-c", "usa"]);
        assert!(cli.validate_app_id().is_ok());
        assert!(cli.countries(&Settings::default()).is_err());

        let cli = Cli::parse_from(["app_store_assets", "--app-id", "1", "-c", " , "]);
        assert!(cli.countries(&Settings::default()).is_err());
    }

    #[test]
    fn test_parse_language_map() {
        let map = parse_language_map("TR:tr-tr, jp : ja-jp,bogus,us:");
        assert_eq!(map.len(), 2);
        assert_eq!(map["tr"], "tr-tr");
        assert_eq!(map["jp"], "ja-jp");
    }
}
