//! Runtime configuration.
//!
//! Settings are layered once at start-up: built-in defaults, then an optional
//! YAML file, then environment variables. CLI flags are applied on top by
//! `main`. The resulting [`Settings`] value is passed by reference and never
//! mutated afterwards.
//!
//! ```yaml
//! default_language: en
//! countries: [us, tr, jp]
//! country_delay_secs: 2
//! http_proxy: http://127.0.0.1:8080
//! country_languages:
//!   tr: tr
//!   br: pt-br
//! ```

use crate::error::Result;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Storefronts processed when no `--countries` are given.
pub const DEFAULT_COUNTRIES: [&str; 7] = ["us", "tr", "jp", "ca", "gb", "de", "fr"];

/// Built-in storefront language per country code.
pub static COUNTRY_LANGUAGES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("us", "en"),
        ("gb", "en-gb"),
        ("ie", "en-ie"),
        ("ca", "en-ca"),
        ("au", "en-au"),
        ("nz", "en-nz"),
        ("sg", "en-sg"),
        ("in", "en-in"),
        ("za", "en-za"),
        ("tr", "tr"),
        ("de", "de"),
        ("at", "de-at"),
        ("ch", "de-ch"),
        ("fr", "fr"),
        ("be", "fr-be"),
        ("it", "it"),
        ("es", "es"),
        ("mx", "es-mx"),
        ("ar", "es-ar"),
        ("cl", "es-cl"),
        ("co", "es-co"),
        ("pe", "es-pe"),
        ("br", "pt-br"),
        ("pt", "pt-pt"),
        ("nl", "nl"),
        ("se", "sv"),
        ("no", "no"),
        ("dk", "da"),
        ("fi", "fi"),
        ("pl", "pl"),
        ("cz", "cs"),
        ("hu", "hu"),
        ("gr", "el"),
        ("ro", "ro"),
        ("sk", "sk"),
        ("jp", "ja"),
        ("kr", "ko"),
        ("cn", "zh"),
        ("tw", "zh-hant"),
        ("hk", "zh-hk"),
        ("id", "id"),
        ("my", "ms"),
        ("th", "th"),
        ("vn", "vi"),
        ("ru", "ru"),
        ("ua", "uk"),
        ("ae", "ar"),
        ("sa", "ar"),
        ("qa", "ar"),
        ("kw", "ar"),
        ("il", "he"),
    ])
});

/// Effective configuration for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub default_language: String,
    pub countries: Vec<String>,
    pub output_dir: PathBuf,
    /// Pause between storefronts to stay under rate limits.
    pub country_delay: Duration,
    pub lookup_timeout: Duration,
    pub download_timeout: Duration,
    /// Upper bound for one headless render, including settle time.
    pub render_timeout: Duration,
    /// Extra time the page gets after the scroll actions before its DOM is read.
    pub settle_delay: Duration,
    pub http_proxy: Option<String>,
    /// Per-country language overrides from the config file.
    pub country_languages: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            default_language: "en".to_string(),
            countries: DEFAULT_COUNTRIES.iter().map(|c| c.to_string()).collect(),
            output_dir: PathBuf::from("app_store_assets"),
            country_delay: Duration::from_secs(2),
            lookup_timeout: Duration::from_secs(15),
            download_timeout: Duration::from_secs(30),
            render_timeout: Duration::from_secs(60),
            settle_delay: Duration::from_secs(5),
            http_proxy: None,
            country_languages: HashMap::new(),
        }
    }
}

/// On-disk shape of the optional YAML config. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    default_language: Option<String>,
    countries: Option<Vec<String>>,
    output_dir: Option<PathBuf>,
    country_delay_secs: Option<u64>,
    lookup_timeout_secs: Option<u64>,
    download_timeout_secs: Option<u64>,
    render_timeout_secs: Option<u64>,
    settle_delay_secs: Option<u64>,
    http_proxy: Option<String>,
    country_languages: HashMap<String, String>,
}

impl Settings {
    /// Build settings from defaults, an optional YAML file and the environment.
    #[instrument(level = "info")]
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut settings = Settings::default();

        if let Some(path) = config_path {
            let raw = std::fs::read_to_string(path)?;
            let file: FileConfig = serde_yaml::from_str(&raw)?;
            settings.apply_file(file);
            info!(path = %path.display(), "Loaded configuration file");
        }

        settings.apply_env(|key| std::env::var(key).ok());
        debug!(?settings, "Effective settings");
        Ok(settings)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(lang) = non_empty(file.default_language) {
            self.default_language = lang;
        }
        if let Some(countries) = file.countries.filter(|c| !c.is_empty()) {
            self.countries = countries.iter().map(|c| c.trim().to_lowercase()).collect();
        }
        if let Some(dir) = file.output_dir {
            self.output_dir = dir;
        }
        if let Some(secs) = file.country_delay_secs {
            self.country_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = file.lookup_timeout_secs {
            self.lookup_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.download_timeout_secs {
            self.download_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.render_timeout_secs {
            self.render_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.settle_delay_secs {
            self.settle_delay = Duration::from_secs(secs);
        }
        if let Some(proxy) = non_empty(file.http_proxy) {
            self.http_proxy = Some(proxy);
        }
        self.country_languages.extend(
            file.country_languages
                .into_iter()
                .map(|(country, lang)| (country.trim().to_lowercase(), lang.trim().to_string())),
        );
    }

    fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(lang) = non_empty(get("APP_STORE_DEFAULT_LANGUAGE")) {
            self.default_language = lang;
        }
        if let Some(proxy) = non_empty(get("APP_STORE_HTTP_PROXY")) {
            self.http_proxy = Some(proxy);
        }
    }

    /// Storefront language for `country`.
    ///
    /// An explicit override wins, then the config file table, then the
    /// built-in table, then the default language.
    pub fn resolve_language(&self, country: &str, override_lang: Option<&str>) -> String {
        if let Some(lang) = override_lang.filter(|l| !l.trim().is_empty()) {
            return lang.trim().to_string();
        }
        let country = country.to_lowercase();
        if let Some(lang) = self.country_languages.get(&country) {
            return lang.clone();
        }
        COUNTRY_LANGUAGES
            .get(country.as_str())
            .map(|l| l.to_string())
            .unwrap_or_else(|| self.default_language.clone())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.countries, vec!["us", "tr", "jp", "ca", "gb", "de", "fr"]);
        assert_eq!(s.default_language, "en");
        assert_eq!(s.country_delay, Duration::from_secs(2));
        assert_eq!(s.output_dir, PathBuf::from("app_store_assets"));
    }

    #[test]
    fn test_resolve_language_precedence() {
        let mut s = Settings::default();
        assert_eq!(s.resolve_language("TR", None), "tr");
        assert_eq!(s.resolve_language("br", None), "pt-br");
        assert_eq!(s.resolve_language("zz", None), "en");

        s.country_languages.insert("tr".to_string(), "en".to_string());
        assert_eq!(s.resolve_language("tr", None), "en");
        assert_eq!(s.resolve_language("tr", Some("tr-tr")), "tr-tr");
        assert_eq!(s.resolve_language("tr", Some("  ")), "en");
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "default_language: de\ncountries: [US, Tr]\ncountry_delay_secs: 0\ncountry_languages:\n  JP: en\n"
        )
        .unwrap();

        let s = Settings::load(Some(file.path())).unwrap();
        assert_eq!(s.countries, vec!["us", "tr"]);
        assert_eq!(s.country_delay, Duration::ZERO);
        assert_eq!(s.resolve_language("jp", None), "en");
        assert_eq!(s.resolve_language("zz", None), s.default_language);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = Settings::load(Some(Path::new("/nonexistent/app_store_assets.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut s = Settings::default();
        s.apply_env(|key| match key {
            "APP_STORE_DEFAULT_LANGUAGE" => Some("fr".to_string()),
            "APP_STORE_HTTP_PROXY" => Some(" ".to_string()),
            _ => None,
        });
        assert_eq!(s.default_language, "fr");
        assert!(s.http_proxy.is_none());
    }
}
