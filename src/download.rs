//! File downloads for logos and screenshots.
//!
//! Both asset kinds go through [`Downloader::download_file`]: one GET with a
//! timeout, a status check, and a write into the country directory. A failed
//! download is logged and reported as `false`, never as an error.

use crate::error::{AssetError, Result};
use crate::models::AppMetadata;
use crate::utils::truncate_for_log;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

static ARTWORK_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\d+x\d+bb\.").expect("static artwork size regex"));

/// Rewrite an artwork URL to request the 512x512 rendition.
pub fn upscale_artwork_url(url: &str) -> String {
    ARTWORK_SIZE.replace_all(url, "/512x512bb.").into_owned()
}

#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    timeout: Duration,
}

impl Downloader {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Downloader { client, timeout }
    }

    /// Fetch `url` into `path`, creating parent directories.
    ///
    /// Returns `true` only when a non-empty body was written.
    #[instrument(level = "debug", skip_all, fields(url = %truncate_for_log(url, 80), path = %path.display()))]
    pub async fn download_file(&self, url: &str, path: &Path) -> bool {
        match self.try_download(url, path).await {
            Ok(bytes) => {
                debug!(bytes, "Downloaded file");
                true
            }
            Err(e) => {
                warn!(error = %e, "Download failed");
                false
            }
        }
    }

    async fn try_download(&self, url: &str, path: &Path) -> Result<usize> {
        let response = self.client.get(url).timeout(self.timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(AssetError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "empty response body",
            )));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, &bytes).await?;
        Ok(bytes.len())
    }

    /// Download the app icon as `logo_<country>.jpg`.
    #[instrument(level = "info", skip_all, fields(%country))]
    pub async fn download_logo(
        &self,
        metadata: Option<&AppMetadata>,
        country: &str,
        country_dir: &Path,
    ) -> Option<PathBuf> {
        let Some(metadata) = metadata else {
            warn!("No metadata; skipping logo");
            return None;
        };
        let Some(artwork) = metadata.best_artwork_url() else {
            warn!("Metadata has no artwork URL");
            return None;
        };

        let url = upscale_artwork_url(artwork);
        let path = country_dir.join(format!("logo_{country}.jpg"));
        if self.download_file(&url, &path).await {
            info!(path = %path.display(), "Logo downloaded");
            Some(path)
        } else {
            warn!("Logo could not be downloaded");
            None
        }
    }

    /// Download screenshots in order as `screenshot_<n>.jpg`, `n` starting at 1.
    ///
    /// Downloads run one after another; failed ones are skipped.
    #[instrument(level = "info", skip_all, fields(count = urls.len()))]
    pub async fn download_screenshots(&self, urls: &[String], country_dir: &Path) -> Vec<PathBuf> {
        let paths: Vec<PathBuf> = stream::iter(urls.iter().enumerate())
            .then(|(idx, url)| async move {
                let path = country_dir.join(format!("screenshot_{}.jpg", idx + 1));
                self.download_file(url, &path).await.then_some(path)
            })
            .filter_map(|opt| std::future::ready(opt))
            .collect()
            .await;

        info!(downloaded = paths.len(), requested = urls.len(), "Screenshots downloaded");
        paths
    }
}
