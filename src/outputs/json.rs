//! JSON report output.
//!
//! The report lands at the app directory root:
//! ```text
//! app_store_assets/
//! └── Instagram/
//!     ├── download_report.json
//!     ├── us/
//!     └── tr/
//! ```

use crate::error::Result;
use crate::models::DownloadReport;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

pub const REPORT_FILE: &str = "download_report.json";

/// Write a [`DownloadReport`] as pretty-printed JSON into `app_dir`.
///
/// Returns the path of the written file.
#[instrument(level = "info", skip_all, fields(app_dir = %app_dir.display()))]
pub async fn write_report(report: &DownloadReport, app_dir: &Path) -> Result<PathBuf> {
    let mut json = serde_json::to_string_pretty(report)?;
    json.push('\n');

    if let Err(e) = fs::create_dir_all(app_dir).await {
        error!(error = %e, "Failed to create app directory");
        return Err(e.into());
    }

    let path = app_dir.join(REPORT_FILE);
    fs::write(&path, json).await?;
    info!(path = %path.display(), countries = report.countries.len(), "Wrote JSON report");
    Ok(path)
}
