//! Report generation for a finished run.
//!
//! # Submodules
//!
//! - [`json`]: Writes the `DownloadReport` as `download_report.json`
//! - [`pdf`]: Lays the downloaded images out in `assets_report.pdf`
//!
//! # Output Structure
//!
//! ```text
//! app_store_assets/
//! └── Instagram/
//!     ├── download_report.json
//!     ├── assets_report.pdf
//!     ├── us/
//!     │   ├── logo_us.jpg
//!     │   ├── screenshot_1.jpg
//!     │   └── screenshot_2.jpg
//!     └── tr/
//!         ├── debug_html_full.txt   # only when scraping found nothing
//!         └── debug_urls.txt
//! ```

pub mod json;
pub mod pdf;
