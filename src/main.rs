//! # App Store Assets
//!
//! Downloads an app's icon and screenshots from several App Store country
//! storefronts and writes a JSON report plus an optional PDF report.
//!
//! ## Features
//!
//! - Looks up app metadata per storefront through the iTunes lookup API
//! - Falls back to scraping the rendered storefront page when the API has no
//!   (or no localized) screenshots
//! - Per-country language selection with command-line overrides
//! - JSON report of every downloaded file and a PDF overview of the images
//!
//! ## Usage
//!
//! ```sh
//! app_store_assets --app-id 389801252 -c us,tr,jp
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Lookup**: Fetch metadata for the first country to name the app folder
//! 2. **Per country**: Logo download, screenshot resolution, screenshot download
//! 3. **Output**: Write the JSON report, then the PDF report

use chrono::{SecondsFormat, Utc};
use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod assets;
mod cli;
mod download;
mod error;
mod models;
mod outputs;
mod render;
mod scrapers;
mod settings;
mod utils;

use api::{ItunesLookup, RetryLookup, lookup_or_none};
use assets::{AssetPipeline, resolve_app_name};
use cli::Cli;
use download::Downloader;
use models::{AppInfo, DownloadReport, ReportSummary};
use outputs::{json, pdf};
use render::Renderer;
use settings::Settings;
use utils::{ensure_writable_dir, sanitize_app_dir_name};

const LOOKUP_RETRIES: usize = 2;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("app_store_assets starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut settings = Settings::load(args.config.as_deref())?;
    args.apply_to(&mut settings);

    let app_id = args.validate_app_id()?.to_string();
    let countries = args.countries(&settings)?;
    let language_overrides = args.language_overrides();

    // Early check: ensure output dir is writable
    if let Err(e) = ensure_writable_dir(&settings.output_dir).await {
        error!(
            path = %settings.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let mut client_builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(10));
    if let Some(proxy) = &settings.http_proxy {
        client_builder = client_builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        info!(%proxy, "Using HTTP proxy");
    }
    let client = client_builder.build()?;

    let lookup = RetryLookup::new(
        ItunesLookup::new(client.clone(), settings.lookup_timeout),
        LOOKUP_RETRIES,
        Duration::from_secs(1),
    );
    let renderer = Renderer::select(args.renderer, args.chrome_path.as_deref(), client.clone());
    let downloader = Downloader::new(client, settings.download_timeout);

    // ---- App name and folder ----
    let primary = lookup_or_none(&lookup, &app_id, &countries[0]).await;
    if primary.is_none() {
        warn!("No metadata for the first country; app info will be empty");
    }
    let app_name = resolve_app_name(args.app_name.as_deref(), primary.as_ref(), &app_id);
    let fallback = format!("app_{app_id}");
    let app_dir_name = sanitize_app_dir_name(Some(&app_name), Some(&fallback));
    if app_dir_name != app_name {
        info!(%app_name, folder = %app_dir_name, "Using sanitized folder name");
    }
    let app_dir = settings.output_dir.join(&app_dir_name);
    info!(%app_id, %app_name, countries = %countries.join(","), "Starting downloads");

    // ---- Per-country downloads ----
    let pipeline = AssetPipeline::new(&lookup, &renderer, downloader, &settings, &language_overrides);
    let results = pipeline
        .download_all_countries(&app_id, &countries, &app_dir, primary.clone())
        .await;

    // ---- Reports ----
    let report = DownloadReport {
        app_id: app_id.clone(),
        app_name,
        app_info: primary.as_ref().map(AppInfo::from).unwrap_or_default(),
        downloaded_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        summary: ReportSummary::from_results(&results),
        countries: results,
    };
    info!(
        countries = report.summary.total_countries,
        logos = report.summary.total_logos_downloaded,
        screenshots = report.summary.total_screenshots_downloaded,
        "Downloads finished"
    );

    if let Err(e) = json::write_report(&report, &app_dir).await {
        error!(error = %e, "Failed to write JSON report");
    }

    if args.no_pdf {
        info!("PDF report disabled");
    } else {
        let pdf_path = app_dir.join(pdf::REPORT_FILE);
        match pdf::write_pdf_report(&report, &pdf_path) {
            Ok(true) => info!(path = %pdf_path.display(), "PDF report saved"),
            Ok(false) => {}
            Err(e) => error!(error = %e, "PDF report generation failed"),
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        elapsed_secs = elapsed.as_secs_f64(),
        output = %app_dir.display(),
        "Execution complete"
    );

    Ok(())
}
