//! Storefront page rendering.
//!
//! Storefront screenshots are lazy-loaded, so the scraper prefers a fully
//! hydrated DOM from a headless browser. The [`PageRenderer`] trait hides how
//! the HTML is obtained:
//! - [`HeadlessChrome`]: spawns a Chromium-family binary with `--dump-dom`
//! - [`HttpRenderer`]: a plain GET, no script execution
//! - [`Renderer`]: enum dispatch over the two, chosen from the CLI
//!
//! `--dump-dom` cannot run page scripts, so post-load [`PageAction`]s are
//! mapped onto browser flags: waits extend the virtual-time budget and scroll
//! offsets extend the window height so every region they would reveal is in
//! the viewport.

use crate::error::{AssetError, Result};
use crate::utils::truncate_for_log;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Browser binaries probed on `PATH`, in order.
const BROWSER_CANDIDATES: [&str; 4] = ["chromium", "chrome", "google-chrome", "chromium-browser"];

const WINDOW_WIDTH: u32 = 1280;
const BASE_WINDOW_HEIGHT: u32 = 1000;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 \
     (KHTML, like Gecko) Version/17.0 Safari/605.1.15";

/// Something to do after the page has loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAction {
    /// Scroll the window to a vertical offset in CSS pixels.
    ScrollTo(u32),
    Wait(Duration),
}

impl PageAction {
    /// Scroll-and-wait sequence that triggers the storefront's lazy loading.
    pub fn lazy_load_sequence() -> Vec<PageAction> {
        vec![
            PageAction::ScrollTo(500),
            PageAction::Wait(Duration::from_secs(1)),
            PageAction::ScrollTo(1000),
            PageAction::Wait(Duration::from_secs(2)),
            PageAction::ScrollTo(1500),
            PageAction::Wait(Duration::from_secs(2)),
        ]
    }
}

/// What to render and how long to give it.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub actions: Vec<PageAction>,
    /// Time the page gets after the actions before its DOM is captured.
    pub settle: Duration,
    /// Hard limit for the whole render.
    pub timeout: Duration,
}

impl RenderRequest {
    pub fn new(url: impl Into<String>) -> Self {
        RenderRequest {
            url: url.into(),
            headers: Vec::new(),
            actions: Vec::new(),
            settle: Duration::ZERO,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Total simulated time: every wait plus the settle delay.
    pub fn time_budget(&self) -> Duration {
        self.actions
            .iter()
            .filter_map(|a| match a {
                PageAction::Wait(d) => Some(*d),
                PageAction::ScrollTo(_) => None,
            })
            .sum::<Duration>()
            + self.settle
    }

    /// Window height exposing the deepest scroll offset.
    pub fn window_height(&self) -> u32 {
        let deepest = self
            .actions
            .iter()
            .filter_map(|a| match a {
                PageAction::ScrollTo(y) => Some(*y),
                PageAction::Wait(_) => None,
            })
            .max()
            .unwrap_or(0);
        BASE_WINDOW_HEIGHT + deepest
    }
}

/// Final page HTML and whether loading succeeded.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    pub success: bool,
}

/// Produces the HTML of a storefront page.
pub trait PageRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage>;
}

/// Headless Chromium driven through `--dump-dom`.
#[derive(Debug, Clone)]
pub struct HeadlessChrome {
    binary: PathBuf,
}

impl HeadlessChrome {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        HeadlessChrome {
            binary: binary.into(),
        }
    }

    /// Find the first known browser binary on `PATH`.
    pub fn discover() -> Option<Self> {
        let path = env::var_os("PATH")?;
        env::split_paths(&path)
            .flat_map(|dir| BROWSER_CANDIDATES.iter().map(move |name| dir.join(name)))
            .find(|candidate| candidate.is_file())
            .map(HeadlessChrome::new)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn args(&self, request: &RenderRequest) -> Vec<String> {
        let mut args = vec![
            "--headless=new".to_string(),
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            "--hide-scrollbars".to_string(),
            "--mute-audio".to_string(),
            format!("--window-size={},{}", WINDOW_WIDTH, request.window_height()),
            format!("--virtual-time-budget={}", request.time_budget().as_millis()),
            format!(
                "--user-agent={}",
                request.header("User-Agent").unwrap_or(USER_AGENT)
            ),
        ];
        if let Some(lang) = request.header("Accept-Language") {
            args.push(format!("--lang={lang}"));
        }
        args.push("--dump-dom".to_string());
        args.push(request.url.clone());
        args
    }
}

impl PageRenderer for HeadlessChrome {
    #[instrument(level = "info", skip_all, fields(url = %request.url))]
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage> {
        let t0 = Instant::now();
        let mut command = Command::new(&self.binary);
        command
            .args(self.args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(request.timeout, command.output())
            .await
            .map_err(|_| AssetError::Render(format!("timed out after {:?}", request.timeout)))??;

        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        let success = output.status.success() && !html.trim().is_empty();
        if !success {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                status = ?output.status,
                stderr = %truncate_for_log(stderr.trim(), 300),
                "Headless browser did not produce a page"
            );
        }
        info!(
            bytes = html.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            success,
            "Rendered page"
        );
        Ok(RenderedPage { html, success })
    }
}

/// Plain HTTP fetch of the page, for hosts without a browser.
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: reqwest::Client,
}

impl HttpRenderer {
    pub fn new(client: reqwest::Client) -> Self {
        HttpRenderer { client }
    }
}

impl PageRenderer for HttpRenderer {
    #[instrument(level = "info", skip_all, fields(url = %request.url))]
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage> {
        let mut builder = self
            .client
            .get(&request.url)
            .timeout(request.timeout)
            .header("User-Agent", request.header("User-Agent").unwrap_or(USER_AGENT));
        for (name, value) in request.headers.iter().filter(|(k, _)| !k.eq_ignore_ascii_case("User-Agent")) {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let success = response.status().is_success();
        let html = response.text().await?;
        debug!(bytes = html.len(), success, "Fetched page without rendering");
        Ok(RenderedPage { html, success })
    }
}

/// Which renderer the CLI asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RendererKind {
    /// Headless browser when one is installed, plain HTTP otherwise
    Auto,
    Chrome,
    Http,
}

/// The renderer used for a run.
#[derive(Debug, Clone)]
pub enum Renderer {
    Chrome(HeadlessChrome),
    Http(HttpRenderer),
}

impl Renderer {
    /// Pick a renderer for `kind`.
    ///
    /// `Chrome` uses `chrome_path` or the first browser on `PATH`; when none
    /// exists every render fails, which the resolver treats as "no scrape".
    pub fn select(kind: RendererKind, chrome_path: Option<&Path>, client: reqwest::Client) -> Self {
        let chrome = chrome_path
            .map(HeadlessChrome::new)
            .or_else(HeadlessChrome::discover);

        match (kind, chrome) {
            (RendererKind::Http, _) => Renderer::Http(HttpRenderer::new(client)),
            (_, Some(chrome)) => {
                info!(binary = %chrome.binary().display(), "Using headless browser renderer");
                Renderer::Chrome(chrome)
            }
            (RendererKind::Chrome, None) => {
                warn!("No headless browser found on PATH; storefront scraping will fail");
                Renderer::Chrome(HeadlessChrome::new(BROWSER_CANDIDATES[0]))
            }
            (RendererKind::Auto, None) => {
                warn!("No headless browser found; falling back to plain HTTP page fetches");
                Renderer::Http(HttpRenderer::new(client))
            }
        }
    }
}

impl PageRenderer for Renderer {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage> {
        match self {
            Renderer::Chrome(chrome) => chrome.render(request).await,
            Renderer::Http(http) => http.render(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storefront_request() -> RenderRequest {
        RenderRequest {
            headers: vec![("Accept-Language".to_string(), "tr-tr".to_string())],
            actions: PageAction::lazy_load_sequence(),
            settle: Duration::from_secs(5),
            ..RenderRequest::new("https://apps.apple.com/tr/app/id1?l=tr")
        }
    }

    #[test]
    fn test_time_budget_sums_waits_and_settle() {
        assert_eq!(storefront_request().time_budget(), Duration::from_secs(10));
        assert_eq!(RenderRequest::new("x").time_budget(), Duration::ZERO);
    }

    #[test]
    fn test_window_height_covers_deepest_scroll() {
        assert_eq!(storefront_request().window_height(), 2500);
        assert_eq!(RenderRequest::new("x").window_height(), BASE_WINDOW_HEIGHT);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = storefront_request();
        assert_eq!(req.header("accept-language"), Some("tr-tr"));
        assert_eq!(req.header("User-Agent"), None);
    }

    #[test]
    fn test_chrome_args() {
        let chrome = HeadlessChrome::new("/usr/bin/chromium");
        let args = chrome.args(&storefront_request());
        assert!(args.contains(&"--dump-dom".to_string()));
        assert!(args.contains(&"--lang=tr-tr".to_string()));
        assert!(args.contains(&"--virtual-time-budget=10000".to_string()));
        assert!(args.contains(&"--window-size=1280,2500".to_string()));
        assert_eq!(args.last().unwrap(), "https://apps.apple.com/tr/app/id1?l=tr");
    }

    #[test]
    fn test_select_http_renderer() {
        let renderer = Renderer::select(RendererKind::Http, None, reqwest::Client::new());
        assert!(matches!(renderer, Renderer::Http(_)));
    }

    #[test]
    fn test_select_explicit_chrome_path() {
        let renderer = Renderer::select(
            RendererKind::Auto,
            Some(Path::new("/opt/chromium/chrome")),
            reqwest::Client::new(),
        );
        match renderer {
            Renderer::Chrome(chrome) => assert_eq!(chrome.binary(), Path::new("/opt/chromium/chrome")),
            Renderer::Http(_) => panic!("expected chrome renderer"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let chrome = HeadlessChrome::new("/nonexistent/chromium-binary");
        let result = chrome.render(&RenderRequest::new("https://example.com")).await;
        assert!(matches!(result, Err(AssetError::Io(_))));
    }
}
