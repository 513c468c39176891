//! PDF report of the downloaded assets.
//!
//! Layout (landscape A4, origin bottom-left):
//! 1. Cover: title, first logo, app name, app info, summary counts.
//! 2. "First Screenshots": the first screenshot of every country in a
//!    4-column grid, spilling onto continuation pages.
//! 3. One page per country: logo and a 3-column screenshot grid, again with
//!    continuation pages.
//!
//! Images are down-scaled and re-encoded as JPEG before embedding so the
//! report stays small. An image that cannot be read is logged and left out.

use crate::error::Result;
use crate::models::{CountryResult, DownloadReport};
use image::ImageEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use std::path::Path;
use tracing::{info, instrument, warn};

pub const REPORT_FILE: &str = "assets_report.pdf";

const PAGE_WIDTH: f32 = 841.89;
const PAGE_HEIGHT: f32 = 595.28;
const JPEG_QUALITY: u8 = 85;

const OVERVIEW_MAX_WIDTH: u32 = 300;
const COUNTRY_MAX_WIDTH: u32 = 350;
const LOGO_MAX_WIDTH: u32 = 512;

#[derive(Debug, Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }

    /// Average glyph advance as a fraction of the font size. Close enough for
    /// centering Helvetica without shipping its metrics.
    fn average_advance(self) -> f32 {
        match self {
            Font::Regular => 0.5,
            Font::Bold => 0.55,
        }
    }

    fn text_width(self, size: f32, text: &str) -> f32 {
        text.chars().count() as f32 * size * self.average_advance()
    }
}

/// Standard fonts use WinAnsi; anything outside Latin-1 becomes `?`.
fn encode_text(text: &str) -> Vec<u8> {
    text.chars().map(|c| u8::try_from(c).unwrap_or(b'?')).collect()
}

/// `1234567` → `1,234,567`.
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// A JPEG ready to become an image XObject.
#[derive(Debug)]
struct PreparedImage {
    width: u32,
    height: u32,
    jpeg: Vec<u8>,
}

impl PreparedImage {
    /// Load `path`, shrink it to `max_width` keeping the aspect ratio, and
    /// re-encode it as JPEG.
    fn load(path: &Path, max_width: u32) -> Result<Self> {
        let mut img = image::open(path)?;
        if img.width() > max_width {
            let height = (img.height() as f64 * max_width as f64 / img.width() as f64)
                .round()
                .max(1.0) as u32;
            img = img.resize_exact(max_width, height, FilterType::Lanczos3);
        }
        let rgb = img.to_rgb8();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ColorType::Rgb8.into(),
        )?;
        Ok(PreparedImage {
            width: rgb.width(),
            height: rgb.height(),
            jpeg,
        })
    }

    /// Size fitting inside `max_w` x `max_h` with the aspect ratio kept.
    fn fit(&self, max_w: f32, max_h: f32) -> (f32, f32) {
        let (w, h) = (self.width as f32, self.height as f32);
        let scale = (max_w / w).min(max_h / h);
        (w * scale, h * scale)
    }
}

/// Operations and image references of the page being drawn.
#[derive(Default)]
struct Page {
    ops: Vec<Operation>,
    images: Vec<(String, ObjectId)>,
}

impl Page {
    fn text(&mut self, font: Font, size: f32, x: f32, y: f32, text: &str) {
        self.ops.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font.resource().into()), Object::Real(size)]),
            Operation::new("Td", vec![Object::Real(x), Object::Real(y)]),
            Operation::new(
                "Tj",
                vec![Object::String(encode_text(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
    }

    fn centered_text(&mut self, font: Font, size: f32, center_x: f32, y: f32, text: &str) {
        let x = center_x - font.text_width(size, text) / 2.0;
        self.text(font, size, x, y, text);
    }

    fn image(&mut self, id: ObjectId, x: f32, y: f32, width: f32, height: f32) {
        let name = format!("Im{}", self.images.len() + 1);
        self.ops.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(width),
                    Object::Real(0.0),
                    Object::Real(0.0),
                    Object::Real(height),
                    Object::Real(x),
                    Object::Real(y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.clone().into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        self.images.push((name, id));
    }
}

/// Accumulates pages into a `lopdf` document.
struct ReportBuilder {
    doc: Document,
    pages_id: ObjectId,
    fonts: Dictionary,
    page_ids: Vec<ObjectId>,
}

impl ReportBuilder {
    fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        ReportBuilder {
            doc,
            pages_id,
            fonts: dictionary! { "F1" => regular, "F2" => bold },
            page_ids: Vec::new(),
        }
    }

    /// Embed an image, or log and return `None` when it cannot be read.
    fn embed(&mut self, path: &str, max_width: u32) -> Option<(ObjectId, PreparedImage)> {
        let path = Path::new(path);
        if !path.is_file() {
            return None;
        }
        match PreparedImage::load(path, max_width) {
            Ok(img) => {
                let dict = dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => Object::Integer(img.width as i64),
                    "Height" => Object::Integer(img.height as i64),
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => Object::Integer(8),
                    "Filter" => "DCTDecode",
                };
                // Already JPEG; a second filter would only waste time
                let stream = Stream::new(dict, img.jpeg.clone()).with_compression(false);
                let id = self.doc.add_object(Object::Stream(stream));
                Some((id, img))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable image");
                None
            }
        }
    }

    fn finish_page(&mut self, page: Page) -> Result<()> {
        let content = Content {
            operations: page.ops,
        };
        let content_id = self
            .doc
            .add_object(Object::Stream(Stream::new(dictionary! {}, content.encode()?)));

        let mut xobjects = Dictionary::new();
        for (name, id) in page.images {
            xobjects.set(name, id);
        }
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => self.fonts.clone(),
                "XObject" => xobjects,
            },
        });
        self.page_ids.push(page_id);
        Ok(())
    }

    fn save(mut self, path: &Path) -> Result<usize> {
        let count = self.page_ids.len();
        let kids: Vec<Object> = self.page_ids.into_iter().map(Object::Reference).collect();
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count as i64),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(PAGE_WIDTH),
                Object::Real(PAGE_HEIGHT),
            ],
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();
        self.doc.save(path)?;
        Ok(count)
    }
}

/// Write the PDF report to `path`.
///
/// Returns `Ok(false)` without writing anything when no country produced a
/// logo or screenshot.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn write_pdf_report(report: &DownloadReport, path: &Path) -> Result<bool> {
    if !report.countries.iter().any(CountryResult::has_assets) {
        warn!("No assets were downloaded; skipping PDF report");
        return Ok(false);
    }

    let mut builder = ReportBuilder::new();
    cover_page(&mut builder, report)?;
    overview_pages(&mut builder, &report.countries)?;
    for result in &report.countries {
        country_pages(&mut builder, result)?;
    }

    let pages = builder.save(path)?;
    info!(pages, "Wrote PDF report");
    Ok(true)
}

fn cover_page(builder: &mut ReportBuilder, report: &DownloadReport) -> Result<()> {
    let center = PAGE_WIDTH / 2.0;
    let mut page = Page::default();
    page.centered_text(Font::Bold, 32.0, center, PAGE_HEIGHT - 80.0, "App Store Assets Report");

    let mut y = PAGE_HEIGHT - 150.0;
    let first_logo = report
        .countries
        .iter()
        .filter_map(|r| r.logo_path.as_deref())
        .find(|p| Path::new(p).is_file());
    if let Some((id, img)) = first_logo.and_then(|p| builder.embed(p, LOGO_MAX_WIDTH)) {
        let (w, h) = img.fit(200.0, 200.0);
        page.image(id, (PAGE_WIDTH - w) / 2.0, y - h, w, h);
        y -= h + 30.0;
    }

    page.centered_text(Font::Bold, 24.0, center, y, &report.app_name);
    y -= 40.0;

    let info = &report.app_info;
    let or_na = |v: &Option<String>| v.clone().unwrap_or_else(|| "N/A".to_string());
    page.centered_text(Font::Regular, 14.0, center, y, &format!("Developer: {}", or_na(&info.developer)));
    y -= 25.0;
    if let Some(rating) = info.rating.filter(|r| *r > 0.0) {
        let count = group_thousands(info.rating_count.unwrap_or(0));
        page.centered_text(
            Font::Regular,
            14.0,
            center,
            y,
            &format!("Rating: {rating:.1} ({count} ratings)"),
        );
        y -= 25.0;
    }
    page.centered_text(
        Font::Regular,
        14.0,
        center,
        y,
        &format!("{} - Version {}", or_na(&info.primary_genre), or_na(&info.version)),
    );
    y -= 25.0;
    page.centered_text(Font::Regular, 14.0, center, y, &format!("Price: {}", or_na(&info.price)));
    y -= 40.0;

    page.centered_text(Font::Bold, 16.0, center, y, "Summary");
    y -= 30.0;
    let summary = &report.summary;
    page.centered_text(
        Font::Regular,
        12.0,
        center,
        y,
        &format!(
            "Countries: {} | Logos: {} | Screenshots: {}",
            summary.total_countries, summary.total_logos_downloaded, summary.total_screenshots_downloaded
        ),
    );
    y -= 30.0;
    page.centered_text(
        Font::Regular,
        10.0,
        center,
        y,
        &format!("App ID: {} - Generated: {}", report.app_id, report.downloaded_at),
    );

    builder.finish_page(page)
}

fn overview_pages(builder: &mut ReportBuilder, results: &[CountryResult]) -> Result<()> {
    const MARGIN: f32 = 40.0;
    const COLS: usize = 4;
    const GAP: f32 = 20.0;
    const MAX_HEIGHT: f32 = 180.0;
    let cell_width = (PAGE_WIDTH - MARGIN * 2.0 - GAP * (COLS - 1) as f32) / COLS as f32;
    let center = PAGE_WIDTH / 2.0;

    let mut page = Page::default();
    page.centered_text(Font::Bold, 20.0, center, PAGE_HEIGHT - 50.0, "First Screenshots - All Countries");
    let mut x = MARGIN;
    let mut y = PAGE_HEIGHT - 100.0;
    let mut col = 0;

    for result in results {
        let Some(first) = result.screenshot_paths.first() else {
            continue;
        };
        let Some((id, img)) = builder.embed(first, OVERVIEW_MAX_WIDTH) else {
            continue;
        };
        let (w, h) = img.fit(cell_width, MAX_HEIGHT);

        if y - h - 40.0 < MARGIN {
            builder.finish_page(std::mem::take(&mut page))?;
            page.centered_text(
                Font::Bold,
                20.0,
                center,
                PAGE_HEIGHT - 50.0,
                "First Screenshots - All Countries (cont.)",
            );
            x = MARGIN;
            y = PAGE_HEIGHT - 100.0;
            col = 0;
        }

        page.image(id, x + (cell_width - w) / 2.0, y - h, w, h);
        page.centered_text(Font::Bold, 10.0, x + cell_width / 2.0, y - h - 15.0, &result.country.to_uppercase());

        col += 1;
        if col >= COLS {
            x = MARGIN;
            y -= MAX_HEIGHT + 50.0;
            col = 0;
        } else {
            x += cell_width + GAP;
        }
    }

    builder.finish_page(page)
}

fn country_pages(builder: &mut ReportBuilder, result: &CountryResult) -> Result<()> {
    const MARGIN_X: f32 = 50.0;
    const MARGIN_Y: f32 = 50.0;
    const COLS: usize = 3;
    const GAP: f32 = 15.0;
    const MAX_HEIGHT: f32 = 220.0;
    let cell_width = (PAGE_WIDTH - MARGIN_X * 2.0 - GAP * (COLS - 1) as f32) / COLS as f32;

    let country = result.country.to_uppercase();
    let language = result.language.as_deref().unwrap_or("N/A");
    let mut page = Page::default();
    page.text(Font::Bold, 20.0, MARGIN_X, PAGE_HEIGHT - 50.0, &format!("{country} | {language}"));
    let mut y = PAGE_HEIGHT - 100.0;

    if let Some((id, img)) = result
        .logo_path
        .as_deref()
        .and_then(|p| builder.embed(p, LOGO_MAX_WIDTH))
    {
        let (w, h) = img.fit(120.0, 120.0);
        page.image(id, MARGIN_X, y - h, w, h);
        page.text(Font::Regular, 9.0, MARGIN_X, y - h - 12.0, "App Logo");
        y -= h + 30.0;
    }

    if !result.screenshot_paths.is_empty() {
        page.text(
            Font::Bold,
            14.0,
            MARGIN_X,
            y,
            &format!("Screenshots ({})", result.screenshot_paths.len()),
        );
        y -= 35.0;

        let mut x = MARGIN_X;
        let mut col = 0;
        for shot in &result.screenshot_paths {
            let Some((id, img)) = builder.embed(shot, COUNTRY_MAX_WIDTH) else {
                continue;
            };
            let (w, h) = img.fit(cell_width, MAX_HEIGHT);

            if y - h < MARGIN_Y {
                builder.finish_page(std::mem::take(&mut page))?;
                page.text(Font::Bold, 16.0, MARGIN_X, PAGE_HEIGHT - 40.0, &format!("{country} (continued)"));
                y = PAGE_HEIGHT - 80.0;
                x = MARGIN_X;
                col = 0;
            }

            page.image(id, x, y - h, w, h);
            col += 1;
            if col >= COLS {
                x = MARGIN_X;
                y -= MAX_HEIGHT + GAP;
                col = 0;
            } else {
                x += cell_width + GAP;
            }
        }
    }

    builder.finish_page(page)
}
