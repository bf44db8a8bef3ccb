//! Output conversion: drive a headless browser to turn rendered markup into
//! a PDF or a raster screenshot.
//!
//! ## Why spawn_blocking?
//!
//! `headless_chrome` talks to Chrome over a synchronous CDP client and blocks
//! the calling thread for every round-trip. The whole browser sequence
//! therefore runs on tokio's blocking pool, keeping worker threads free.
//!
//! ## Lifecycle
//!
//! Each conversion owns one browser: launch → new tab → (navigate to the
//! template file) → set content → print/screenshot → close. The browser and
//! tab live in an [`EngineSession`] whose `Drop` closes the tab and whose
//! browser field kills the Chrome process when it goes, so every exit path
//! releases the process, including a failed print.
//!
//! ## Relative assets
//!
//! For template-file sources the tab first navigates to the template's
//! `file://` URL, then its document is replaced with the rendered markup.
//! The document keeps the file URL as its base, so relative CSS and image
//! references resolve against the template directory without writing a
//! temporary file.

use crate::config::ServiceConfig;
use crate::error::HtmlTemplatingError;
use headless_chrome::protocol::cdp::Page::{CaptureScreenshotFormatOption, Viewport};
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Deserialize;
use serde_json::Value;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// ── Options ──────────────────────────────────────────────────────────────

/// A length given either as CSS pixels or as a string with a unit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Length {
    Px(f64),
    Text(String),
}

impl Length {
    /// Convert to inches, the unit CDP's `Page.printToPDF` expects.
    pub fn to_inches(&self) -> Option<f64> {
        match self {
            Length::Px(px) => Some(px / 96.0),
            Length::Text(s) => {
                let s = s.trim().to_ascii_lowercase();
                let (num, per_inch) = if let Some(n) = s.strip_suffix("px") {
                    (n, 96.0)
                } else if let Some(n) = s.strip_suffix("in") {
                    (n, 1.0)
                } else if let Some(n) = s.strip_suffix("cm") {
                    (n, 2.54)
                } else if let Some(n) = s.strip_suffix("mm") {
                    (n, 25.4)
                } else {
                    (s.as_str(), 96.0)
                };
                num.trim().parse::<f64>().ok().map(|v| v / per_inch)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Margin {
    pub top: Option<Length>,
    pub right: Option<Length>,
    pub bottom: Option<Length>,
    pub left: Option<Length>,
}

/// PDF options, named after the Puppeteer `page.pdf()` options callers send.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfOptions {
    pub print_background: Option<bool>,
    pub landscape: Option<bool>,
    pub display_header_footer: Option<bool>,
    pub header_template: Option<String>,
    pub footer_template: Option<String>,
    pub scale: Option<f64>,
    pub format: Option<String>,
    pub width: Option<Length>,
    pub height: Option<Length>,
    pub margin: Option<Margin>,
    pub page_ranges: Option<String>,
    #[serde(rename = "preferCSSPageSize")]
    pub prefer_css_page_size: Option<bool>,
}

/// Screenshot encodings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageType {
    Jpeg,
    #[default]
    Png,
}

impl ImageType {
    /// `jpeg` selects JPEG; anything else, including no value, is PNG.
    pub fn from_options(options: &Value) -> Self {
        match options.get("type").and_then(Value::as_str) {
            Some("jpeg") => ImageType::Jpeg,
            _ => ImageType::Png,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageType::Jpeg => "image/jpeg",
            ImageType::Png => "image/png",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Clip {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Screenshot options, named after the Puppeteer `page.screenshot()` options.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOptions {
    #[serde(skip)]
    pub image_type: ImageType,
    pub quality: Option<u32>,
    pub full_page: Option<bool>,
    pub clip: Option<Clip>,
}

/// What the engine should produce.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputKind {
    Pdf(PdfOptions),
    Image(ImageOptions),
}

impl OutputKind {
    fn label(&self) -> &'static str {
        match self {
            OutputKind::Pdf(_) => "pdf",
            OutputKind::Image(_) => "image",
        }
    }
}

/// Parse caller options for a PDF.
pub fn pdf_options(options: &Value) -> Result<PdfOptions, HtmlTemplatingError> {
    let parsed: PdfOptions =
        serde_json::from_value(options.clone()).map_err(|e| invalid_options("pdf", e.to_string()))?;
    if let Some(ref f) = parsed.format {
        if paper_size(f).is_none() {
            return Err(invalid_options("pdf", format!("unknown paper format '{f}'")));
        }
    }
    Ok(parsed)
}

/// Parse caller options for a screenshot.
pub fn image_options(options: &Value) -> Result<ImageOptions, HtmlTemplatingError> {
    let mut parsed: ImageOptions =
        serde_json::from_value(options.clone()).map_err(|e| invalid_options("image", e.to_string()))?;
    parsed.image_type = ImageType::from_options(options);
    if let Some(q) = parsed.quality {
        if q > 100 {
            return Err(invalid_options("image", format!("quality must be 0–100, got {q}")));
        }
    }
    Ok(parsed)
}

fn invalid_options(format: &str, detail: String) -> HtmlTemplatingError {
    HtmlTemplatingError::InvalidOptions {
        format: format.to_string(),
        detail,
    }
}

/// Paper size in inches (width, height) for a named format.
pub fn paper_size(format: &str) -> Option<(f64, f64)> {
    let size = match format.to_ascii_lowercase().as_str() {
        "letter" => (8.5, 11.0),
        "legal" => (8.5, 14.0),
        "tabloid" => (11.0, 17.0),
        "ledger" => (17.0, 11.0),
        "a0" => (33.1, 46.8),
        "a1" => (23.4, 33.1),
        "a2" => (16.54, 23.4),
        "a3" => (11.7, 16.54),
        "a4" => (8.27, 11.7),
        "a5" => (5.83, 8.27),
        "a6" => (4.13, 5.83),
        _ => return None,
    };
    Some(size)
}

fn inches(len: &Option<Length>, what: &str) -> Result<Option<f64>, HtmlTemplatingError> {
    match len {
        None => Ok(None),
        Some(l) => l
            .to_inches()
            .map(Some)
            .ok_or_else(|| invalid_options("pdf", format!("cannot parse {what} length {l:?}"))),
    }
}

impl PdfOptions {
    /// Map onto the CDP print parameters.
    pub fn to_print_options(&self) -> Result<PrintToPdfOptions, HtmlTemplatingError> {
        let (mut paper_width, mut paper_height) = match self.format.as_deref().and_then(paper_size) {
            Some((w, h)) => (Some(w), Some(h)),
            None => (None, None),
        };
        if self.format.is_none() {
            paper_width = inches(&self.width, "width")?;
            paper_height = inches(&self.height, "height")?;
        }
        let margin = self.margin.clone().unwrap_or_default();

        Ok(PrintToPdfOptions {
            landscape: self.landscape,
            display_header_footer: self.display_header_footer,
            print_background: self.print_background,
            scale: self.scale,
            paper_width,
            paper_height,
            margin_top: inches(&margin.top, "margin.top")?,
            margin_bottom: inches(&margin.bottom, "margin.bottom")?,
            margin_left: inches(&margin.left, "margin.left")?,
            margin_right: inches(&margin.right, "margin.right")?,
            page_ranges: self.page_ranges.clone(),
            header_template: self.header_template.clone(),
            footer_template: self.footer_template.clone(),
            prefer_css_page_size: self.prefer_css_page_size,
            ..Default::default()
        })
    }
}

// ── Engine seam ──────────────────────────────────────────────────────────

/// Everything a conversion needs, owned so it can cross into a blocking task.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineJob {
    /// Fully rendered (and possibly watermarked) markup.
    pub html: String,
    /// Template file to navigate to first, for relative asset resolution.
    pub base_file: Option<PathBuf>,
    pub output: OutputKind,
}

/// A headless rendering backend. Implementations block.
pub trait DocumentEngine: Send + Sync {
    /// Produce the PDF or image bytes for `job`.
    fn convert(&self, job: &EngineJob) -> Result<Vec<u8>, HtmlTemplatingError>;
}

/// Run `job` on `engine` from async code.
pub async fn run(engine: Arc<dyn DocumentEngine>, job: EngineJob) -> Result<Vec<u8>, HtmlTemplatingError> {
    tokio::task::spawn_blocking(move || engine.convert(&job))
        .await
        .map_err(|e| HtmlTemplatingError::Internal(format!("Engine task panicked: {}", e)))?
}

// ── Chrome ───────────────────────────────────────────────────────────────

/// [`DocumentEngine`] backed by a fresh headless Chrome per conversion.
#[derive(Debug, Clone)]
pub struct ChromeEngine {
    chrome_path: Option<PathBuf>,
    sandbox: bool,
    timeout: Duration,
}

impl ChromeEngine {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            chrome_path: config.chrome_path.clone(),
            sandbox: config.sandbox,
            timeout: Duration::from_secs(config.engine_timeout_secs),
        }
    }
}

impl DocumentEngine for ChromeEngine {
    fn convert(&self, job: &EngineJob) -> Result<Vec<u8>, HtmlTemplatingError> {
        let session = EngineSession::launch(self)?;
        session.load(job)?;
        let bytes = session.extract(&job.output)?;
        debug!("{} conversion produced {} bytes", job.output.label(), bytes.len());
        Ok(bytes)
    }
}

/// One browser with one tab, closed on drop.
struct EngineSession {
    tab: Arc<Tab>,
    // Dropped after `tab`; its own Drop kills the Chrome process.
    _browser: Browser,
}

impl EngineSession {
    fn launch(engine: &ChromeEngine) -> Result<Self, HtmlTemplatingError> {
        info!("...launching headless browser");
        let mut args: Vec<&OsStr> = Vec::new();
        if !engine.sandbox {
            args.push(OsStr::new("--disable-setuid-sandbox"));
        }
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(engine.sandbox)
            .path(engine.chrome_path.clone())
            .idle_browser_timeout(engine.timeout)
            .args(args)
            .build()
            .map_err(|e| HtmlTemplatingError::BrowserLaunchFailed(e.to_string()))?;

        let browser =
            Browser::new(options).map_err(|e| HtmlTemplatingError::BrowserLaunchFailed(format!("{e:#}")))?;

        debug!("...creating new page");
        let tab = browser
            .new_tab()
            .map_err(|e| HtmlTemplatingError::NavigationFailed {
                target: "about:blank".into(),
                detail: format!("{e:#}"),
            })?;
        tab.set_default_timeout(engine.timeout);

        Ok(Self {
            tab,
            _browser: browser,
        })
    }

    fn load(&self, job: &EngineJob) -> Result<(), HtmlTemplatingError> {
        if let Some(ref file) = job.base_file {
            let url = file_url(file)?;
            debug!("...navigating to {}", url);
            self.tab
                .navigate_to(&url)
                .and_then(|t| t.wait_until_navigated())
                .map_err(|e| HtmlTemplatingError::NavigationFailed {
                    target: url.clone(),
                    detail: format!("{e:#}"),
                })?;
        }

        debug!("...setting page content, content size = {}", job.html.len());
        let script = set_content_script(&job.html)?;
        self.tab
            .evaluate(&script, true)
            .map_err(|e| HtmlTemplatingError::NavigationFailed {
                target: "page content".into(),
                detail: format!("{e:#}"),
            })?;
        Ok(())
    }

    fn extract(&self, output: &OutputKind) -> Result<Vec<u8>, HtmlTemplatingError> {
        let failed = |e: anyhow::Error| HtmlTemplatingError::ConversionFailed {
            format: output.label().to_string(),
            detail: format!("{e:#}"),
        };
        match output {
            OutputKind::Pdf(opts) => {
                info!("...creating pdf");
                let print = opts.to_print_options()?;
                self.tab.print_to_pdf(Some(print)).map_err(failed)
            }
            OutputKind::Image(opts) => {
                info!("...creating screenshot");
                let format = match opts.image_type {
                    ImageType::Jpeg => CaptureScreenshotFormatOption::Jpeg,
                    ImageType::Png => CaptureScreenshotFormatOption::Png,
                };
                let quality = match opts.image_type {
                    ImageType::Jpeg => opts.quality,
                    ImageType::Png => None,
                };
                let clip = match (opts.clip, opts.full_page) {
                    (Some(c), _) => Some(viewport(c)),
                    (None, Some(true)) => Some(self.full_page_clip()?),
                    _ => None,
                };
                self.tab
                    .capture_screenshot(format, quality, clip, true)
                    .map_err(failed)
            }
        }
    }

    fn full_page_clip(&self) -> Result<Viewport, HtmlTemplatingError> {
        let failed = |detail: String| HtmlTemplatingError::ConversionFailed {
            format: "image".into(),
            detail,
        };
        let size = self
            .tab
            .evaluate(
                "JSON.stringify([document.documentElement.scrollWidth, document.documentElement.scrollHeight])",
                false,
            )
            .map_err(|e| failed(format!("{e:#}")))?;
        let raw = size
            .value
            .as_ref()
            .and_then(Value::as_str)
            .ok_or_else(|| failed("page size unavailable".into()))?;
        let [width, height]: [f64; 2] =
            serde_json::from_str(raw).map_err(|e| failed(format!("page size: {e}")))?;
        Ok(viewport(Clip {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }))
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        info!("...closing headless browser");
        if let Err(e) = self.tab.close(false) {
            warn!("Closing tab failed, browser process is killed anyway: {e:#}");
        }
    }
}

fn viewport(c: Clip) -> Viewport {
    Viewport {
        x: c.x,
        y: c.y,
        width: c.width,
        height: c.height,
        scale: 1.0,
    }
}

/// `file://` URL for a template path, made absolute first.
pub fn file_url(path: &Path) -> Result<String, HtmlTemplatingError> {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| HtmlTemplatingError::Internal(format!("current dir: {e}")))?
            .join(path)
    };
    reqwest::Url::from_file_path(&abs)
        .map(|u| u.to_string())
        .map_err(|_| HtmlTemplatingError::NavigationFailed {
            target: abs.display().to_string(),
            detail: "not a valid file path".into(),
        })
}

/// Script that replaces the current document with `html` and resolves once
/// the new document has loaded.
pub fn set_content_script(html: &str) -> Result<String, HtmlTemplatingError> {
    let literal = serde_json::to_string(html)
        .map_err(|e| HtmlTemplatingError::Internal(format!("encode page content: {e}")))?;
    Ok(format!(
        "new Promise(resolve => {{ document.open(); document.write({literal}); document.close(); \
         if (document.readyState === 'complete') {{ resolve(true); }} \
         else {{ window.addEventListener('load', () => resolve(true), {{ once: true }}); }} }})"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn image_type_selection() {
        assert_eq!(ImageType::from_options(&json!({"type": "jpeg"})), ImageType::Jpeg);
        assert_eq!(ImageType::from_options(&json!({"type": "png"})), ImageType::Png);
        assert_eq!(ImageType::from_options(&json!({"type": "webp"})), ImageType::Png);
        assert_eq!(ImageType::from_options(&json!({})), ImageType::Png);
        assert_eq!(ImageType::Jpeg.content_type(), "image/jpeg");
    }

    #[test]
    fn pdf_options_map_to_print_params() {
        let opts = pdf_options(&json!({
            "printBackground": true,
            "landscape": true,
            "format": "A4",
            "margin": {"top": "1in", "bottom": "2.54cm", "left": 96, "right": "25.4mm"},
            "pageRanges": "1-2",
            "somethingElse": 3
        }))
        .unwrap();
        let p = opts.to_print_options().unwrap();
        assert_eq!(p.print_background, Some(true));
        assert_eq!(p.landscape, Some(true));
        assert_eq!(p.paper_width, Some(8.27));
        assert_eq!(p.paper_height, Some(11.7));
        for m in [p.margin_top, p.margin_bottom, p.margin_left, p.margin_right] {
            assert!((m.unwrap() - 1.0).abs() < 1e-9, "{m:?}");
        }
        assert_eq!(p.page_ranges.as_deref(), Some("1-2"));
    }

    #[test]
    fn explicit_size_without_format() {
        let opts = pdf_options(&json!({"width": "210mm", "height": 1056})).unwrap();
        let p = opts.to_print_options().unwrap();
        assert!((p.paper_width.unwrap() - 210.0 / 25.4).abs() < 1e-9);
        assert_eq!(p.paper_height, Some(11.0));
    }

    #[test]
    fn bad_pdf_options_are_rejected() {
        assert!(pdf_options(&json!({"format": "B7"})).is_err());
        assert!(pdf_options(&json!({"landscape": "yes"})).is_err());
        assert!(pdf_options(&json!("printBackground")).is_err());
        let opts = pdf_options(&json!({"margin": {"top": "wide"}})).unwrap();
        assert!(opts.to_print_options().is_err());
    }

    #[test]
    fn image_options_parse() {
        let o = image_options(&json!({"type": "jpeg", "quality": 80, "fullPage": true})).unwrap();
        assert_eq!(o.image_type, ImageType::Jpeg);
        assert_eq!(o.quality, Some(80));
        assert_eq!(o.full_page, Some(true));
        assert!(image_options(&json!({"quality": 101})).is_err());
        assert!(image_options(&json!({"clip": {"x": 0}})).is_err());
    }

    #[test]
    fn length_units() {
        assert_eq!(Length::Px(48.0).to_inches(), Some(0.5));
        assert_eq!(Length::Text("2in".into()).to_inches(), Some(2.0));
        assert_eq!(Length::Text("192".into()).to_inches(), Some(2.0));
        assert_eq!(Length::Text("auto".into()).to_inches(), None);
    }

    #[cfg(unix)]
    #[test]
    fn file_urls_are_absolute() {
        assert_eq!(
            file_url(Path::new("/srv/t/index.html")).unwrap(),
            "file:///srv/t/index.html"
        );
        let rel = file_url(Path::new("t/index.html")).unwrap();
        assert!(rel.starts_with("file:///") && rel.ends_with("/t/index.html"));
    }

    #[test]
    fn content_script_escapes_markup() {
        let s = set_content_script("<p>\"quoted\"</script>\n</p>").unwrap();
        assert!(s.contains(r#"document.write("<p>\"quoted\"</script>\n</p>")"#));
    }

    struct FailingEngine;

    impl DocumentEngine for FailingEngine {
        fn convert(&self, job: &EngineJob) -> Result<Vec<u8>, HtmlTemplatingError> {
            Err(HtmlTemplatingError::ConversionFailed {
                format: job.output.label().into(),
                detail: "boom".into(),
            })
        }
    }

    #[tokio::test]
    async fn run_propagates_engine_errors() {
        let job = EngineJob {
            html: "<html></html>".into(),
            base_file: None,
            output: OutputKind::Pdf(PdfOptions::default()),
        };
        let err = run(Arc::new(FailingEngine), job).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("boom"));
    }
}
