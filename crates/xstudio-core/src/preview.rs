//! HTML preview: render surface contract, zoom and auto-sizing.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

pub const ZOOM_MIN: f64 = 0.25;
pub const ZOOM_MAX: f64 = 3.0;
pub const ZOOM_STEP: f64 = 0.1;

/// Written when there is no HTML to show.
pub const EMPTY_PREVIEW_HTML: &str =
    "<!DOCTYPE html><html><body><p>No HTML result yet.</p></body></html>";

/// Padding added to the measured content height.
const HEIGHT_PADDING: u32 = 20;

/// Preview zoom factor, always within [`ZOOM_MIN`, `ZOOM_MAX`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewZoom(f64);

impl Default for PreviewZoom {
    fn default() -> Self {
        Self(1.0)
    }
}

impl PreviewZoom {
    /// Clamps to the allowed range. Values are rounded to two decimals so
    /// repeated steps do not drift. Non-finite input falls back to 1.0.
    pub fn new(factor: f64) -> Self {
        if !factor.is_finite() {
            return Self::default();
        }
        let clamped = factor.clamp(ZOOM_MIN, ZOOM_MAX);
        Self((clamped * 100.0).round() / 100.0)
    }

    pub fn factor(self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn zoom_in(self) -> Self {
        Self::new(self.0 + ZOOM_STEP)
    }

    #[must_use]
    pub fn zoom_out(self) -> Self {
        Self::new(self.0 - ZOOM_STEP)
    }

    /// `NN%`
    pub fn label(self) -> String {
        format!("{}%", (self.0 * 100.0).round() as i64)
    }

    /// Parses a stored value; unparsable values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Self::new)
    }
}

impl fmt::Display for PreviewZoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Editor/preview arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutMode {
    /// Editors and preview side by side.
    #[default]
    Horizontal,
    /// Preview stacked below the editors; its height follows the content.
    Vertical,
}

impl LayoutMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutMode::Horizontal => "horizontal",
            LayoutMode::Vertical => "vertical",
        }
    }

    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            LayoutMode::Horizontal => LayoutMode::Vertical,
            LayoutMode::Vertical => LayoutMode::Horizontal,
        }
    }
}

impl FromStr for LayoutMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "horizontal" => Ok(LayoutMode::Horizontal),
            "vertical" => Ok(LayoutMode::Vertical),
            other => Err(format!("unknown layout '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButton {
    #[default]
    Primary,
    Middle,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

/// A click inside the rendered preview.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreviewClick {
    pub button: MouseButton,
    pub modifiers: Modifiers,
    /// Text content of the clicked element.
    pub text: String,
}

impl PreviewClick {
    /// Only Ctrl/Cmd + primary clicks navigate back to the stylesheet.
    pub fn is_navigation(&self) -> bool {
        self.button == MouseButton::Primary && (self.modifiers.ctrl || self.modifiers.meta)
    }
}

pub type ClickHandler = Arc<dyn Fn(PreviewClick) + Send + Sync>;

/// The surface the preview is drawn on.
pub trait RenderSurface: Send {
    /// Replaces the whole document.
    fn write_html(&mut self, html: &str) -> Result<()>;

    fn apply_zoom(&mut self, zoom: PreviewZoom) -> Result<()>;

    /// Height of the rendered content in pixels, if the surface can tell.
    fn content_height(&self) -> Option<u32>;

    /// Fixes the surface height; `None` lets the layout decide.
    fn set_height(&mut self, height: Option<u32>);

    /// Installs the click handler for the current document.
    fn attach_click_handler(&mut self, _handler: ClickHandler) {}
}

/// Drives a `RenderSurface`.
#[derive(Clone)]
pub struct PreviewRenderer {
    measure_delay: Duration,
    max_height: u32,
    click_handler: Option<ClickHandler>,
}

impl fmt::Debug for PreviewRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewRenderer")
            .field("measure_delay", &self.measure_delay)
            .field("max_height", &self.max_height)
            .field("click_handler", &self.click_handler.is_some())
            .finish()
    }
}

impl Default for PreviewRenderer {
    fn default() -> Self {
        Self::new(Duration::from_millis(50), 2000)
    }
}

impl PreviewRenderer {
    pub fn new(measure_delay: Duration, max_height: u32) -> Self {
        Self {
            measure_delay,
            max_height,
            click_handler: None,
        }
    }

    pub fn measure_delay(&self) -> Duration {
        self.measure_delay
    }

    pub fn set_click_handler(&mut self, handler: ClickHandler) {
        self.click_handler = Some(handler);
    }

    /// Writes `html` (or the placeholder), re-wires clicks and applies zoom.
    ///
    /// Returns true when the caller should schedule `finish_measure` after
    /// `measure_delay` (vertical layout only).
    pub fn render(
        &self,
        surface: &mut dyn RenderSurface,
        html: &str,
        zoom: PreviewZoom,
        layout: LayoutMode,
    ) -> Result<bool> {
        let document = if html.is_empty() { EMPTY_PREVIEW_HTML } else { html };
        surface.write_html(document)?;
        if let Some(handler) = &self.click_handler {
            surface.attach_click_handler(Arc::clone(handler));
        }
        surface.apply_zoom(zoom)?;

        match layout {
            LayoutMode::Horizontal => {
                surface.set_height(None);
                Ok(false)
            }
            LayoutMode::Vertical => Ok(true),
        }
    }

    /// Sizes the surface to its content. Returns the applied height.
    pub fn finish_measure(&self, surface: &mut dyn RenderSurface) -> Option<u32> {
        let content = surface.content_height()?;
        let height = content.saturating_add(HEIGHT_PADDING).min(self.max_height);
        surface.set_height(Some(height));
        Some(height)
    }
}

/// Inserts a CSS zoom rule into an HTML document.
pub fn inject_zoom(html: &str, zoom: PreviewZoom) -> String {
    let style = format!("<style>html {{ zoom: {}; }}</style>", zoom.factor());
    let lower = html.to_ascii_lowercase();
    let anchor = lower
        .find("<head")
        .or_else(|| lower.find("<html"))
        .and_then(|start| html[start..].find('>').map(|end| start + end + 1));
    match anchor {
        Some(pos) => format!("{}{style}{}", &html[..pos], &html[pos..]),
        None => format!("{style}{html}"),
    }
}

/// In-memory surface used by tests and headless sessions.
#[derive(Default)]
pub struct HeadlessSurface {
    html: String,
    zoom: Option<PreviewZoom>,
    height: Option<u32>,
    content_height: Option<u32>,
    writes: usize,
    handler: Option<ClickHandler>,
}

impl fmt::Debug for HeadlessSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessSurface")
            .field("html", &self.html)
            .field("zoom", &self.zoom)
            .field("height", &self.height)
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretends the rendered content is `height` pixels tall.
    #[must_use]
    pub fn with_content_height(mut self, height: u32) -> Self {
        self.content_height = Some(height);
        self
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn zoom(&self) -> Option<PreviewZoom> {
        self.zoom
    }

    pub fn height(&self) -> Option<u32> {
        self.height
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Simulates a click. Returns false when no handler is attached.
    pub fn click(&self, click: PreviewClick) -> bool {
        match &self.handler {
            Some(handler) => {
                handler(click);
                true
            }
            None => false,
        }
    }
}

impl RenderSurface for HeadlessSurface {
    fn write_html(&mut self, html: &str) -> Result<()> {
        self.html = html.to_string();
        self.writes += 1;
        self.handler = None;
        Ok(())
    }

    fn apply_zoom(&mut self, zoom: PreviewZoom) -> Result<()> {
        self.zoom = Some(zoom);
        Ok(())
    }

    fn content_height(&self) -> Option<u32> {
        self.content_height
    }

    fn set_height(&mut self, height: Option<u32>) {
        self.height = height;
    }

    fn attach_click_handler(&mut self, handler: ClickHandler) {
        self.handler = Some(handler);
    }
}

/// Writes the preview to an HTML file, zoom baked in as CSS.
#[derive(Debug, Clone)]
pub struct FileSurface {
    path: PathBuf,
    html: String,
    zoom: PreviewZoom,
}

impl FileSurface {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            html: String::new(),
            zoom: PreviewZoom::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let content = inject_zoom(&self.html, self.zoom);
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let tmp_path = self.path.with_extension("html.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write preview to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                self.path.display()
            )
        })
    }
}

impl RenderSurface for FileSurface {
    fn write_html(&mut self, html: &str) -> Result<()> {
        self.html = html.to_string();
        self.flush()
    }

    fn apply_zoom(&mut self, zoom: PreviewZoom) -> Result<()> {
        if zoom == self.zoom {
            return Ok(());
        }
        self.zoom = zoom;
        self.flush()
    }

    fn content_height(&self) -> Option<u32> {
        None
    }

    fn set_height(&mut self, _height: Option<u32>) {}
}
