//! Session state and its reducer.
//!
//! `Studio` is the single owner of everything the editor shows. It is only
//! mutated by [`update`], which returns [`StudioEffect`]s for the runtime to
//! execute.

mod effects;
mod events;
mod update;

use std::time::Duration;

pub use effects::StudioEffect;
pub use events::{PanelSetting, StudioEvent};
pub use update::update;

use crate::buffer::SourceBuffers;
use crate::config::Config;
use crate::debounce::Debounce;
use crate::diagnostics::DiagnosticLog;
use crate::doc_info::{self, DocumentInfo};
use crate::navigator::{CrossViewNavigator, HighlightKind};
use crate::preview::{LayoutMode, PreviewZoom};
use crate::scheduler::TransformScheduler;
use crate::storage::{Panel, SessionSnapshot};
use crate::transform::XsltVersion;
use crate::tree::{TreeView, XmlViewMode};

/// Timers the runtime keeps. One live handle per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Transform,
    TreeRender,
    Highlight(HighlightKind),
    PreviewMeasure,
}

/// Tunables for a new session.
#[derive(Debug, Clone)]
pub struct StudioOptions {
    pub transform_debounce: Duration,
    pub tree_debounce: Duration,
    pub highlight: Duration,
    pub measure_delay: Duration,
    pub auto_update: bool,
    pub xslt_version: XsltVersion,
    pub zoom: PreviewZoom,
}

impl Default for StudioOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl StudioOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            transform_debounce: Duration::from_millis(config.editor.transform_debounce_ms),
            tree_debounce: Duration::from_millis(config.editor.tree_debounce_ms),
            highlight: Duration::from_millis(config.editor.highlight_ms),
            measure_delay: Duration::from_millis(config.preview.measure_delay_ms),
            auto_update: config.editor.auto_update,
            xslt_version: config.editor.default_xslt_version,
            zoom: PreviewZoom::new(config.preview.default_zoom),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreviewState {
    /// HTML of the last successful transform. Empty until one succeeds.
    pub last_html: String,
    pub zoom: PreviewZoom,
    pub layout: LayoutMode,
    pub(crate) measure: Debounce,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanelState {
    pub config_visible: bool,
    pub log_visible: bool,
    pub xml_collapsed: bool,
    pub xslt_collapsed: bool,
    pub doc_info_collapsed: bool,
    pub heights: [Option<u32>; 3],
}

impl PanelState {
    pub fn height(&self, panel: Panel) -> Option<u32> {
        self.heights[panel.index()]
    }

    pub(crate) fn set_height(&mut self, panel: Panel, height: Option<u32>) {
        self.heights[panel.index()] = height;
    }
}

#[derive(Debug, Clone)]
pub struct Studio {
    pub buffers: SourceBuffers,
    pub diagnostics: DiagnosticLog,
    pub scheduler: TransformScheduler,
    pub doc_info: DocumentInfo,
    pub tree: TreeView,
    pub(crate) tree_debounce: Debounce,
    pub view_mode: XmlViewMode,
    pub navigator: CrossViewNavigator,
    pub auto_update: bool,
    pub xslt_version: XsltVersion,
    pub preview: PreviewState,
    pub panels: PanelState,
}

impl Default for Studio {
    fn default() -> Self {
        Self::new(&StudioOptions::default())
    }
}

impl Studio {
    pub fn new(options: &StudioOptions) -> Self {
        Self {
            buffers: SourceBuffers::default(),
            diagnostics: DiagnosticLog::new(),
            scheduler: TransformScheduler::new(options.transform_debounce),
            doc_info: DocumentInfo::default(),
            tree: TreeView::default(),
            tree_debounce: Debounce::new(options.tree_debounce),
            view_mode: XmlViewMode::Text,
            navigator: CrossViewNavigator::new(options.highlight),
            auto_update: options.auto_update,
            xslt_version: options.xslt_version,
            preview: PreviewState {
                last_html: String::new(),
                zoom: options.zoom,
                layout: LayoutMode::Horizontal,
                measure: Debounce::new(options.measure_delay),
            },
            panels: PanelState::default(),
        }
    }

    /// Engine label for the status line.
    pub fn engine_label(&self) -> String {
        self.scheduler.indicator().label()
    }

    /// XPath of the selected tree node, shown next to the tree.
    pub fn selected_xpath(&self) -> Option<&str> {
        self.tree.selected_xpath()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            xml: self.buffers.xml.text(),
            xslt: self.buffers.xslt.text(),
            html: self.preview.last_html.clone(),
            auto_update: self.auto_update,
            layout: self.preview.layout,
            xslt_version: self.xslt_version,
            config_visible: self.panels.config_visible,
            log_visible: self.panels.log_visible,
            xml_collapsed: self.panels.xml_collapsed,
            xslt_collapsed: self.panels.xslt_collapsed,
            doc_info_collapsed: self.panels.doc_info_collapsed,
            preview_zoom: self.preview.zoom,
            xml_view_mode: self.view_mode,
            panel_heights: self.panels.heights,
        }
    }

    pub(crate) fn refresh_doc_info(&mut self) {
        self.doc_info = doc_info::extract(&self.buffers.xml.text());
    }
}
