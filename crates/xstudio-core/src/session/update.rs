//! Session reducer.
//!
//! All state mutations happen here. Handlers return effects instead of
//! touching timers, the network, storage or the preview surface.

use crate::buffer::{Edit, SourceKind};
use crate::export::ExportKind;
use crate::image::{self, ImageAsset, ImageInsertMode};
use crate::navigator::{HighlightKind, PreviewJump};
use crate::preview::{LayoutMode, PreviewClick, PreviewZoom};
use crate::sample::{BUILTIN_XML, BUILTIN_XSLT};
use crate::scheduler::Dispatch;
use crate::storage::StoredSession;
use crate::transform::{
    EngineKind, SampleBundle, ServiceError, TransformResult, XsltVersion, detect_xslt_version,
};
use crate::tree::XmlViewMode;

use super::{PanelSetting, Studio, StudioEffect, StudioEvent, TimerKind};

pub fn update(studio: &mut Studio, event: StudioEvent) -> Vec<StudioEffect> {
    match event {
        StudioEvent::Restored(stored) => handle_restored(studio, stored),

        StudioEvent::Edited { source, edit } => handle_edit(studio, source, edit),
        StudioEvent::InsertImage { image, mode } => handle_insert_image(studio, &image, mode),
        StudioEvent::FileImported { source, file } => {
            studio.buffers.get_mut(source).set_text(&file.text);
            studio
                .diagnostics
                .info(format!("Loaded {} from file: {}", source.label(), file.name));
            if !studio.auto_update {
                studio
                    .diagnostics
                    .info("Auto-update is off – run Generate to apply changes.");
            }
            after_edit(studio, source)
        }
        StudioEvent::LoadBuiltinSample => {
            let mut effects = load_pair(studio, BUILTIN_XML, BUILTIN_XSLT);
            studio.diagnostics.info("Loaded sample XML/XSLT content.");
            effects.push(persist(studio));
            if studio.auto_update {
                schedule_transform(studio, &mut effects);
            }
            effects
        }
        StudioEvent::ClearEditors => {
            studio.buffers.xml.set_text("");
            studio.buffers.xslt.set_text("");
            let mut effects = Vec::new();
            refresh_xml_views(studio, &mut effects);
            studio.diagnostics.info("Cleared XML and XSLT editors.");
            effects.push(persist(studio));
            effects
        }
        StudioEvent::Search { source, query } => {
            let count = studio.buffers.get_mut(source).search_for(&query);
            tracing::debug!(%source, count, "search updated");
            vec![]
        }
        StudioEvent::SearchStep { source, forward } => {
            studio.buffers.get_mut(source).search_step(forward);
            vec![]
        }

        StudioEvent::Generate => {
            let mut effects = Vec::new();
            do_transform(studio, &mut effects);
            effects
        }
        StudioEvent::TimerFired { kind, generation } => {
            handle_timer(studio, kind, generation)
        }
        StudioEvent::TransformCompleted {
            seq,
            version,
            outcome,
        } => handle_transform_completed(studio, seq, version, outcome),
        StudioEvent::SampleRequested => vec![StudioEffect::FetchSample],
        StudioEvent::SampleLoaded(outcome) => handle_sample_loaded(studio, outcome),

        StudioEvent::SetAutoUpdate(enabled) => {
            studio.auto_update = enabled;
            studio.diagnostics.info(if enabled {
                "Auto-update enabled."
            } else {
                "Auto-update disabled. Manual generation enabled."
            });
            vec![persist(studio)]
        }
        StudioEvent::SetXsltVersion(version) => {
            studio.xslt_version = version;
            studio
                .diagnostics
                .info(format!("Stylesheet version set to {version}."));
            vec![persist(studio)]
        }
        StudioEvent::ToggleLayout => handle_toggle_layout(studio),
        StudioEvent::SetZoom(factor) => set_zoom(studio, PreviewZoom::new(factor)),
        StudioEvent::ZoomIn => {
            let zoom = studio.preview.zoom.zoom_in();
            set_zoom(studio, zoom)
        }
        StudioEvent::ZoomOut => {
            let zoom = studio.preview.zoom.zoom_out();
            set_zoom(studio, zoom)
        }
        StudioEvent::ZoomReset => set_zoom(studio, PreviewZoom::default()),
        StudioEvent::SetViewMode(mode) => handle_view_mode(studio, mode),
        StudioEvent::SetPanel(setting) => {
            match setting {
                PanelSetting::ConfigVisible(v) => studio.panels.config_visible = v,
                PanelSetting::LogVisible(v) => studio.panels.log_visible = v,
                PanelSetting::XmlCollapsed(v) => studio.panels.xml_collapsed = v,
                PanelSetting::XsltCollapsed(v) => studio.panels.xslt_collapsed = v,
                PanelSetting::DocInfoCollapsed(v) => studio.panels.doc_info_collapsed = v,
                PanelSetting::Height(panel, height) => studio.panels.set_height(panel, height),
            }
            vec![persist(studio)]
        }

        StudioEvent::TreeNodeClicked(id) => {
            if let Some(xpath) = studio.tree.toggle(id) {
                tracing::debug!(%xpath, "tree node selected");
            }
            vec![]
        }
        StudioEvent::CopyXPath => match studio.tree.selected_xpath() {
            Some(xpath) => vec![StudioEffect::CopyToClipboard(xpath.to_string())],
            None => {
                studio.diagnostics.info("No XPath selected.");
                vec![]
            }
        },
        StudioEvent::ClipboardCopied { text, result } => {
            match result {
                Ok(method) => {
                    tracing::debug!(method = method.label(), "xpath copied");
                    studio.diagnostics.info(format!("Copied XPath: {text}"));
                }
                Err(e) => {
                    studio
                        .diagnostics
                        .error(format!("Could not copy XPath: {e}"));
                }
            }
            vec![]
        }
        StudioEvent::DiagnosticClicked(index) => handle_diagnostic_click(studio, index),
        StudioEvent::PreviewClicked(click) => handle_preview_click(studio, &click),

        StudioEvent::Export { kind, dir } => {
            let content = match kind {
                ExportKind::Xml => studio.buffers.xml.text(),
                ExportKind::Xslt => studio.buffers.xslt.text(),
                ExportKind::Html => studio.preview.last_html.clone(),
            };
            vec![StudioEffect::ExportFile { kind, dir, content }]
        }
        StudioEvent::Exported { kind, result } => {
            match result {
                Ok(path) => {
                    studio.diagnostics.info(format!(
                        "Exported {} to {}.",
                        kind.label(),
                        path.display()
                    ));
                }
                Err(e) => {
                    studio
                        .diagnostics
                        .error(format!("Could not export {}: {e}", kind.label()));
                }
            }
            vec![]
        }

        StudioEvent::StorageFailed(message) => {
            studio
                .diagnostics
                .error(format!("Could not save state to storage: {message}"));
            vec![]
        }
        StudioEvent::StorageUnreadable(message) => {
            studio
                .diagnostics
                .error(format!("Could not read state from storage: {message}"));
            vec![]
        }
        StudioEvent::PreviewFailed(message) => {
            studio
                .diagnostics
                .error(format!("Could not update preview: {message}"));
            vec![]
        }
    }
}

fn persist(studio: &Studio) -> StudioEffect {
    StudioEffect::Persist(Box::new(studio.snapshot()))
}

fn schedule_transform(studio: &mut Studio, effects: &mut Vec<StudioEffect>) {
    let generation = studio.scheduler.schedule();
    effects.push(StudioEffect::ArmTimer {
        kind: TimerKind::Transform,
        generation,
        delay: studio.scheduler.delay(),
    });
}

fn do_transform(studio: &mut Studio, effects: &mut Vec<StudioEffect>) {
    let xml = studio.buffers.xml.text();
    let xslt = studio.buffers.xslt.text();
    effects.push(StudioEffect::CancelTimer(TimerKind::Transform));
    match studio.scheduler.prepare(&xml, &xslt, studio.xslt_version) {
        Dispatch::EmptyInput => {
            studio
                .diagnostics
                .info("XML or XSLT is empty, nothing to transform.");
        }
        Dispatch::Send(request) => effects.push(StudioEffect::SendTransform(request)),
    }
}

/// Doc info always follows the XML; the tree only in tree mode.
fn refresh_xml_views(studio: &mut Studio, effects: &mut Vec<StudioEffect>) {
    studio.refresh_doc_info();
    if studio.view_mode == XmlViewMode::Tree {
        let generation = studio.tree_debounce.arm();
        effects.push(StudioEffect::ArmTimer {
            kind: TimerKind::TreeRender,
            generation,
            delay: studio.tree_debounce.delay(),
        });
    }
}

fn detect_version(studio: &mut Studio) {
    let Some(detected) = detect_xslt_version(&studio.buffers.xslt.text()) else {
        return;
    };
    match detected.parse::<XsltVersion>() {
        Ok(version) if version != studio.xslt_version => {
            studio.xslt_version = version;
            studio.diagnostics.info(format!(
                "Detected XSLT version {detected} from stylesheet."
            ));
        }
        Ok(_) => {}
        Err(_) => {
            studio.diagnostics.info(format!(
                "Detected XSLT version {detected}, which is not in the list."
            ));
        }
    }
}

fn handle_edit(studio: &mut Studio, source: SourceKind, edit: Edit) -> Vec<StudioEffect> {
    if studio.buffers.get_mut(source).apply(edit).is_none() {
        return vec![];
    }
    after_edit(studio, source)
}

fn handle_insert_image(
    studio: &mut Studio,
    image: &ImageAsset,
    mode: ImageInsertMode,
) -> Vec<StudioEffect> {
    let snippet = match image.snippet(mode) {
        Ok(snippet) => snippet,
        Err(e) => {
            studio
                .diagnostics
                .error(format!("Could not insert image: {e:#}"));
            return vec![];
        }
    };
    studio
        .buffers
        .xslt
        .apply(Edit::Insert(format!("\n{snippet}\n")));
    studio.buffers.xslt.focus();
    studio.diagnostics.info(image::inserted_message(mode));
    after_edit(studio, SourceKind::Xslt)
}

fn after_edit(studio: &mut Studio, source: SourceKind) -> Vec<StudioEffect> {
    let mut effects = Vec::new();
    match source {
        SourceKind::Xml => refresh_xml_views(studio, &mut effects),
        SourceKind::Xslt => detect_version(studio),
    }
    effects.push(persist(studio));
    if studio.auto_update {
        schedule_transform(studio, &mut effects);
    }
    effects
}

/// Replaces both buffers and runs the per-buffer refreshes.
fn load_pair(studio: &mut Studio, xml: &str, xslt: &str) -> Vec<StudioEffect> {
    studio.buffers.xml.set_text(xml);
    studio.buffers.xslt.set_text(xslt);
    let mut effects = Vec::new();
    refresh_xml_views(studio, &mut effects);
    detect_version(studio);
    effects
}

fn render_preview(studio: &mut Studio, effects: &mut Vec<StudioEffect>) {
    effects.push(StudioEffect::RenderPreview {
        html: studio.preview.last_html.clone(),
        zoom: studio.preview.zoom,
        layout: studio.preview.layout,
    });
    if studio.preview.layout == LayoutMode::Vertical {
        let generation = studio.preview.measure.arm();
        effects.push(StudioEffect::ArmTimer {
            kind: TimerKind::PreviewMeasure,
            generation,
            delay: studio.preview.measure.delay(),
        });
    }
}

fn handle_restored(studio: &mut Studio, stored: StoredSession) -> Vec<StudioEffect> {
    let mut effects = Vec::new();

    if let Some(v) = stored.auto_update {
        studio.auto_update = v;
    }
    if let Some(v) = stored.layout {
        studio.preview.layout = v;
    }
    if let Some(v) = stored.xslt_version {
        studio.xslt_version = v;
    }
    if let Some(v) = stored.preview_zoom {
        studio.preview.zoom = v;
    }
    if let Some(v) = stored.xml_view_mode {
        studio.view_mode = v;
    }
    studio.panels.config_visible = stored.config_visible.unwrap_or(false);
    studio.panels.log_visible = stored.log_visible.unwrap_or(false);
    studio.panels.xml_collapsed = stored.xml_collapsed.unwrap_or(false);
    studio.panels.xslt_collapsed = stored.xslt_collapsed.unwrap_or(false);
    studio.panels.doc_info_collapsed = stored.doc_info_collapsed.unwrap_or(false);
    studio.panels.heights = stored.panel_heights;

    match stored.xml {
        Some(xml) => {
            studio.buffers.xml.set_text(&xml);
        }
        None => {
            studio.buffers.xml.set_text(BUILTIN_XML);
            studio.buffers.xslt.set_text(BUILTIN_XSLT);
        }
    }
    if let Some(xslt) = stored.xslt {
        studio.buffers.xslt.set_text(&xslt);
    }
    studio.refresh_doc_info();
    if studio.view_mode == XmlViewMode::Tree {
        studio.tree.render(&studio.buffers.xml.text());
    }
    studio
        .scheduler
        .record_engine(EngineKind::Lxml, studio.xslt_version);

    if let Some(html) = stored.html.filter(|h| !h.is_empty()) {
        studio.preview.last_html = html;
        render_preview(studio, &mut effects);
        studio
            .diagnostics
            .info("Restored last HTML preview from storage.");
    } else {
        effects.push(StudioEffect::ApplyZoom(studio.preview.zoom));
    }

    studio.diagnostics.info("Application initialized.");
    if !studio.buffers.xml.is_blank() && !studio.buffers.xslt.is_blank() {
        schedule_transform(studio, &mut effects);
    }
    effects
}

fn handle_timer(studio: &mut Studio, kind: TimerKind, generation: u64) -> Vec<StudioEffect> {
    match kind {
        TimerKind::Transform => {
            let mut effects = Vec::new();
            if studio.scheduler.timer_fired(generation) {
                do_transform(studio, &mut effects);
            }
            effects
        }
        TimerKind::TreeRender => {
            if studio.tree_debounce.fire(generation) && studio.view_mode == XmlViewMode::Tree {
                studio.tree.render(&studio.buffers.xml.text());
            }
            vec![]
        }
        TimerKind::Highlight(highlight) => {
            studio
                .navigator
                .expire(highlight, generation, &mut studio.buffers);
            vec![]
        }
        TimerKind::PreviewMeasure => {
            if studio.preview.measure.fire(generation)
                && studio.preview.layout == LayoutMode::Vertical
            {
                vec![StudioEffect::MeasurePreview]
            } else {
                vec![]
            }
        }
    }
}

fn handle_transform_completed(
    studio: &mut Studio,
    seq: u64,
    version: XsltVersion,
    outcome: Result<TransformResult, ServiceError>,
) -> Vec<StudioEffect> {
    if !studio.scheduler.accept(seq) {
        return vec![];
    }

    let mut effects = Vec::new();
    match outcome {
        Err(e) => {
            studio
                .diagnostics
                .error(format!("Network error during transform: {e}"));
        }
        Ok(result) => {
            studio
                .diagnostics
                .extend_from_engine_log(result.log.iter().map(String::as_str));
            if result.ok {
                if let Some(engine) = result.engine {
                    studio.scheduler.record_engine(engine, version);
                }
                studio.preview.last_html = result.html;
                render_preview(studio, &mut effects);
            } else {
                studio.scheduler.mark_error();
                studio.diagnostics.error("Transformation failed.");
            }
        }
    }
    effects.push(persist(studio));
    effects
}

fn handle_sample_loaded(
    studio: &mut Studio,
    outcome: Result<SampleBundle, ServiceError>,
) -> Vec<StudioEffect> {
    match outcome {
        Ok(bundle) if bundle.ok => {
            let mut effects = load_pair(studio, &bundle.xml, &bundle.xslt);
            studio
                .diagnostics
                .info("Loaded Saxon PEPPOL sample from server.");
            effects.push(persist(studio));
            if studio.auto_update {
                schedule_transform(studio, &mut effects);
            }
            effects
        }
        Ok(bundle) => {
            let message = bundle
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "Failed to load Saxon sample.".to_string());
            studio.diagnostics.error(message);
            vec![]
        }
        Err(e) => {
            studio
                .diagnostics
                .error(format!("Error loading Saxon sample: {e}"));
            vec![]
        }
    }
}

fn handle_toggle_layout(studio: &mut Studio) -> Vec<StudioEffect> {
    let mut effects = Vec::new();
    studio.preview.layout = studio.preview.layout.toggled();
    match studio.preview.layout {
        LayoutMode::Vertical => {
            if !studio.preview.last_html.is_empty() {
                render_preview(studio, &mut effects);
            }
            studio
                .diagnostics
                .info("Layout changed to vertical (stacked).");
        }
        LayoutMode::Horizontal => {
            studio.preview.measure.cancel();
            effects.push(StudioEffect::CancelTimer(TimerKind::PreviewMeasure));
            effects.push(StudioEffect::ClearPreviewHeight);
            studio
                .diagnostics
                .info("Layout changed to horizontal (side-by-side).");
        }
    }
    effects.push(persist(studio));
    effects
}

fn set_zoom(studio: &mut Studio, zoom: PreviewZoom) -> Vec<StudioEffect> {
    studio.preview.zoom = zoom;
    vec![StudioEffect::ApplyZoom(zoom), persist(studio)]
}

fn handle_view_mode(studio: &mut Studio, mode: XmlViewMode) -> Vec<StudioEffect> {
    studio.view_mode = mode;
    studio.tree_debounce.cancel();
    let mut effects = vec![StudioEffect::CancelTimer(TimerKind::TreeRender)];
    if mode == XmlViewMode::Tree {
        studio.tree.render(&studio.buffers.xml.text());
    }
    effects.push(persist(studio));
    effects
}

fn handle_diagnostic_click(studio: &mut Studio, index: usize) -> Vec<StudioEffect> {
    let Some(location) = studio.diagnostics.get(index).and_then(|d| d.location) else {
        return vec![];
    };
    match studio
        .navigator
        .jump_to_location(&mut studio.buffers, location)
    {
        Some(generation) => vec![StudioEffect::ArmTimer {
            kind: TimerKind::Highlight(HighlightKind::Diagnostic),
            generation,
            delay: studio.navigator.highlight_duration(),
        }],
        None => vec![],
    }
}

fn handle_preview_click(studio: &mut Studio, click: &PreviewClick) -> Vec<StudioEffect> {
    if !click.is_navigation() {
        return vec![];
    }
    match studio
        .navigator
        .jump_to_preview_text(&mut studio.buffers, &click.text)
    {
        PreviewJump::EmptyText => {
            studio
                .diagnostics
                .info("Clicked preview element has no text to locate in XSLT.");
            vec![]
        }
        PreviewJump::NotFound => {
            studio
                .diagnostics
                .warn("Could not find clicked preview text in XSLT.");
            vec![]
        }
        PreviewJump::Jumped { generation, .. } => vec![StudioEffect::ArmTimer {
            kind: TimerKind::Highlight(HighlightKind::PreviewJump),
            generation,
            delay: studio.navigator.highlight_duration(),
        }],
    }
}
