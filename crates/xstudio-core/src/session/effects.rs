//! Effects returned by the session reducer.
//!
//! Effects are commands for the runtime: timers, network calls, surface
//! writes, storage and clipboard. The reducer never performs I/O itself.

use std::path::PathBuf;
use std::time::Duration;

use crate::export::ExportKind;
use crate::preview::{LayoutMode, PreviewZoom};
use crate::storage::SessionSnapshot;
use crate::transform::TransformRequest;

use super::TimerKind;

#[derive(Debug, Clone, PartialEq)]
pub enum StudioEffect {
    /// Start (or restart) the timer of `kind`. The previous one is aborted.
    ArmTimer {
        kind: TimerKind,
        generation: u64,
        delay: Duration,
    },

    /// Abort the live timer of `kind`, if any.
    CancelTimer(TimerKind),

    SendTransform(TransformRequest),

    FetchSample,

    /// Write HTML into the preview surface.
    RenderPreview {
        html: String,
        zoom: PreviewZoom,
        layout: LayoutMode,
    },

    ApplyZoom(PreviewZoom),

    /// Size the preview to its content.
    MeasurePreview,

    /// Let the layout size the preview again.
    ClearPreviewHeight,

    Persist(Box<SessionSnapshot>),

    CopyToClipboard(String),

    ExportFile {
        kind: ExportKind,
        dir: PathBuf,
        content: String,
    },
}
