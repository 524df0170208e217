//! Events consumed by the session reducer.

use std::path::PathBuf;

use crate::buffer::{Edit, SourceKind};
use crate::clipboard::{ClipboardError, CopyMethod};
use crate::export::{ExportKind, ImportedFile};
use crate::image::{ImageAsset, ImageInsertMode};
use crate::preview::PreviewClick;
use crate::storage::{Panel, StoredSession};
use crate::transform::{SampleBundle, ServiceError, TransformResult, XsltVersion};
use crate::tree::{NodeId, XmlViewMode};

use super::TimerKind;

/// UI panel preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelSetting {
    ConfigVisible(bool),
    LogVisible(bool),
    XmlCollapsed(bool),
    XsltCollapsed(bool),
    DocInfoCollapsed(bool),
    Height(Panel, Option<u32>),
}

#[derive(Debug)]
pub enum StudioEvent {
    /// Values read back from durable storage at startup.
    Restored(StoredSession),

    // Editing
    Edited { source: SourceKind, edit: Edit },
    FileImported { source: SourceKind, file: ImportedFile },
    LoadBuiltinSample,
    ClearEditors,
    Search { source: SourceKind, query: String },
    SearchStep { source: SourceKind, forward: bool },
    /// Inserts an image snippet into the stylesheet at its cursor.
    InsertImage { image: ImageAsset, mode: ImageInsertMode },

    // Transform pipeline
    Generate,
    TimerFired { kind: TimerKind, generation: u64 },
    TransformCompleted {
        seq: u64,
        version: XsltVersion,
        outcome: Result<TransformResult, ServiceError>,
    },
    SampleRequested,
    SampleLoaded(Result<SampleBundle, ServiceError>),

    // Settings
    SetAutoUpdate(bool),
    SetXsltVersion(XsltVersion),
    ToggleLayout,
    SetZoom(f64),
    ZoomIn,
    ZoomOut,
    ZoomReset,
    SetViewMode(XmlViewMode),
    SetPanel(PanelSetting),

    // Navigation
    TreeNodeClicked(NodeId),
    CopyXPath,
    ClipboardCopied {
        text: String,
        result: Result<CopyMethod, ClipboardError>,
    },
    DiagnosticClicked(usize),
    PreviewClicked(PreviewClick),

    // Export
    Export { kind: ExportKind, dir: PathBuf },
    Exported {
        kind: ExportKind,
        result: Result<PathBuf, String>,
    },

    /// A storage write failed.
    StorageFailed(String),
    /// Stored state could not be read at startup.
    StorageUnreadable(String),
    /// The preview surface rejected a write.
    PreviewFailed(String),
}
