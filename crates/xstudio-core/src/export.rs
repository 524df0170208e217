//! Export of buffers/preview to timestamped files, and file import.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Xml,
    Xslt,
    Html,
}

impl ExportKind {
    pub fn prefix(self) -> &'static str {
        match self {
            ExportKind::Xml => "document",
            ExportKind::Xslt => "stylesheet",
            ExportKind::Html => "result",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportKind::Xml => "xml",
            ExportKind::Xslt => "xslt",
            ExportKind::Html => "html",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExportKind::Xml => "XML",
            ExportKind::Xslt => "XSLT",
            ExportKind::Html => "HTML",
        }
    }
}

/// `YYYYMMDD_HHMMSS`
pub fn build_timestamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

pub fn export_file_name(kind: ExportKind, now: DateTime<Local>) -> String {
    format!(
        "{}_{}.{}",
        kind.prefix(),
        build_timestamp(now),
        kind.extension()
    )
}

/// Writes `content` verbatim into `dir` under a timestamped name.
pub fn export_to_dir(dir: &Path, kind: ExportKind, content: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    let path = dir.join(export_file_name(kind, Local::now()));
    fs::write(&path, content)
        .with_context(|| format!("Failed to write {} export to {}", kind.label(), path.display()))?;
    tracing::debug!(path = %path.display(), "exported");
    Ok(path)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedFile {
    /// File name without directories, for the log message.
    pub name: String,
    pub text: String,
}

/// Reads a file as UTF-8 text.
pub fn import_file(path: &Path) -> Result<ImportedFile> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(ImportedFile { name, text })
}
