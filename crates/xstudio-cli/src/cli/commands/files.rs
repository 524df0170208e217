//! Sample download, export and image insertion.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use xstudio_core::buffer::Position;
use xstudio_core::diagnostics::DiagnosticLevel;
use xstudio_core::export::{ExportKind, export_to_dir, import_file};
use xstudio_core::image::{ImageAsset, ImageInsertMode, inserted_message};
use xstudio_core::sample::{SAMPLE_XML_FILE, SAMPLE_XSLT_FILE};
use xstudio_core::session::{self, Studio, StudioEvent};
use xstudio_core::transform::{HttpTransformService, TransformService};

pub async fn sample(service: &HttpTransformService, dir: &Path) -> Result<()> {
    let bundle = service
        .fetch_sample()
        .await
        .map_err(|e| anyhow!("Error loading Saxon sample: {e}"))?;
    if !bundle.ok {
        let message = bundle
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "Failed to load Saxon sample.".to_string());
        anyhow::bail!(message);
    }

    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    for (name, content) in [(SAMPLE_XML_FILE, &bundle.xml), (SAMPLE_XSLT_FILE, &bundle.xslt)] {
        let path = dir.join(name);
        fs::write(&path, content).with_context(|| format!("write {}", path.display()))?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

pub fn export(kind: ExportKind, source: &Path, dir: &Path) -> Result<()> {
    let file = import_file(source)?;
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = export_to_dir(dir, kind, &file.text)?;
    println!("Exported {} to {}", kind.label(), path.display());
    Ok(())
}

pub struct InsertImageOptions<'a> {
    pub xslt: &'a Path,
    pub image: &'a Path,
    pub mode: Option<ImageInsertMode>,
    /// Zero-based; the end of the stylesheet when absent.
    pub at: Option<Position>,
}

/// Inserts an image snippet into the stylesheet file in place.
pub fn insert_image(opts: &InsertImageOptions<'_>) -> Result<()> {
    let stylesheet = import_file(opts.xslt)?;
    let image = ImageAsset::load(opts.image)?;
    let mode = opts
        .mode
        .unwrap_or_else(|| ImageInsertMode::for_path(opts.image));

    let mut studio = Studio::default();
    studio.buffers.xslt.set_text(&stylesheet.text);
    studio
        .buffers
        .xslt
        .set_cursor(opts.at.unwrap_or(Position::new(usize::MAX, usize::MAX)));

    let logged = studio.diagnostics.len();
    // Persist and timer effects have no meaning for a one-shot edit.
    let _ = session::update(&mut studio, StudioEvent::InsertImage { image, mode });
    if let Some(failure) = studio.diagnostics.entries()[logged..]
        .iter()
        .find(|d| d.level == DiagnosticLevel::Error)
    {
        anyhow::bail!(failure.message.clone());
    }

    fs::write(opts.xslt, studio.buffers.xslt.text())
        .with_context(|| format!("write {}", opts.xslt.display()))?;
    println!("{} ({})", inserted_message(mode), opts.xslt.display());
    Ok(())
}
