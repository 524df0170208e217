//! Live mode: file changes feed the studio session, the preview is written to
//! an HTML file after each successful transformation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio_util::sync::CancellationToken;
use xstudio_core::buffer::SourceKind;
use xstudio_core::config::{Config, paths};
use xstudio_core::export::{ImportedFile, import_file};
use xstudio_core::preview::{FileSurface, PreviewRenderer};
use xstudio_core::runtime::{StudioEventSender, StudioRuntime};
use xstudio_core::session::{Studio, StudioEvent, StudioOptions};
use xstudio_core::storage::FileStore;
use xstudio_core::transform::{HttpTransformService, XsltVersion};

pub struct WatchOptions<'a> {
    pub service: HttpTransformService,
    pub config: &'a Config,
    pub xml: PathBuf,
    pub xslt: PathBuf,
    pub out: PathBuf,
    pub version: Option<XsltVersion>,
}

struct WatchedFile {
    source: SourceKind,
    path: PathBuf,
    last_text: String,
}

pub async fn run(opts: WatchOptions<'_>) -> Result<()> {
    let options = StudioOptions::from_config(opts.config);
    let state_path = paths::state_path();
    let store = FileStore::open(&state_path)
        .with_context(|| format!("open session state {}", state_path.display()))?;

    let renderer = PreviewRenderer::new(
        Duration::from_millis(opts.config.preview.measure_delay_ms),
        opts.config.preview.max_height,
    );
    let mut runtime = StudioRuntime::new(
        Studio::new(&options),
        opts.service,
        FileSurface::new(&opts.out),
        Box::new(store),
    )
    .with_renderer(renderer);

    runtime.restore();
    // Watching without re-transforming would be pointless.
    if !runtime.state.auto_update {
        runtime.dispatch(StudioEvent::SetAutoUpdate(true));
    }

    let mut watched = Vec::new();
    for (source, path) in [(SourceKind::Xml, &opts.xml), (SourceKind::Xslt, &opts.xslt)] {
        let path = fs::canonicalize(path)
            .with_context(|| format!("resolve {}", path.display()))?;
        let file = import_file(&path)?;
        watched.push(WatchedFile {
            source,
            path,
            last_text: file.text.clone(),
        });
        runtime.dispatch(StudioEvent::FileImported { source, file });
    }
    if let Some(version) = opts.version {
        runtime.dispatch(StudioEvent::SetXsltVersion(version));
    }
    runtime.dispatch(StudioEvent::Generate);

    let _watcher = watch_files(watched, runtime.sender())?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    eprintln!(
        "Watching {} and {}; preview at {} (Ctrl+C to stop)",
        opts.xml.display(),
        opts.xslt.display(),
        opts.out.display()
    );

    let mut printed = 0;
    let mut applied = 0;
    loop {
        printed = report(&runtime, printed, &mut applied, &opts.out);
        tokio::select! {
            () = cancel.cancelled() => break,
            more = runtime.step() => {
                if !more {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Prints diagnostics added since `printed` and notes preview rewrites.
fn report(
    runtime: &StudioRuntime<HttpTransformService, FileSurface>,
    printed: usize,
    applied: &mut u64,
    out: &Path,
) -> usize {
    let state = &runtime.state;
    super::transform::print_diagnostics(&state.diagnostics, printed);

    let seq = state.scheduler.last_applied_seq();
    if seq != *applied {
        *applied = seq;
        eprintln!("{} | preview: {}", state.engine_label(), out.display());
    }
    state.diagnostics.len()
}

/// Watches the parent directories so editors that save by rename are seen.
fn watch_files(files: Vec<WatchedFile>, tx: StudioEventSender) -> Result<RecommendedWatcher> {
    let mut dirs: Vec<PathBuf> = files
        .iter()
        .filter_map(|f| f.path.parent().map(Path::to_path_buf))
        .collect();
    dirs.sort();
    dirs.dedup();

    let mut files = files;
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "file watch error");
                    return;
                }
            };
            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                return;
            }
            for file in &mut files {
                if !event.paths.iter().any(|p| same_file(p, &file.path)) {
                    continue;
                }
                match import_file(&file.path) {
                    Ok(ImportedFile { name, text }) if text != file.last_text => {
                        file.last_text.clone_from(&text);
                        let _ = tx.send(StudioEvent::FileImported {
                            source: file.source,
                            file: ImportedFile { name, text },
                        });
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "changed file unreadable"),
                }
            }
        },
        notify::Config::default(),
    )
    .context("create file watcher")?;

    for dir in &dirs {
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("watch {}", dir.display()))?;
    }
    Ok(watcher)
}

fn same_file(candidate: &Path, target: &Path) -> bool {
    candidate == target || fs::canonicalize(candidate).is_ok_and(|c| c == target)
}
