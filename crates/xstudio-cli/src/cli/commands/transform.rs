//! One-shot transformation.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use xstudio_core::config::Config;
use xstudio_core::diagnostics::DiagnosticLog;
use xstudio_core::export::import_file;
use xstudio_core::scheduler::{Dispatch, TransformScheduler};
use xstudio_core::transform::{
    HttpTransformService, TransformService, XsltVersion, detect_xslt_version,
};

pub struct TransformOptions<'a> {
    pub service: &'a HttpTransformService,
    pub config: &'a Config,
    pub xml: &'a Path,
    pub xslt: &'a Path,
    pub version: Option<XsltVersion>,
    pub out: Option<&'a Path>,
}

/// Version declared by the stylesheet when supported, else the configured default.
pub fn resolve_version(xslt: &str, fallback: XsltVersion) -> XsltVersion {
    let Some(detected) = detect_xslt_version(xslt) else {
        return fallback;
    };
    match detected.parse() {
        Ok(version) => version,
        Err(_) => {
            tracing::warn!(%detected, %fallback, "stylesheet version not supported");
            fallback
        }
    }
}

/// Prints diagnostics to stderr, with their source location when known.
pub fn print_diagnostics(log: &DiagnosticLog, from: usize) {
    for diagnostic in log.entries().iter().skip(from) {
        eprintln!("{}", diagnostic.display_line());
    }
}

pub async fn run(opts: TransformOptions<'_>) -> Result<()> {
    let xml = import_file(opts.xml)?;
    let xslt = import_file(opts.xslt)?;
    let version = opts
        .version
        .unwrap_or_else(|| resolve_version(&xslt.text, opts.config.editor.default_xslt_version));

    let mut scheduler = TransformScheduler::new(Duration::ZERO);
    let request = match scheduler.prepare(&xml.text, &xslt.text, version) {
        Dispatch::Send(request) => request,
        Dispatch::EmptyInput => anyhow::bail!("XML or XSLT is empty, nothing to transform."),
    };

    let result = opts
        .service
        .transform(&request)
        .await
        .map_err(|e| anyhow!("Network error during transform: {e}"))?;

    let mut log = DiagnosticLog::new();
    log.extend_from_engine_log(result.log.iter().map(String::as_str));
    print_diagnostics(&log, 0);

    if !result.ok {
        scheduler.mark_error();
        eprintln!("{}", scheduler.indicator().label());
        anyhow::bail!("Transformation failed.");
    }
    if let Some(engine) = result.engine {
        scheduler.record_engine(engine, version);
    }
    eprintln!("{}", scheduler.indicator().label());

    match opts.out {
        Some(path) => {
            fs::write(path, &result.html)
                .with_context(|| format!("write HTML to {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{}", result.html),
    }
    Ok(())
}
