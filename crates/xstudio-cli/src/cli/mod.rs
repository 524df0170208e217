//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use xstudio_core::buffer::Position;
use xstudio_core::config::{self, Config};
use xstudio_core::image::ImageInsertMode;
use xstudio_core::logging;
use xstudio_core::transform::{HttpTransformService, XsltVersion};

mod commands;

#[derive(Parser)]
#[command(name = "xstudio")]
#[command(version)]
#[command(about = "Live XML/XSLT stylesheet studio")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Transformation service base URL (overrides config and XSTUDIO_SERVICE_URL)
    #[arg(long, global = true, value_name = "URL")]
    service_url: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Runs one transformation and writes the HTML result
    Transform {
        /// XML document
        #[arg(long, value_name = "FILE")]
        xml: PathBuf,
        /// XSLT stylesheet
        #[arg(long, value_name = "FILE")]
        xslt: PathBuf,
        /// XSLT version (1.0, 2.0, 3.0); detected from the stylesheet if omitted
        #[arg(long = "xslt-version", value_name = "VERSION")]
        version: Option<XsltVersion>,
        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Prints the element tree of an XML file with XPaths
    Tree {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Marks the node at this XPath as selected
        #[arg(long, value_name = "XPATH")]
        select: Option<String>,
    },

    /// Prints the document summary (invoice id, parties, type)
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Prints the source location named in a diagnostic message
    Locate {
        #[arg(value_name = "MESSAGE")]
        message: String,
    },

    /// Re-runs the transformation whenever the XML or XSLT file changes
    Watch {
        #[arg(long, value_name = "FILE")]
        xml: PathBuf,
        #[arg(long, value_name = "FILE")]
        xslt: PathBuf,
        /// HTML file rewritten after each successful transformation
        #[arg(short, long, value_name = "FILE")]
        out: PathBuf,
        #[arg(long = "xslt-version", value_name = "VERSION")]
        version: Option<XsltVersion>,
    },

    /// Downloads the server's Saxon PEPPOL sample
    Sample {
        /// Target directory
        #[arg(long, value_name = "DIR", default_value = ".")]
        dir: PathBuf,
    },

    /// Copies a document to a timestamped export file
    Export {
        #[command(flatten)]
        source: ExportSource,
        /// Target directory
        #[arg(long, value_name = "DIR", default_value = ".")]
        dir: PathBuf,
    },

    /// Inserts an image into a stylesheet as inline SVG or a base64 data URI
    InsertImage {
        /// Stylesheet to edit in place
        #[arg(long, value_name = "FILE")]
        xslt: PathBuf,
        #[arg(long, value_name = "FILE")]
        image: PathBuf,
        /// base64 or svg-inline (default: svg-inline for .svg files)
        #[arg(long, value_name = "MODE")]
        mode: Option<ImageInsertMode>,
        /// 1-based line to insert at (default: end of file)
        #[arg(long, value_name = "N")]
        line: Option<usize>,
        /// 1-based column on that line
        #[arg(long, value_name = "N", requires = "line")]
        column: Option<usize>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Args)]
#[group(required = true, multiple = false)]
struct ExportSource {
    /// Export as document_<timestamp>.xml
    #[arg(long, value_name = "FILE")]
    xml: Option<PathBuf>,
    /// Export as stylesheet_<timestamp>.xslt
    #[arg(long, value_name = "FILE")]
    xslt: Option<PathBuf>,
    /// Export as result_<timestamp>.html
    #[arg(long, value_name = "FILE")]
    html: Option<PathBuf>,
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Store the transformation service URL
    SetServiceUrl {
        #[arg(value_name = "URL")]
        url: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().context("load config")?;
    let _log_guard = logging::init(&config.logging, cli.verbose, &config::paths::logs_dir())?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli, config).await })
}

/// Builds the HTTP client: `--service-url`, then env, then config.
fn service(config: &Config, service_url: Option<&str>) -> Result<HttpTransformService> {
    let base = match service_url {
        Some(raw) => config::validate_service_url(raw)?,
        None => config.effective_service_url()?,
    };
    tracing::debug!(%base, "transformation service");
    HttpTransformService::new(base, config.request_timeout())
}

async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    let Cli {
        command,
        service_url,
        verbose: _,
    } = cli;

    match command {
        Commands::Transform {
            xml,
            xslt,
            version,
            out,
        } => {
            let service = service(&config, service_url.as_deref())?;
            commands::transform::run(commands::transform::TransformOptions {
                service: &service,
                config: &config,
                xml: &xml,
                xslt: &xslt,
                version,
                out: out.as_deref(),
            })
            .await
        }
        Commands::Tree { file, select } => commands::inspect::tree(&file, select.as_deref()),
        Commands::Info { file } => commands::inspect::info(&file),
        Commands::Locate { message } => {
            commands::inspect::locate(&message);
            Ok(())
        }
        Commands::Watch {
            xml,
            xslt,
            out,
            version,
        } => {
            let service = service(&config, service_url.as_deref())?;
            commands::watch::run(commands::watch::WatchOptions {
                service,
                config: &config,
                xml,
                xslt,
                out,
                version,
            })
            .await
        }
        Commands::Sample { dir } => {
            let service = service(&config, service_url.as_deref())?;
            commands::files::sample(&service, &dir).await
        }
        Commands::Export { source, dir } => {
            let (kind, path) = match (source.xml, source.xslt, source.html) {
                (Some(p), _, _) => (xstudio_core::export::ExportKind::Xml, p),
                (_, Some(p), _) => (xstudio_core::export::ExportKind::Xslt, p),
                (_, _, Some(p)) => (xstudio_core::export::ExportKind::Html, p),
                (None, None, None) => anyhow::bail!("Please specify --xml, --xslt or --html"),
            };
            commands::files::export(kind, &path, &dir)
        }
        Commands::InsertImage {
            xslt,
            image,
            mode,
            line,
            column,
        } => {
            let at = line.map(|line| {
                Position::new(line.saturating_sub(1), column.unwrap_or(1).saturating_sub(1))
            });
            commands::files::insert_image(&commands::files::InsertImageOptions {
                xslt: &xslt,
                image: &image,
                mode,
                at,
            })
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::SetServiceUrl { url } => commands::config::set_service_url(&url),
        },
    }
}
