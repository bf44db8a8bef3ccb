//! Server binary for htmltemplating.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServiceConfig` and serves the router until Ctrl+C / SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use htmltemplating::config::DEFAULT_MAX_BODY_BYTES;
use htmltemplating::{router, ServiceConfig};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"ROUTES:
  GET|POST /api/htmltemplating   render a template to html, pdf or image
  GET      /health               liveness probe

EXAMPLES:
  htmltemplating --templates ./templates
  curl -X POST 'http://localhost:7071/api/htmltemplating?responseType=html' \
       -H 'content-type: application/json' \
       -d '{"htmlContent":"<p>Hello {{ name }}</p>","data":{"name":"you"}}'

WATERMARK:
  Output is tagged "THIS IS A TEST DOCUMENT" unless the environment variable
  named by --environment-variable (default: Environment) equals the
  production marker (default: p).
"#;

/// Render parameterised HTML documents to html, pdf or images over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "htmltemplating",
    version,
    about = "Render parameterised HTML documents to html, pdf or images over HTTP",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to listen on.
    #[arg(short, long, env = "HTMLTEMPLATING_BIND", default_value = "0.0.0.0:7071")]
    bind: SocketAddr,

    /// Directory that relative `htmlTemplate` paths are resolved against.
    #[arg(short, long = "templates", env = "HTMLTEMPLATING_TEMPLATE_ROOT", default_value = ".")]
    template_root: PathBuf,

    /// Chrome/Chromium executable (auto-detected when omitted).
    #[arg(long, env = "HTMLTEMPLATING_CHROME_PATH")]
    chrome_path: Option<PathBuf>,

    /// Keep Chrome's sandbox enabled.
    #[arg(long, env = "HTMLTEMPLATING_SANDBOX")]
    sandbox: bool,

    /// Timeout in seconds for fetching `htmlUrl` (none when omitted).
    #[arg(long, env = "HTMLTEMPLATING_FETCH_TIMEOUT")]
    fetch_timeout: Option<u64>,

    /// Timeout in seconds for a single browser operation.
    #[arg(long, env = "HTMLTEMPLATING_ENGINE_TIMEOUT", default_value_t = 86_400)]
    engine_timeout: u64,

    /// Largest accepted request body in bytes.
    #[arg(long, env = "HTMLTEMPLATING_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,

    /// Environment variable read per request to decide on the watermark.
    #[arg(long, env = "HTMLTEMPLATING_ENVIRONMENT_VARIABLE", default_value = "Environment")]
    environment_variable: String,

    /// Value of that variable that marks production.
    #[arg(long, env = "HTMLTEMPLATING_PRODUCTION_MARKER", default_value = "p")]
    production_marker: String,

    /// Enable debug logging.
    #[arg(short, long, env = "HTMLTEMPLATING_VERBOSE")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, env = "HTMLTEMPLATING_QUIET", conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Config ───────────────────────────────────────────────────────────
    let mut builder = ServiceConfig::builder()
        .template_root(&cli.template_root)
        .environment_variable(cli.environment_variable)
        .production_marker(cli.production_marker)
        .sandbox(cli.sandbox)
        .engine_timeout_secs(cli.engine_timeout)
        .max_body_bytes(cli.max_body_bytes);
    if let Some(path) = cli.chrome_path {
        builder = builder.chrome_path(path);
    }
    if let Some(secs) = cli.fetch_timeout {
        builder = builder.fetch_timeout_secs(secs);
    }
    let config = builder.build().context("Invalid configuration")?;
    tracing::debug!("{:?}", config);

    // ── Serve ────────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    tracing::info!(
        "htmltemplating listening on http://{} (templates: {})",
        cli.bind,
        cli.template_root.display()
    );

    axum::serve(listener, router(config))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
