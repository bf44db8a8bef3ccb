//! End-to-end request processing.
//!
//! [`process`] runs one request through every stage in order and never
//! fails: validation problems become a 400 artifact, everything else a 500
//! artifact carrying the resolved parameters. Use [`render_document`] to get
//! the typed error instead.

use crate::config::ServiceConfig;
use crate::error::HtmlTemplatingError;
use crate::output::{Artifact, ArtifactBody};
use crate::pipeline::engine::{self, EngineJob, OutputKind};
use crate::pipeline::params::{self, RequestParams, ResponseType};
use crate::pipeline::{source, template, watermark};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Handle one request given its query map and optional parsed body.
pub async fn process(
    query: &HashMap<String, String>,
    body: Option<&Value>,
    config: &ServiceConfig,
) -> Artifact {
    info!("HTML processing started...");
    let params = params::resolve(query, body);
    info!(
        "html will be processed and result will be returned based on parameters {}...",
        params.describe()
    );

    match render_document(&params, config).await {
        Ok(artifact) => artifact,
        Err(e) => {
            warn!("HTML processing failed ({}): {}", e.name(), e);
            Artifact::failure(&params, &e)
        }
    }
}

/// Synchronous wrapper around [`process`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_sync(
    query: &HashMap<String, String>,
    body: Option<&Value>,
    config: &ServiceConfig,
) -> Result<Artifact, HtmlTemplatingError> {
    Ok(tokio::runtime::Runtime::new()
        .map_err(|e| HtmlTemplatingError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process(query, body, config)))
}

/// Run the pipeline stages for already-resolved parameters.
pub async fn render_document(
    params: &RequestParams,
    config: &ServiceConfig,
) -> Result<Artifact, HtmlTemplatingError> {
    let total_start = Instant::now();

    // ── Step 1: Choose the content source ────────────────────────────────
    let located = source::locate(params, config)?;

    // ── Step 2: Load it (the only network suspension point) ──────────────
    let document = source::load(&located.source, config).await?;

    // ── Step 3: Render the template ──────────────────────────────────────
    let data = params.data.clone();
    let rendered = tokio::task::spawn_blocking(move || template::render(&document, data.as_ref()))
        .await
        .map_err(|e| HtmlTemplatingError::Internal(format!("Render task panicked: {}", e)))??;
    debug!("Rendered document: {} bytes", rendered.len());

    // ── Step 4: Watermark outside production ─────────────────────────────
    let (environment, watermark_on) = config.watermark_enabled();
    info!("...ENVIRONMENT={}", environment.as_deref().unwrap_or("<unset>"));
    let rendered = watermark::apply(rendered, watermark_on);

    // ── Step 5: Convert ──────────────────────────────────────────────────
    let body = match located.response_type {
        ResponseType::Html => ArtifactBody::Text(rendered),
        ResponseType::Pdf | ResponseType::Image => {
            let output = match located.response_type {
                ResponseType::Pdf => OutputKind::Pdf(engine::pdf_options(&params.options)?),
                _ => OutputKind::Image(engine::image_options(&params.options)?),
            };
            let job = EngineJob {
                html: rendered,
                base_file: located.source.template_path().map(|p| p.to_path_buf()),
                output,
            };
            ArtifactBody::Binary(engine::run(config.document_engine(), job).await?)
        }
    };

    info!(
        "HTML processing finished: {} {} bytes in {}ms",
        located.response_type,
        body.len(),
        total_start.elapsed().as_millis()
    );

    // ── Step 6: Assemble the response ────────────────────────────────────
    Ok(Artifact::success(located.response_type, &params.options, body))
}
