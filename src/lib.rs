//! # htmltemplating
//!
//! Turn a parameterised HTML document into raw HTML, a PDF, or a raster
//! image, one request at a time.
//!
//! ## Why this crate?
//!
//! Invoices, certificates and reports are easiest to design as HTML/CSS, but
//! callers usually want a PDF or a PNG. This crate takes a template (a file
//! on disk, a URL, or inline text), substitutes request data into it, tags
//! non-production output with a visible watermark, and prints the result with
//! headless Chrome. The whole pipeline sits behind one HTTP endpoint.
//!
//! ## Pipeline Overview
//!
//! ```text
//! query + JSON body
//!  │
//!  ├─ 1. Params     merge query/body, default responseType=pdf and options
//!  ├─ 2. Source     pick template > url > content; GET the URL if needed
//!  ├─ 3. Template   minijinja render against `data` (fresh engine per request)
//!  ├─ 4. Watermark  test title + background style unless Environment=p
//!  ├─ 5. Engine     html: as-is │ pdf/image: headless Chrome (spawn_blocking)
//!  └─ 6. Output     status + Content-Type + body
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use htmltemplating::{process, ServiceConfig};
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder().template_root("templates").build()?;
//!     let query = HashMap::from([("responseType".to_string(), "pdf".to_string())]);
//!     let body = json!({
//!         "htmlContent": "<html><body><h1>Hello {{ name }}</h1></body></html>",
//!         "data": {"name": "world"}
//!     });
//!     let artifact = process(&query, Some(&body), &config).await;
//!     println!("{} {} ({} bytes)", artifact.status, artifact.content_type, artifact.body.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `htmltemplating` server binary (clap + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EnvironmentSource, ServiceConfig, ServiceConfigBuilder};
pub use error::{ErrorKind, HtmlTemplatingError};
pub use output::{Artifact, ArtifactBody};
pub use pipeline::engine::{ChromeEngine, DocumentEngine, EngineJob, OutputKind};
pub use pipeline::params::{RequestParams, ResponseType};
pub use pipeline::source::ContentSource;
pub use process::{process, process_sync, render_document};
pub use server::router;
