//! Template rendering: substitute request data into the document.
//!
//! A fresh [`TemplateRenderer`] (and with it a fresh
//! [`minijinja::Environment`]) is built for every request and dropped with
//! it, so no template or context state can leak between requests.
//!
//! Two entry modes exist:
//!
//! * **File** — the template is read from disk and registered under its file
//!   name. Anything it includes is loaded on demand by name relative to the
//!   template's directory, so `{% include "partials/header.html" %}` resolves
//!   next to the template itself and files nobody includes are never read.
//! * **Text** — a fetched or inline blob is parsed under a synthetic name and
//!   rendered on its own.
//!
//! Undefined values render as empty text, attribute lookups on them stay
//! undefined, and iterating them yields nothing. Autoescaping is off and the
//! environment has no clock or random source, so output depends on nothing
//! but the template text and the data value.

use crate::error::HtmlTemplatingError;
use crate::pipeline::source::SourceDocument;
use minijinja::{path_loader, AutoEscape, Environment, UndefinedBehavior};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Name under which fetched and inline documents are registered.
pub const INLINE_TEMPLATE_NAME: &str = "__document__";

/// Per-request template engine.
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        Self { env }
    }

    /// Load `path` and render it; includes resolve against its directory.
    pub fn render_file(&mut self, path: &Path, data: Option<&Value>) -> Result<String, HtmlTemplatingError> {
        if !path.is_file() {
            return Err(HtmlTemplatingError::TemplateNotFound {
                path: path.to_path_buf(),
            });
        }
        let source = std::fs::read_to_string(path).map_err(|source| HtmlTemplatingError::TemplateRead {
            path: path.to_path_buf(),
            source,
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| INLINE_TEMPLATE_NAME.to_string());
        let dir = match path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        debug!("Includes for {} resolve under {}", name, dir.display());
        self.env.set_loader(path_loader(dir));

        self.env
            .add_template_owned(name.clone(), source)
            .map_err(|e| template_error(&name, &e))?;

        info!("...rendering template {}", path.display());
        self.render_registered(&name, data)
    }

    /// Parse `text` and render it against `data`.
    pub fn render_text(&mut self, text: &str, data: Option<&Value>) -> Result<String, HtmlTemplatingError> {
        self.env
            .add_template_owned(INLINE_TEMPLATE_NAME, text.to_string())
            .map_err(|e| template_error(INLINE_TEMPLATE_NAME, &e))?;
        self.render_registered(INLINE_TEMPLATE_NAME, data)
    }

    /// Object data spreads into the top-level context; any other value is
    /// reachable as `data`; no data means an empty context.
    fn render_registered(&self, name: &str, data: Option<&Value>) -> Result<String, HtmlTemplatingError> {
        let template = self.env.get_template(name).map_err(|e| template_error(name, &e))?;
        let rendered = match data {
            None => template.render(BTreeMap::<&str, &Value>::new()),
            Some(object @ Value::Object(_)) => template.render(object),
            Some(other) => template.render(BTreeMap::from([("data", other)])),
        };
        rendered.map_err(|e| template_error(name, &e))
    }
}

/// Render any [`SourceDocument`] with a throwaway renderer.
pub fn render(doc: &SourceDocument, data: Option<&Value>) -> Result<String, HtmlTemplatingError> {
    let mut renderer = TemplateRenderer::new();
    match doc {
        SourceDocument::TemplateFile(path) => renderer.render_file(path, data),
        SourceDocument::Fetched { url, text } => {
            info!("...rendering HTML from url {}", url);
            renderer.render_text(text, data)
        }
        SourceDocument::Inline(text) => {
            info!("...rendering HTML content");
            renderer.render_text(text, data)
        }
    }
}

fn template_error(name: &str, e: &minijinja::Error) -> HtmlTemplatingError {
    let detail = error_chain(e);
    match e.kind() {
        minijinja::ErrorKind::SyntaxError => HtmlTemplatingError::TemplateSyntax {
            name: e.name().unwrap_or(name).to_string(),
            detail,
        },
        _ => HtmlTemplatingError::RenderFailed { detail },
    }
}

/// Errors raised inside an include carry the useful part in `source()`.
fn error_chain(e: &minijinja::Error) -> String {
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(s) = source {
        msg.push_str(": ");
        msg.push_str(&s.to_string());
        source = s.source();
    }
    msg
}
