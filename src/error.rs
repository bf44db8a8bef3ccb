//! Error types for the htmltemplating library.
//!
//! Every failure in the request pipeline is a [`HtmlTemplatingError`]. The
//! variants fall into four classes, exposed through [`ErrorKind`]:
//!
//! * **Validation** — the request itself is unusable (no content source,
//!   unknown `responseType`). Surfaced as HTTP 400 with a short message.
//! * **Fetch** — the remote `htmlUrl` document could not be retrieved.
//! * **Render** — the template file is missing/unreadable or its syntax is
//!   malformed.
//! * **Conversion** — the headless browser failed to launch, navigate or
//!   extract the PDF/screenshot.
//!
//! Fetch, render and conversion failures all become HTTP 500 with the full
//! request parameters embedded in the body. Nothing is retried and nothing is
//! downgraded to a partial result.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the htmltemplating library.
#[derive(Debug, Error)]
pub enum HtmlTemplatingError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// None of `htmlTemplate`, `htmlUrl`, `htmlContent` was supplied.
    #[error("none of htmlTemplate, htmlUrl, htmlContent parameters are specified!")]
    NoContentSource,

    /// `responseType` is not one of html, pdf, image.
    #[error("invalid responseType parameter value '{value}'")]
    InvalidResponseType { value: String },

    // ── Fetch errors ──────────────────────────────────────────────────────
    /// The `htmlUrl` GET failed or its body could not be read as text.
    #[error("Failed to fetch '{url}': {reason}")]
    FetchFailed { url: String, reason: String },

    // ── Render errors ─────────────────────────────────────────────────────
    /// The template file does not exist.
    #[error("Template file not found: '{path}'")]
    TemplateNotFound { path: PathBuf },

    /// The template file exists but could not be read.
    #[error("Failed to read template '{path}': {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The template text failed to parse.
    #[error("Template '{name}' has invalid syntax: {detail}")]
    TemplateSyntax { name: String, detail: String },

    /// The template parsed but rendering it against the data failed.
    #[error("Template rendering failed: {detail}")]
    RenderFailed { detail: String },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The headless browser process could not be started.
    #[error("Failed to launch headless browser: {0}")]
    BrowserLaunchFailed(String),

    /// The browser could not open a page or load the document into it.
    #[error("Failed to load '{target}' into the browser page: {detail}")]
    NavigationFailed { target: String, detail: String },

    /// PDF printing or screenshot capture failed.
    #[error("{format} conversion failed: {detail}")]
    ConversionFailed { format: String, detail: String },

    /// A recognised option had a value of the wrong shape.
    #[error("Invalid {format} options: {detail}")]
    InvalidOptions { format: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`HtmlTemplatingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Fetch,
    Render,
    Conversion,
}

impl HtmlTemplatingError {
    /// Which stage class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoContentSource | Self::InvalidResponseType { .. } => ErrorKind::Validation,
            Self::FetchFailed { .. } => ErrorKind::Fetch,
            Self::TemplateNotFound { .. }
            | Self::TemplateRead { .. }
            | Self::TemplateSyntax { .. }
            | Self::RenderFailed { .. } => ErrorKind::Render,
            Self::BrowserLaunchFailed(_)
            | Self::NavigationFailed { .. }
            | Self::ConversionFailed { .. }
            | Self::InvalidOptions { .. }
            | Self::InvalidConfig(_)
            | Self::Internal(_) => ErrorKind::Conversion,
        }
    }

    /// HTTP status the error is reported with.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            _ => 500,
        }
    }

    /// Short variant name used in diagnostic bodies.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoContentSource => "NoContentSource",
            Self::InvalidResponseType { .. } => "InvalidResponseType",
            Self::FetchFailed { .. } => "FetchFailed",
            Self::TemplateNotFound { .. } => "TemplateNotFound",
            Self::TemplateRead { .. } => "TemplateRead",
            Self::TemplateSyntax { .. } => "TemplateSyntax",
            Self::RenderFailed { .. } => "RenderFailed",
            Self::BrowserLaunchFailed(_) => "BrowserLaunchFailed",
            Self::NavigationFailed { .. } => "NavigationFailed",
            Self::ConversionFailed { .. } => "ConversionFailed",
            Self::InvalidOptions { .. } => "InvalidOptions",
            Self::InvalidConfig(_) => "InvalidConfig",
            Self::Internal(_) => "Internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_400() {
        assert_eq!(HtmlTemplatingError::NoContentSource.status_code(), 400);
        let e = HtmlTemplatingError::InvalidResponseType {
            value: "docx".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Validation);
        assert_eq!(e.status_code(), 400);
        assert!(e.to_string().contains("docx"), "got: {e}");
    }

    #[test]
    fn pipeline_failures_are_500() {
        let fetch = HtmlTemplatingError::FetchFailed {
            url: "http://example.invalid".into(),
            reason: "dns".into(),
        };
        let render = HtmlTemplatingError::TemplateNotFound {
            path: PathBuf::from("/nope.html"),
        };
        let convert = HtmlTemplatingError::BrowserLaunchFailed("no chrome".into());

        assert_eq!(fetch.kind(), ErrorKind::Fetch);
        assert_eq!(render.kind(), ErrorKind::Render);
        assert_eq!(convert.kind(), ErrorKind::Conversion);
        for e in [fetch, render, convert] {
            assert_eq!(e.status_code(), 500, "{e}");
        }
    }

    #[test]
    fn template_read_keeps_source() {
        use std::error::Error as _;
        let e = HtmlTemplatingError::TemplateRead {
            path: PathBuf::from("t.html"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains("t.html"));
        assert_eq!(e.name(), "TemplateRead");
    }
}
