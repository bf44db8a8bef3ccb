//! The artifact handed back for each request: status, content type and body.

use crate::error::HtmlTemplatingError;
use crate::pipeline::engine::ImageType;
use crate::pipeline::params::{RequestParams, ResponseType};
use serde_json::Value;

pub const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";
pub const CONTENT_TYPE_PDF: &str = "application/pdf";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// Text for HTML output and error messages, bytes for PDF and images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactBody {
    Text(String),
    Binary(Vec<u8>),
}

impl ArtifactBody {
    pub fn len(&self) -> usize {
        match self {
            ArtifactBody::Text(s) => s.len(),
            ArtifactBody::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            ArtifactBody::Text(s) => s.into_bytes(),
            ArtifactBody::Binary(b) => b,
        }
    }
}

/// Final result of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub status: u16,
    pub content_type: &'static str,
    pub body: ArtifactBody,
}

impl Artifact {
    /// 200 with the rendered document.
    pub fn success(response_type: ResponseType, options: &Value, body: ArtifactBody) -> Self {
        Self {
            status: 200,
            content_type: content_type(response_type, options),
            body,
        }
    }

    /// 400 for validation errors, 500 with full parameter context for the
    /// rest.
    pub fn failure(params: &RequestParams, error: &HtmlTemplatingError) -> Self {
        let status = error.status_code();
        let message = if status == 400 {
            format!("Failed to process html, {}", error)
        } else {
            format!(
                "Failed to process html based on parameters {}. Error name={}, Error message: {}",
                params.describe(),
                error.name(),
                error
            )
        };
        Self {
            status,
            content_type: CONTENT_TYPE_TEXT,
            body: ArtifactBody::Text(message),
        }
    }
}

/// Content type for a successful response of the given format.
pub fn content_type(response_type: ResponseType, options: &Value) -> &'static str {
    match response_type {
        ResponseType::Html => CONTENT_TYPE_HTML,
        ResponseType::Pdf => CONTENT_TYPE_PDF,
        ResponseType::Image => ImageType::from_options(options).content_type(),
    }
}
