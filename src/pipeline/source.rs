//! Content source location: pick the one document source a request uses and
//! retrieve remote documents.
//!
//! The three optional request fields collapse into a single [`ContentSource`]
//! here, once, so later stages match on a tagged value instead of re-checking
//! three nullable fields. Priority is template > url > content; lower-priority
//! fields are ignored without comment.

use crate::config::ServiceConfig;
use crate::error::HtmlTemplatingError;
use crate::pipeline::params::{RequestParams, ResponseType};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// The document a request renders from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// A template file, already resolved against the template root.
    Template(PathBuf),
    /// A remote document to GET.
    Url(String),
    /// Literal template text from the request body.
    Inline(String),
}

impl ContentSource {
    /// Template path, if this source is a file.
    pub fn template_path(&self) -> Option<&Path> {
        match self {
            ContentSource::Template(p) => Some(p),
            _ => None,
        }
    }
}

/// A validated request: exactly one source and a known output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub source: ContentSource,
    pub response_type: ResponseType,
}

/// Template text ready for the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDocument {
    /// Rendered straight from disk so includes resolve next to the file.
    TemplateFile(PathBuf),
    /// Body of the `htmlUrl` response.
    Fetched { url: String, text: String },
    /// The `htmlContent` text.
    Inline(String),
}

/// Choose the content source and validate the output format.
///
/// # Errors
/// [`HtmlTemplatingError::NoContentSource`] when no source field is set,
/// otherwise [`HtmlTemplatingError::InvalidResponseType`] for an unknown
/// format. The source check comes first, so a request missing both reports
/// the missing source.
pub fn locate(params: &RequestParams, config: &ServiceConfig) -> Result<Located, HtmlTemplatingError> {
    let source = if let Some(ref template) = params.html_template {
        ContentSource::Template(config.resolve_template_path(template))
    } else if let Some(ref url) = params.html_url {
        ContentSource::Url(url.clone())
    } else if let Some(ref content) = params.html_content {
        ContentSource::Inline(content.clone())
    } else {
        return Err(HtmlTemplatingError::NoContentSource);
    };

    let response_type = ResponseType::parse(&params.response_type).ok_or_else(|| {
        HtmlTemplatingError::InvalidResponseType {
            value: params.response_type.clone(),
        }
    })?;

    debug!("Selected content source: {:?}", source);
    Ok(Located {
        source,
        response_type,
    })
}

/// Turn a [`ContentSource`] into something the renderer can consume,
/// fetching URL sources.
pub async fn load(
    source: &ContentSource,
    config: &ServiceConfig,
) -> Result<SourceDocument, HtmlTemplatingError> {
    match source {
        ContentSource::Template(path) => {
            info!("...getting htmlTemplate {}", path.display());
            Ok(SourceDocument::TemplateFile(path.clone()))
        }
        ContentSource::Url(url) => {
            let text = fetch_text(url, config.fetch_timeout_secs).await?;
            Ok(SourceDocument::Fetched {
                url: url.clone(),
                text,
            })
        }
        ContentSource::Inline(text) => {
            debug!("...parsing htmlContent ({} bytes)", text.len());
            Ok(SourceDocument::Inline(text.clone()))
        }
    }
}

/// GET `url` once and return the body as text.
///
/// The status code is not inspected: an error page is still a page, and it
/// is rendered like any other body. Only transport failures and unreadable
/// bodies are errors.
pub async fn fetch_text(url: &str, timeout_secs: Option<u64>) -> Result<String, HtmlTemplatingError> {
    info!("...fetching htmlUrl {}", url);

    let fetch_err = |reason: String| HtmlTemplatingError::FetchFailed {
        url: url.to_string(),
        reason,
    };

    let mut builder = reqwest::Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    let client = builder.build().map_err(|e| fetch_err(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| fetch_err(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        warn!("htmlUrl {} answered HTTP {}; rendering body anyway", url, status);
    }

    let text = response.text().await.map_err(|e| fetch_err(e.to_string()))?;
    debug!("Fetched {} bytes from {}", text.len(), url);
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::params::resolve;
    use serde_json::json;
    use std::collections::HashMap;

    fn params(body: serde_json::Value) -> RequestParams {
        resolve(&HashMap::new(), Some(&body))
    }

    fn config() -> ServiceConfig {
        ServiceConfig::builder()
            .template_root("/srv/templates")
            .build()
            .unwrap()
    }

    #[test]
    fn template_beats_url_beats_content() {
        let p = params(json!({
            "htmlTemplate": "a.html",
            "htmlUrl": "http://x",
            "htmlContent": "c"
        }));
        let l = locate(&p, &config()).unwrap();
        assert_eq!(
            l.source,
            ContentSource::Template(PathBuf::from("/srv/templates/a.html"))
        );

        let p = params(json!({"htmlUrl": "http://x", "htmlContent": "c"}));
        assert_eq!(
            locate(&p, &config()).unwrap().source,
            ContentSource::Url("http://x".into())
        );

        let p = params(json!({"htmlContent": "c"}));
        assert_eq!(
            locate(&p, &config()).unwrap().source,
            ContentSource::Inline("c".into())
        );
    }

    #[test]
    fn missing_source_is_validation_error() {
        for rt in ["html", "pdf", "image", "bogus"] {
            let p = params(json!({"responseType": rt}));
            let err = locate(&p, &config()).unwrap_err();
            assert!(
                matches!(err, HtmlTemplatingError::NoContentSource),
                "{rt}: {err}"
            );
        }
    }

    #[test]
    fn unknown_format_is_validation_error() {
        let p = params(json!({"htmlContent": "x", "responseType": "docx"}));
        let err = locate(&p, &config()).unwrap_err();
        assert!(matches!(
            err,
            HtmlTemplatingError::InvalidResponseType { ref value } if value == "docx"
        ));
    }

    #[test]
    fn format_defaults_to_pdf() {
        let p = params(json!({"htmlContent": "x"}));
        assert_eq!(
            locate(&p, &config()).unwrap().response_type,
            ResponseType::Pdf
        );
    }

    #[tokio::test]
    async fn unreachable_url_is_fetch_error() {
        // Port 9 (discard) on localhost is essentially never listening.
        let err = fetch_text("http://127.0.0.1:9/x.html", Some(5))
            .await
            .unwrap_err();
        assert!(matches!(err, HtmlTemplatingError::FetchFailed { .. }), "{err}");
    }

    #[tokio::test]
    async fn malformed_url_is_fetch_error() {
        let err = fetch_text("not a url", None).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Fetch);
    }
}
