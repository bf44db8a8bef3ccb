//! Parameter resolution: merge query-string and JSON body inputs into one
//! normalised [`RequestParams`] record.
//!
//! `htmlTemplate`, `htmlUrl` and `responseType` may come from either place;
//! the query string wins when both carry a value. `htmlContent`, `options`
//! and `data` are only ever read from the body. Resolution never fails:
//! anything missing simply stays unset and is judged later by
//! [`crate::pipeline::source::locate`].

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

pub const PARAM_HTML_TEMPLATE: &str = "htmlTemplate";
pub const PARAM_HTML_URL: &str = "htmlUrl";
pub const PARAM_HTML_CONTENT: &str = "htmlContent";
pub const PARAM_RESPONSE_TYPE: &str = "responseType";
pub const PARAM_DATA: &str = "data";
pub const PARAM_OPTIONS: &str = "options";

/// PDF option forced on unless the caller set it.
pub const OPTION_PRINT_BACKGROUND: &str = "printBackground";

/// The three output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    Html,
    Pdf,
    Image,
}

impl ResponseType {
    /// Exact, case-sensitive match against `html`, `pdf`, `image`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "html" => Some(ResponseType::Html),
            "pdf" => Some(ResponseType::Pdf),
            "image" => Some(ResponseType::Image),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Html => "html",
            ResponseType::Pdf => "pdf",
            ResponseType::Image => "image",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request after query/body merging and default application.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestParams {
    pub html_template: Option<String>,
    pub html_url: Option<String>,
    pub html_content: Option<String>,
    /// Raw format name; `"pdf"` when the caller gave none. Not yet validated.
    pub response_type: String,
    /// Substitution data. `None` when the body carried no `data`.
    pub data: Option<Value>,
    /// Format options with defaults applied.
    pub options: Value,
}

/// Merge the query map and optional parsed body into a [`RequestParams`].
pub fn resolve(query: &HashMap<String, String>, body: Option<&Value>) -> RequestParams {
    let body = body.and_then(Value::as_object);
    let from_body = |key: &str| body.and_then(|b| b.get(key)).and_then(value_as_text);

    let html_template = query
        .get(PARAM_HTML_TEMPLATE)
        .cloned()
        .or_else(|| from_body(PARAM_HTML_TEMPLATE));
    let html_url = query
        .get(PARAM_HTML_URL)
        .cloned()
        .or_else(|| from_body(PARAM_HTML_URL));
    let response_type = query
        .get(PARAM_RESPONSE_TYPE)
        .cloned()
        .or_else(|| from_body(PARAM_RESPONSE_TYPE));
    let html_content = from_body(PARAM_HTML_CONTENT);

    let options = body
        .and_then(|b| b.get(PARAM_OPTIONS))
        .filter(|v| !v.is_null())
        .cloned();
    let data = body
        .and_then(|b| b.get(PARAM_DATA))
        .filter(|v| !v.is_null())
        .cloned();

    let response_type = response_type.unwrap_or_else(|| ResponseType::Pdf.as_str().to_string());
    let options = apply_option_defaults(&response_type, options);

    RequestParams {
        html_template,
        html_url,
        html_content,
        response_type,
        data,
        options,
    }
}

/// Fill in format-specific option defaults.
///
/// Absent options become `{printBackground: true}` for pdf and `{}` for
/// everything else. For pdf, an object that lacks `printBackground` (or holds
/// `null` there) gets `true`; an explicit `false` is left alone. Options that
/// are not an object are passed through untouched.
pub fn apply_option_defaults(response_type: &str, options: Option<Value>) -> Value {
    let is_pdf = response_type == ResponseType::Pdf.as_str();
    let mut options = options.unwrap_or_else(|| Value::Object(Map::new()));

    if is_pdf {
        if let Value::Object(map) = &mut options {
            let unset = map
                .get(OPTION_PRINT_BACKGROUND)
                .map_or(true, Value::is_null);
            if unset {
                map.insert(OPTION_PRINT_BACKGROUND.to_string(), Value::Bool(true));
            }
        }
    }
    options
}

/// Text form of a body field. `null` counts as absent; other non-string
/// values keep their JSON spelling so they fail later with a useful message.
fn value_as_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Best-effort JSON rendering for diagnostics; never fails.
pub fn to_log_string(v: Option<&Value>) -> String {
    match v {
        None => "null".to_string(),
        Some(v) => serde_json::to_string(v).unwrap_or_else(|_| format!("{v:?}")),
    }
}

impl RequestParams {
    /// One-line parameter summary used in logs and 500 bodies.
    pub fn describe(&self) -> String {
        let opt = |s: &Option<String>| s.clone().unwrap_or_else(|| "null".to_string());
        format!(
            "[responseType={}, htmlTemplate={},htmlUrl={},htmlContent={},options={},data={}]",
            self.response_type,
            opt(&self.html_template),
            opt(&self.html_url),
            opt(&self.html_content),
            to_log_string(Some(&self.options)),
            to_log_string(self.data.as_ref()),
        )
    }
}
