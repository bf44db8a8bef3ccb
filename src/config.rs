//! Configuration types for the rendering service.
//!
//! Everything that is fixed for the lifetime of the process lives in
//! [`ServiceConfig`], built via its [`ServiceConfigBuilder`]. Per-request
//! inputs (template, data, options) never go here; see
//! [`crate::pipeline::params`] for those.

use crate::error::HtmlTemplatingError;
use crate::pipeline::engine::{ChromeEngine, DocumentEngine};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default name of the process environment variable holding the deployment
/// environment.
pub const DEFAULT_ENVIRONMENT_VARIABLE: &str = "Environment";

/// Default value of that variable which marks a production deployment and
/// suppresses the watermark.
pub const DEFAULT_PRODUCTION_MARKER: &str = "p";

/// Default cap on the request body: 50 MiB, room for inline documents with
/// embedded images.
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Where the deployment-environment flag is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentSource {
    /// Read the named process environment variable on every request.
    Process { variable: String },
    /// A fixed value, for embedding the pipeline or for tests.
    /// `None` behaves like an unset variable.
    Fixed(Option<String>),
}

impl Default for EnvironmentSource {
    fn default() -> Self {
        EnvironmentSource::Process {
            variable: DEFAULT_ENVIRONMENT_VARIABLE.to_string(),
        }
    }
}

impl EnvironmentSource {
    /// Current value of the flag. An unset or non-unicode variable is `None`.
    pub fn read(&self) -> Option<String> {
        match self {
            EnvironmentSource::Process { variable } => std::env::var(variable).ok(),
            EnvironmentSource::Fixed(value) => value.clone(),
        }
    }
}

/// Process-wide settings for the rendering service.
///
/// # Example
/// ```rust
/// use htmltemplating::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .template_root("/srv/templates")
///     .production_marker("prod")
///     .build()
///     .unwrap();
/// assert_eq!(config.production_marker, "prod");
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Directory that relative `htmlTemplate` paths resolve against.
    /// Default: the current working directory.
    pub template_root: PathBuf,

    /// Source of the deployment-environment flag. Default: the `Environment`
    /// process variable.
    pub environment: EnvironmentSource,

    /// Flag value that suppresses the watermark. Default: `"p"`.
    ///
    /// Any other value, including an unset variable, enables it.
    pub production_marker: String,

    /// Explicit Chrome/Chromium binary. If None, the browser client looks it
    /// up on `PATH` and in the usual install locations.
    pub chrome_path: Option<PathBuf>,

    /// Run the browser with its sandbox enabled. Default: false.
    ///
    /// Function hosts and containers usually lack the kernel features the
    /// Chrome sandbox needs, so the browser is started with `--no-sandbox`
    /// and `--disable-setuid-sandbox` unless this is set.
    pub sandbox: bool,

    /// Timeout for the `htmlUrl` GET in seconds. Default: None (no timeout).
    pub fetch_timeout_secs: Option<u64>,

    /// Upper bound handed to the browser client for each CDP call and for
    /// browser idleness, in seconds. Default: 86 400.
    ///
    /// The client refuses an unbounded value, so the default is large enough
    /// to never trigger on a real document.
    pub engine_timeout_secs: u64,

    /// Largest accepted request body in bytes. Default:
    /// [`DEFAULT_MAX_BODY_BYTES`]. Larger bodies get 413.
    pub max_body_bytes: usize,

    /// Pre-constructed conversion backend. If None, a [`ChromeEngine`] is
    /// built from the fields above.
    pub engine: Option<Arc<dyn DocumentEngine>>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            template_root: PathBuf::from("."),
            environment: EnvironmentSource::default(),
            production_marker: DEFAULT_PRODUCTION_MARKER.to_string(),
            chrome_path: None,
            sandbox: false,
            fetch_timeout_secs: None,
            engine_timeout_secs: 86_400,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            engine: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("template_root", &self.template_root)
            .field("environment", &self.environment)
            .field("production_marker", &self.production_marker)
            .field("chrome_path", &self.chrome_path)
            .field("sandbox", &self.sandbox)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("engine_timeout_secs", &self.engine_timeout_secs)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("engine", &self.engine.as_ref().map(|_| "<dyn DocumentEngine>"))
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether output rendered right now should carry the test watermark.
    ///
    /// Reads the environment flag once; callers hold on to the answer for the
    /// rest of the request.
    pub fn watermark_enabled(&self) -> (Option<String>, bool) {
        let env = self.environment.read();
        let enabled = env.as_deref() != Some(self.production_marker.as_str());
        (env, enabled)
    }

    /// The conversion backend to use for PDF and image output.
    pub fn document_engine(&self) -> Arc<dyn DocumentEngine> {
        match self.engine {
            Some(ref engine) => Arc::clone(engine),
            None => Arc::new(ChromeEngine::from_config(self)),
        }
    }

    /// Resolve a caller-supplied template path against [`Self::template_root`].
    pub fn resolve_template_path(&self, template: &str) -> PathBuf {
        let p = Path::new(template);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.template_root.join(p)
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn template_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.template_root = dir.into();
        self
    }

    pub fn environment(mut self, source: EnvironmentSource) -> Self {
        self.config.environment = source;
        self
    }

    /// Shorthand for `environment(EnvironmentSource::Process { variable })`.
    pub fn environment_variable(mut self, variable: impl Into<String>) -> Self {
        self.config.environment = EnvironmentSource::Process {
            variable: variable.into(),
        };
        self
    }

    pub fn production_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.production_marker = marker.into();
        self
    }

    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    pub fn sandbox(mut self, v: bool) -> Self {
        self.config.sandbox = v;
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = Some(secs);
        self
    }

    pub fn engine_timeout_secs(mut self, secs: u64) -> Self {
        self.config.engine_timeout_secs = secs;
        self
    }

    pub fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.config.max_body_bytes = bytes;
        self
    }

    pub fn engine(mut self, engine: Arc<dyn DocumentEngine>) -> Self {
        self.config.engine = Some(engine);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, HtmlTemplatingError> {
        let c = &self.config;
        if c.production_marker.is_empty() {
            return Err(HtmlTemplatingError::InvalidConfig(
                "production marker must not be empty".into(),
            ));
        }
        if let EnvironmentSource::Process { variable } = &c.environment {
            if variable.is_empty() {
                return Err(HtmlTemplatingError::InvalidConfig(
                    "environment variable name must not be empty".into(),
                ));
            }
        }
        if c.engine_timeout_secs == 0 {
            return Err(HtmlTemplatingError::InvalidConfig(
                "engine timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_body_bytes == 0 {
            return Err(HtmlTemplatingError::InvalidConfig(
                "body limit must be at least 1 byte".into(),
            ));
        }
        if c.fetch_timeout_secs == Some(0) {
            return Err(HtmlTemplatingError::InvalidConfig(
                "fetch timeout must be ≥ 1 second when set".into(),
            ));
        }
        Ok(self.config)
    }
}
