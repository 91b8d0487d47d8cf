//! Configuration management for the ABAP refactor function.
//!
//! All settings come from the process environment and are read exactly once
//! at startup. The resulting [`AppConfig`] is immutable and shared by every
//! request through the application state.

use anyhow::{Context, Result};

/// Vertex AI region used when `LOCATION` is not set.
pub const DEFAULT_LOCATION: &str = "us-central1";

/// Model used when `MODEL_NAME` is not set.
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro-002";

/// Largest request body read by the function endpoint when `MAX_BODY_BYTES`
/// is not set (32 MiB, the HTTP request limit of the hosting platform).
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server configuration (host, port)
    pub server: ServerConfig,

    /// Coordinates of the Vertex AI model
    pub vertex: VertexConfig,

    /// Whether to verify SSL certificates for upstream requests
    pub verify_ssl: bool,

    /// Optional client-side timeout for upstream calls. `None` leaves the
    /// request bounded only by the hosting platform.
    pub request_timeout_secs: Option<u64>,

    /// Upper bound on the request body read by the function endpoint
    pub max_body_bytes: usize,

    /// Refuse to start when the Vertex AI configuration is incomplete,
    /// instead of serving a permanent 500.
    pub require_vertex_config: bool,
}

/// Server-specific configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Vertex AI coordinates and credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexConfig {
    /// Cloud project identifier (required)
    pub project_id: Option<String>,

    /// Region, e.g. `us-central1`
    pub location: String,

    /// Publisher model name, e.g. `gemini-1.5-pro-002`
    pub model: String,

    /// Override for the API base URL
    pub api_base: Option<String>,

    /// Static bearer token. When absent the token is requested from the
    /// metadata server on every call.
    pub access_token: Option<String>,

    /// Override for the metadata server token endpoint
    pub metadata_url: Option<String>,
}

impl Default for VertexConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: DEFAULT_LOCATION.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_base: None,
            access_token: None,
            metadata_url: None,
        }
    }
}

impl VertexConfig {
    /// Names of the required settings that are missing or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self
            .project_id
            .as_deref()
            .map_or(true, |p| p.trim().is_empty())
        {
            missing.push("PROJECT_ID");
        }
        if self.location.trim().is_empty() {
            missing.push("LOCATION");
        }
        if self.model.trim().is_empty() {
            missing.push("MODEL_NAME");
        }
        missing
    }

    /// True when project, location and model are all non-empty.
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Base URL of the regional Vertex AI endpoint.
    pub fn api_base(&self) -> String {
        match &self.api_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.location),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_verify_ssl() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file is honoured when present (outside of tests).
    pub fn from_env() -> Result<Self> {
        #[cfg(not(test))]
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Values are trimmed, and blank values are treated as unset so that
    /// defaults apply.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut server = ServerConfig::default();
        if let Some(host) = get("HOST") {
            server.host = host;
        }
        if let Some(port_str) = get("PORT") {
            server.port = port_str
                .parse::<u16>()
                .with_context(|| format!("Invalid PORT value: {}", port_str))?;
        }

        let request_timeout_secs = match get("REQUEST_TIMEOUT_SECS") {
            Some(s) => Some(
                s.parse::<u64>()
                    .with_context(|| format!("Invalid REQUEST_TIMEOUT_SECS value: {}", s))?,
            ),
            None => None,
        };

        let max_body_bytes = match get("MAX_BODY_BYTES") {
            Some(s) => s
                .parse::<usize>()
                .with_context(|| format!("Invalid MAX_BODY_BYTES value: {}", s))?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        let vertex = VertexConfig {
            project_id: get("PROJECT_ID").or_else(|| get("GOOGLE_CLOUD_PROJECT")),
            location: get("LOCATION").unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            model: get("MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base: get("VERTEX_API_BASE"),
            access_token: get("VERTEX_ACCESS_TOKEN"),
            metadata_url: get("VERTEX_METADATA_URL"),
        };

        Ok(Self {
            server,
            vertex,
            verify_ssl: get("VERIFY_SSL")
                .map(|v| str_to_bool(&v))
                .unwrap_or_else(default_verify_ssl),
            request_timeout_secs,
            max_body_bytes,
            require_vertex_config: get("REQUIRE_VERTEX_CONFIG")
                .map(|v| str_to_bool(&v))
                .unwrap_or(false),
        })
    }
}

/// Convert string to boolean.
///
/// Accepts: "true", "1", "yes", "on" (case-insensitive)
fn str_to_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
