//! Vertex AI `generateContent` client.
//!
//! URL format:
//! `{api_base}/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent`
//!
//! Authentication uses a bearer token, either configured statically or
//! requested from the GCE metadata server on each call.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::completion::{
    CompletionClient, CompletionError, GenerateContentRequest, GenerateContentResponse,
};
use crate::core::config::{AppConfig, VertexConfig};
use crate::core::logging::get_request_id;
use crate::core::metrics::get_metrics;

/// Token endpoint of the metadata server available to Cloud Run and Cloud Functions.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

const PUBLISHER: &str = "google";

/// Where the bearer token comes from.
#[derive(Debug, Clone)]
enum TokenSource {
    Static(String),
    MetadataServer { url: String },
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

/// Build the `generateContent` URL for the given coordinates.
pub fn build_generate_content_url(
    api_base: &str,
    project: &str,
    location: &str,
    model: &str,
) -> Result<String, String> {
    fn is_safe_path_segment(s: &str) -> bool {
        !s.is_empty() && !s.contains('/') && !s.contains('\\') && s != ".." && s != "."
    }
    if !(is_safe_path_segment(project)
        && is_safe_path_segment(location)
        && is_safe_path_segment(model))
    {
        return Err(
            "Vertex AI URL parameters must not contain path separators or traversal sequences"
                .to_string(),
        );
    }
    Ok(format!(
        "{}/v1/projects/{}/locations/{}/publishers/{}/models/{}:generateContent",
        api_base.trim_end_matches('/'),
        project,
        location,
        PUBLISHER,
        model
    ))
}

/// Pull a human-readable message out of a Vertex AI error body.
///
/// Handles both `{"error": {...}}` and the array-wrapped `[{"error": {...}}]`
/// forms, falling back to the raw text.
fn extract_error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| {
        v.get("error")
            .or_else(|| v.get(0).and_then(|first| first.get("error")))
    });
    error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

/// HTTP client for a single Vertex AI model.
#[derive(Debug, Clone)]
pub struct VertexClient {
    http_client: reqwest::Client,
    url: String,
    model: String,
    token_source: TokenSource,
}

impl VertexClient {
    /// Create a client from complete Vertex AI coordinates.
    ///
    /// Fails when the coordinates are incomplete or unsafe to put in a URL.
    pub fn new(vertex: &VertexConfig, http_client: reqwest::Client) -> anyhow::Result<Self> {
        let missing = vertex.missing_fields();
        if !missing.is_empty() {
            return Err(anyhow!(
                "Missing Vertex AI configuration: {}",
                missing.join(", ")
            ));
        }
        let project = vertex.project_id.as_deref().unwrap_or_default();
        let url = build_generate_content_url(
            &vertex.api_base(),
            project,
            &vertex.location,
            &vertex.model,
        )
        .map_err(|e| anyhow!(e))?;

        let token_source = match &vertex.access_token {
            Some(token) => TokenSource::Static(token.clone()),
            None => TokenSource::MetadataServer {
                url: vertex
                    .metadata_url
                    .clone()
                    .unwrap_or_else(|| METADATA_TOKEN_URL.to_string()),
            },
        };

        Ok(Self {
            http_client,
            url,
            model: vertex.model.clone(),
            token_source,
        })
    }

    /// The `generateContent` URL this client posts to.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn access_token(&self) -> Result<String, CompletionError> {
        match &self.token_source {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::MetadataServer { url } => {
                let response = self
                    .http_client
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| CompletionError::Auth(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(CompletionError::Auth(format!(
                        "metadata server returned {}: {}",
                        status.as_u16(),
                        body.trim()
                    )));
                }

                let token: MetadataToken = response
                    .json()
                    .await
                    .map_err(|e| CompletionError::Auth(e.to_string()))?;
                Ok(token.access_token)
            }
        }
    }

    async fn send(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, CompletionError> {
        let token = self.access_token().await?;

        let response = self
            .http_client
            .post(&self.url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| CompletionError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CompletionClient for VertexClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, CompletionError> {
        let start = Instant::now();
        tracing::debug!(
            request_id = %get_request_id(),
            model = %self.model,
            url = %self.url,
            "Sending generateContent request"
        );

        let result = self.send(request).await;

        let elapsed = start.elapsed().as_secs_f64();
        let outcome = if result.is_ok() { "success" } else { "error" };
        get_metrics()
            .upstream_latency
            .with_label_values(&[&self.model, outcome])
            .observe(elapsed);

        match &result {
            Ok(response) => {
                let usage = response.usage_metadata.clone().unwrap_or_default();
                tracing::debug!(
                    request_id = %get_request_id(),
                    model = %self.model,
                    candidates = response.candidates.len(),
                    prompt_tokens = usage.prompt_token_count,
                    completion_tokens = usage.candidates_token_count,
                    duration = %format!("{:.3}s", elapsed),
                    "generateContent completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    request_id = %get_request_id(),
                    model = %self.model,
                    error = %e,
                    "generateContent failed"
                );
            }
        }

        result
    }
}

/// Create the shared HTTP client with connection pooling.
///
/// No timeout is applied unless `REQUEST_TIMEOUT_SECS` is configured.
pub fn create_http_client(config: &AppConfig) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .danger_accept_invalid_certs(!config.verify_ssl)
        .pool_max_idle_per_host(32)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60));

    if let Some(secs) = config.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    builder.build().context("Failed to build HTTP client")
}
