//! HTTP handlers for the refactor function.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::{json, Value};

use crate::core::config::{AppConfig, DEFAULT_MAX_BODY_BYTES};
use crate::core::logging::get_request_id;
use crate::core::{AppError, Result};
use crate::services::{build_request, CompletionClient, VertexClient};

/// Name of the request body field carrying the source code.
pub const ABAP_CODE_FIELD: &str = "abapCode";

/// Shared application state.
///
/// Built once at startup and never mutated. `completion` is `None` when the
/// Vertex AI configuration is incomplete, which turns every submission into a
/// configuration error.
#[derive(Clone)]
pub struct AppState {
    completion: Option<Arc<dyn CompletionClient>>,
    max_body_bytes: usize,
}

impl AppState {
    /// State backed by the given completion client.
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            completion: Some(client),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// State with no completion client; submissions fail with a 500.
    pub fn unconfigured() -> Self {
        Self {
            completion: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Override the request body read limit.
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Build the state from configuration around an existing client.
    ///
    /// The client is only installed when the Vertex AI coordinates are
    /// complete; otherwise the state is unconfigured and never calls it.
    pub fn with_client(config: &AppConfig, client: Arc<dyn CompletionClient>) -> Self {
        Self::assemble(config, Some(client))
    }

    /// Build the state from configuration, creating a Vertex AI client when
    /// the coordinates are complete.
    ///
    /// Incomplete configuration yields an unconfigured state. Coordinates that
    /// are present but unusable are reported as an error.
    pub fn from_config(config: &AppConfig, http_client: reqwest::Client) -> anyhow::Result<Self> {
        if !config.vertex.is_complete() {
            return Ok(Self::assemble(config, None));
        }

        let client = VertexClient::new(&config.vertex, http_client)?;
        tracing::info!(
            model = %client.model(),
            url = %client.url(),
            "Vertex AI client initialized"
        );
        Ok(Self::assemble(config, Some(Arc::new(client))))
    }

    fn assemble(config: &AppConfig, client: Option<Arc<dyn CompletionClient>>) -> Self {
        let missing = config.vertex.missing_fields();
        let completion = if missing.is_empty() {
            client
        } else {
            tracing::error!(
                missing = %missing.join(", "),
                "Vertex AI configuration incomplete; every request will fail with 500"
            );
            None
        };

        Self {
            completion,
            max_body_bytes: config.max_body_bytes,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.completion.is_some()
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }
}

/// Pull the source code out of a JSON request body.
///
/// An empty or unparseable body, a non-object body, or one without the field
/// counts as missing. A present field must be a string that is not blank.
pub fn extract_abap_code(body: &[u8]) -> Result<String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::MissingAbapCode);
    }

    let payload: Value = serde_json::from_slice(body).map_err(|_| AppError::MissingAbapCode)?;
    let field = payload
        .as_object()
        .and_then(|obj| obj.get(ABAP_CODE_FIELD))
        .ok_or(AppError::MissingAbapCode)?;

    match field {
        Value::String(code) if !code.trim().is_empty() => Ok(code.clone()),
        _ => Err(AppError::InvalidAbapCode),
    }
}

/// The function endpoint.
///
/// Order of checks: preflight, configuration, method, payload. The body is
/// only read once the request is known to be a POST, and never beyond
/// `max_body_bytes`. Only a request that passes every check reaches the
/// completion service.
pub async fn refactor_abap(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response> {
    if request.method() == Method::OPTIONS {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let client = state.completion.as_deref().ok_or(AppError::Config)?;

    if request.method() != Method::POST {
        return Err(AppError::MethodNotAllowed);
    }

    let limit = state.max_body_bytes;
    let body = axum::body::to_bytes(request.into_body(), limit)
        .await
        .map_err(|e| {
            tracing::debug!(error = %e, limit, "Failed to read request body");
            AppError::BodyTooLarge { limit }
        })?;
    let abap_code = extract_abap_code(&body)?;

    tracing::info!(
        request_id = %get_request_id(),
        model = %client.model(),
        abap_code = %abap_code,
        "Received ABAP code"
    );

    let request = build_request(&abap_code);
    let response = client.generate_content(&request).await?;
    let text = response.first_text().ok_or(AppError::NoValidResponse)?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        text.to_string(),
    )
        .into_response())
}

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "completion_configured": state.is_configured()
    }))
}

/// Prometheus metrics endpoint.
pub async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::VertexConfig;
    use axum::body::Body;
    use crate::services::{CompletionError, GenerateContentRequest, GenerateContentResponse};
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    struct EchoClient;

    #[async_trait]
    impl CompletionClient for EchoClient {
        fn model(&self) -> &str {
            "echo"
        }

        async fn generate_content(
            &self,
            request: &GenerateContentRequest,
        ) -> std::result::Result<GenerateContentResponse, CompletionError> {
            let prompt = request.contents[0].parts[0].text.clone().unwrap_or_default();
            Ok(GenerateContentResponse::from_text(prompt))
        }
    }

    fn state() -> State<Arc<AppState>> {
        State(Arc::new(AppState::new(Arc::new(EchoClient))))
    }

    fn request(method: Method, body: impl Into<Body>) -> Request {
        axum::http::Request::builder()
            .method(method)
            .uri("/")
            .body(body.into())
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_extract_abap_code_valid() {
        let code = extract_abap_code(br#"{"abapCode": "  WRITE 'x'.  "}"#).unwrap();
        // Surrounding whitespace is kept; trimming only decides emptiness.
        assert_eq!(code, "  WRITE 'x'.  ");
    }

    #[test]
    fn test_extract_abap_code_missing() {
        assert_matches!(extract_abap_code(b""), Err(AppError::MissingAbapCode));
        assert_matches!(extract_abap_code(b"  \n"), Err(AppError::MissingAbapCode));
        assert_matches!(extract_abap_code(b"{}"), Err(AppError::MissingAbapCode));
        assert_matches!(
            extract_abap_code(br#"{"code": "x"}"#),
            Err(AppError::MissingAbapCode)
        );
        assert_matches!(extract_abap_code(b"not json"), Err(AppError::MissingAbapCode));
        assert_matches!(extract_abap_code(b"[1, 2]"), Err(AppError::MissingAbapCode));
        assert_matches!(extract_abap_code(b"null"), Err(AppError::MissingAbapCode));
    }

    #[test]
    fn test_extract_abap_code_invalid() {
        for body in [
            r#"{"abapCode": ""}"#,
            r#"{"abapCode": "   "}"#,
            r#"{"abapCode": "\n\t"}"#,
            r#"{"abapCode": 42}"#,
            r#"{"abapCode": null}"#,
            r#"{"abapCode": ["x"]}"#,
            r#"{"abapCode": {"a": 1}}"#,
            r#"{"abapCode": true}"#,
        ] {
            assert_matches!(
                extract_abap_code(body.as_bytes()),
                Err(AppError::InvalidAbapCode),
                "body: {}",
                body
            );
        }
    }

    #[tokio::test]
    async fn test_options_short_circuits() {
        let response = refactor_abap(
            State(Arc::new(AppState::unconfigured())),
            request(Method::OPTIONS, "garbage"),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(body_text(response).await, "");
    }

    #[tokio::test]
    async fn test_unconfigured_state_rejects_post() {
        let result = refactor_abap(
            State(Arc::new(AppState::unconfigured())),
            request(Method::POST, r#"{"abapCode": "WRITE 'x'."}"#),
        )
        .await;
        assert_matches!(result, Err(AppError::Config));
    }

    #[tokio::test]
    async fn test_get_is_not_allowed() {
        let result = refactor_abap(state(), request(Method::GET, Body::empty())).await;
        assert_matches!(result, Err(AppError::MethodNotAllowed));
    }

    #[tokio::test]
    async fn test_post_returns_model_text() {
        let response = refactor_abap(
            state(),
            request(Method::POST, r#"{"abapCode": "DATA: lv_x TYPE i."}"#),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(
            body_text(response).await,
            crate::services::build_prompt("DATA: lv_x TYPE i.")
        );
    }

    #[tokio::test]
    async fn test_body_over_limit_is_rejected() {
        let state = State(Arc::new(
            AppState::new(Arc::new(EchoClient)).with_max_body_bytes(16),
        ));
        let result = refactor_abap(
            state,
            request(Method::POST, r#"{"abapCode": "DATA: lv_x TYPE i."}"#),
        )
        .await;
        assert_matches!(result, Err(AppError::BodyTooLarge { limit: 16 }));
    }

    #[tokio::test]
    async fn test_options_ignores_body_limit() {
        let state = State(Arc::new(
            AppState::new(Arc::new(EchoClient)).with_max_body_bytes(1),
        ));
        let response = refactor_abap(state, request(Method::OPTIONS, "x".repeat(64)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_with_client_incomplete_is_unconfigured() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        let state = AppState::with_client(&config, Arc::new(EchoClient));
        assert!(!state.is_configured());
    }

    #[test]
    fn test_with_client_takes_body_limit_from_config() {
        let config = AppConfig::from_lookup(|key: &str| match key {
            "PROJECT_ID" => Some("p".to_string()),
            "MAX_BODY_BYTES" => Some("2048".to_string()),
            _ => None,
        })
        .unwrap();
        let state = AppState::with_client(&config, Arc::new(EchoClient));
        assert!(state.is_configured());
        assert_eq!(state.max_body_bytes(), 2048);
    }

    #[test]
    fn test_from_config_incomplete_is_unconfigured() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        let state = AppState::from_config(&config, reqwest::Client::new()).unwrap();
        assert!(!state.is_configured());
    }

    #[test]
    fn test_from_config_unsafe_coordinates_is_error() {
        let mut config = AppConfig::from_lookup(|_| None).unwrap();
        config.vertex = VertexConfig {
            project_id: Some("bad/project".to_string()),
            ..VertexConfig::default()
        };
        assert!(AppState::from_config(&config, reqwest::Client::new()).is_err());
    }

    #[tokio::test]
    async fn test_metrics_handler_returns_text() {
        crate::core::init_metrics();
        let response = metrics_handler().await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
