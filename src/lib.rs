//! ABAP Refactor Function - an HTTP endpoint that asks a hosted model to
//! modernize legacy ABAP code.
//!
//! A caller POSTs `{"abapCode": "..."}`. The code is placed after a fixed
//! instruction prompt and sent to Vertex AI `generateContent`; the first text
//! part of the first candidate is returned verbatim as `text/plain`.
//!
//! # Architecture
//!
//! - [`core`]: configuration, errors, logging context, metrics, middleware
//! - [`api`]: router and HTTP handlers
//! - [`services`]: prompt construction and the completion client
//!
//! # Configuration
//!
//! Required:
//! - `PROJECT_ID` (or `GOOGLE_CLOUD_PROJECT`): cloud project identifier
//!
//! Optional:
//! - `LOCATION`: Vertex AI region (default: us-central1)
//! - `MODEL_NAME`: model identifier (default: gemini-1.5-pro-002)
//! - `HOST` / `PORT`: bind address (default: 0.0.0.0:8080)
//! - `VERTEX_ACCESS_TOKEN`: static bearer token instead of the metadata server
//! - `REQUIRE_VERTEX_CONFIG`: refuse to start without complete configuration

pub mod api;
pub mod core;
pub mod services;

// Re-export commonly used types for convenience
pub use crate::api::{build_router, AppState};
pub use crate::core::{AppConfig, AppError, ErrorKind, Result};
pub use crate::services::{CompletionClient, CompletionError, VertexClient};
