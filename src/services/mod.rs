//! Business logic: prompt construction and the completion service client.

pub mod completion;
pub mod prompt;
pub mod vertex;

pub use completion::{
    Candidate, CompletionClient, CompletionError, Content, GenerateContentRequest,
    GenerateContentResponse, GenerationConfig, Part, UsageMetadata,
};
pub use prompt::{build_prompt, build_request, PROMPT_TEMPLATE, TEMPERATURE};
pub use vertex::{build_generate_content_url, create_http_client, VertexClient};
