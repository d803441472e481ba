use std::env;
use std::time::Duration;

use async_trait::async_trait;
use eyre::Result;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use crate::error::ApiError;

const DEFAULT_LLM_URL: &str = "http://localhost:8080/api";

/// Inference requests get a generous budget for model latency.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Reply envelope of the inference service.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    pub answer: String,
}

/// The one question-answering call the chat loop depends on. Behind a trait
/// so the session controller can be driven by a stub in tests.
#[async_trait]
pub trait InferenceApi: Send + Sync {
    async fn ask(&self, question: &str, student_id: i64) -> Result<ApiResponse, ApiError>;
}

/// HTTP client for the UniChat LLM service.
pub struct InferenceClient {
    base_url: String,
    client: reqwest::Client,
}

impl InferenceClient {
    /// Base address comes from `UNICHAT_LLM_URL`, falling back to the local
    /// development default.
    pub fn new() -> Result<Self> {
        let base_url = env::var("UNICHAT_LLM_URL").unwrap_or_else(|_| DEFAULT_LLM_URL.to_string());
        Self::with_base_url(base_url)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl InferenceApi for InferenceClient {
    async fn ask(&self, question: &str, student_id: i64) -> Result<ApiResponse, ApiError> {
        let request_body = json!({
            "question": question,
            "student_id": student_id,
        });

        debug!("Sending question to inference service: {}", request_body);

        let response = self
            .client
            .post(format!("{}/query", self.base_url))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("Inference request failed with status {}", status);
            return Err(ApiError::Status(status));
        }

        let parsed: ApiResponse = response.json().await?;
        debug!("Received answer ({} bytes)", parsed.answer.len());

        Ok(parsed)
    }
}
