use std::env;
use std::time::Duration;

use chrono::{DateTime, Utc};
use eyre::Result;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::ApiError;

const DEFAULT_API_URL: &str = "http://localhost:8000/api";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Subset of the student record the client cares about. The backend sends
/// the full serialized model; unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct StudentDetails {
    pub id: i64,
    pub nome: String,
    pub curso: String,
    pub semestre: u32,
}

/// One persisted question/answer pair. Field names follow the backend's
/// Portuguese wire contract.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub aluno: i64,
    #[serde(default)]
    pub aluno_nome: Option<String>,
    pub pergunta: String,
    pub resposta: String,
    pub timestamp: DateTime<Utc>,
}

/// HTTP client for the UniChat backend (student records and chat history).
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    /// Base address comes from `UNICHAT_API_URL`, falling back to the local
    /// development default.
    pub fn new() -> Result<Self> {
        let base_url = env::var("UNICHAT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
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

    /// Fetch the detailed record of a student. Failures propagate unchanged.
    pub async fn student_details(&self, student_id: i64) -> Result<StudentDetails, ApiError> {
        let response = self
            .client
            .get(format!("{}/alunos/{}/detalhes/", self.base_url, student_id))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }

        Ok(response.json().await?)
    }

    /// Fetch the durable chat history of a student. Failures propagate
    /// unchanged.
    pub async fn history(&self, student_id: i64) -> Result<Vec<HistoryEntry>, ApiError> {
        let response = self
            .client
            .get(format!("{}/chat-historico/por_aluno/", self.base_url))
            .query(&[("aluno_id", student_id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }

        Ok(response.json().await?)
    }

    /// Save one question/answer pair to the durable history.
    ///
    /// Best-effort: any failure is logged and swallowed, returning `None`.
    /// The write is never retried and its outcome is invisible to the chat
    /// flow.
    pub async fn persist_message(
        &self,
        student_id: i64,
        question: &str,
        answer: &str,
    ) -> Option<HistoryEntry> {
        let request_body = json!({
            "aluno": student_id,
            "pergunta": question,
            "resposta": answer,
        });

        let result = async {
            let response = self
                .client
                .post(format!("{}/chat-historico/", self.base_url))
                .json(&request_body)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(ApiError::Status(status));
            }

            Ok::<HistoryEntry, ApiError>(response.json().await?)
        }
        .await;

        match result {
            Ok(entry) => {
                debug!("Persisted chat turn {} for student {}", entry.id, student_id);
                Some(entry)
            }
            Err(e) => {
                warn!("Failed to persist chat turn for student {}: {}", student_id, e);
                None
            }
        }
    }
}
