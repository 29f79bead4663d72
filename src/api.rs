use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::config::ChatConfig;
use crate::constants::ASK_QUESTION_PATH;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("malformed API response: {0}")]
    Decode(String),
}

// Body of POST /ask_question. Only the current question is sent, never history.
#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    question: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub source: String,
    pub page: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    pub human: String,
    pub ia: String,
    #[serde(default)]
    pub source: Vec<Source>,
    #[serde(default)]
    pub datetime: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Metrics {
    pub tokens_used: u64,
    pub response_time: f64,
}

/// Response of POST /ask_question. Only `answer` is required.
#[derive(Debug, Clone, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub source: Vec<Source>,
    // Server-side history; accepted but never fed back into the transcript.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub metrics: Option<Metrics>,
}

#[derive(Debug, Deserialize)]
struct AboutResponse {
    message: String,
}

/// The remote question-answering service.
#[async_trait]
pub trait QuestionApi: Send + Sync {
    async fn ask(&self, question: &str) -> Result<AskResponse, ApiError>;
}

/// HTTP client for the GravidAI API.
#[derive(Debug, Clone)]
pub struct GravidClient {
    client: Client,
    config: ChatConfig,
}

impl GravidClient {
    pub fn new(config: ChatConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    /// Service description from `GET /`.
    #[instrument(skip(self))]
    pub async fn about(&self) -> Result<String, ApiError> {
        let url = self.config.endpoint("");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;
        let about: AboutResponse = decode(response).await?;
        // The server indents its multi-line message.
        let message = about
            .message
            .lines()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n");
        Ok(message.trim().to_string())
    }
}

#[async_trait]
impl QuestionApi for GravidClient {
    #[instrument(skip(self))]
    async fn ask(&self, question: &str) -> Result<AskResponse, ApiError> {
        let url = self.config.endpoint(ASK_QUESTION_PATH);
        let response = self
            .client
            .post(url.clone())
            .json(&AskRequest { question })
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

        let answer: AskResponse = decode(response).await?;
        if let Some(metrics) = &answer.metrics {
            debug!(
                tokens_used = metrics.tokens_used,
                response_time = metrics.response_time,
                "Answer metrics"
            );
        }
        debug!(sources = answer.source.len(), history = answer.history.len(), "Received answer");
        Ok(answer)
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        error!(%status, %body, "GravidAI API request failed");
        return Err(ApiError::Status { status, body });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}
