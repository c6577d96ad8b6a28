//! Cohere chat endpoint, called directly so documents, chat history and
//! prompt truncation go out in Cohere's own request shape.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::llm_provider::{ChatRequest, ChatService, ChatServiceError, RetryPolicy, with_retry};
use super::session::Role;
use crate::config::{LlmConfig, PromptTruncation};

pub const DEFAULT_BASE_URL: &str = "https://api.cohere.ai";

#[derive(Debug, Serialize)]
pub struct CohereChatRequest<'a> {
    pub model: &'a str,
    pub message: &'a str,
    pub chat_history: Vec<CohereTurn<'a>>,
    pub documents: Vec<CohereDocument<'a>>,
    pub preamble: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_truncation: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct CohereTurn<'a> {
    pub role: &'static str,
    pub message: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CohereDocument<'a> {
    pub title: &'a str,
    pub snippet: &'a str,
}

#[derive(Debug, Deserialize)]
struct CohereChatResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct CohereErrorBody {
    message: String,
}

impl<'a> CohereChatRequest<'a> {
    pub fn new(model: &'a str, request: &'a ChatRequest) -> Self {
        Self {
            model,
            message: &request.message,
            chat_history: request
                .history
                .iter()
                .map(|m| CohereTurn {
                    role: match m.role {
                        Role::User => "USER",
                        Role::Chatbot => "CHATBOT",
                    },
                    message: &m.text,
                })
                .collect(),
            documents: request
                .documents
                .iter()
                .map(|c| CohereDocument {
                    title: &c.title,
                    snippet: &c.snippet,
                })
                .collect(),
            preamble: &request.preamble,
            prompt_truncation: match request.prompt_truncation {
                PromptTruncation::Auto => Some("AUTO"),
                PromptTruncation::Off => None,
            },
        }
    }
}

pub struct CohereChatService {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    retry: RetryPolicy,
}

impl CohereChatService {
    pub fn new(base_url: &str, model: &str, retry: RetryPolicy) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/v1/chat", base_url.trim_end_matches('/')),
            model: model.to_string(),
            retry,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
            &config.model,
            RetryPolicy::from_config(config),
        )
    }

    async fn attempt(&self, request: &ChatRequest) -> Result<String, ChatServiceError> {
        let body = CohereChatRequest::new(&self.model, request);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&request.credential)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatServiceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<CohereErrorBody>(&raw)
                .map(|b| b.message)
                .unwrap_or(raw);
            let detail = format!("{status}: {message}");
            return Err(
                if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
                    ChatServiceError::Rejected(detail)
                } else {
                    ChatServiceError::Request(detail)
                },
            );
        }

        let parsed: CohereChatResponse = response
            .json()
            .await
            .map_err(|e| ChatServiceError::Request(format!("invalid response: {e}")))?;

        if parsed.text.trim().is_empty() {
            return Err(ChatServiceError::EmptyReply);
        }
        Ok(parsed.text)
    }
}

#[async_trait]
impl ChatService for CohereChatService {
    async fn chat(&self, request: &ChatRequest) -> Result<String, ChatServiceError> {
        tracing::debug!(
            "Sending chat request to cohere/{} ({} history, {} documents)",
            self.model,
            request.history.len(),
            request.documents.len()
        );
        with_retry(&self.retry, || self.attempt(request)).await
    }
}
