use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rig::client::completion::CompletionClientDyn;
use rig::client::{ProviderClient, ProviderValue};
use rig::completion::{AssistantContent, Completion, Document, Message as RigMessage};
use rig::providers::{anthropic, gemini, mistral, openai};

use super::chunker::Chunk;
use super::cohere::CohereChatService;
use super::session::{Message, Role};
use crate::config::{LlmConfig, PromptTruncation};

fn create_provider_boxed(provider: &str, api_key: &str) -> Result<Box<dyn ProviderClient>> {
    let value = ProviderValue::Simple(api_key.to_string());

    let boxed: Box<dyn ProviderClient> = match provider.to_lowercase().as_str() {
        "openai" => {
            let c: openai::Client<reqwest::Client> = openai::Client::from_val(value);
            c.boxed()
        }
        "anthropic" => {
            let c: anthropic::Client<reqwest::Client> = anthropic::Client::from_val(value);
            c.boxed()
        }
        "gemini" | "google" => {
            let c: gemini::Client<reqwest::Client> = gemini::Client::from_val(value);
            c.boxed()
        }
        "mistral" => {
            let c: mistral::Client<reqwest::Client> = mistral::Client::from_val(value);
            c.boxed()
        }
        other => return Err(anyhow::anyhow!("Unsupported provider: {other}")),
    };

    Ok(boxed)
}

pub fn create_completion_client(
    provider: &str,
    api_key: &str,
) -> Result<Box<dyn CompletionClientDyn>> {
    let boxed = create_provider_boxed(provider, api_key)?;
    boxed
        .as_completion()
        .context(format!("Provider '{provider}' does not support completions"))
}

/// Everything one remote chat call needs. `prompt_truncation` only has an
/// effect on Cohere.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub credential: String,
    pub history: Vec<Message>,
    pub message: String,
    pub documents: Arc<[Chunk]>,
    pub preamble: String,
    pub prompt_truncation: PromptTruncation,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatServiceError {
    #[error("{0}")]
    Setup(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("reply contained no text")]
    EmptyReply,
}

impl ChatServiceError {
    /// Misconfiguration and rejected requests will not fix themselves on a
    /// second try.
    fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ChatServiceError::Setup(_) | ChatServiceError::Rejected(_)
        )
    }
}

/// Remote chat-completion service.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<String, ChatServiceError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            timeout: config.request_timeout(),
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Run `op` with a per-attempt timeout, retrying failures with exponential
/// backoff up to `policy.max_retries` extra attempts.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, ChatServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChatServiceError>>,
{
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(ChatServiceError::Timeout(policy.timeout)),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_retries && e.is_retryable() => {
                let delay = policy.delay_for(attempt);
                attempt += 1;
                tracing::warn!(
                    "Chat request failed ({e}), retry {attempt}/{} in {}ms",
                    policy.max_retries,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Pick the chat backend for the configured provider. Cohere is called
/// directly; every other provider goes through rig.
pub fn chat_service_from_config(config: &LlmConfig) -> Arc<dyn ChatService> {
    if config.provider.eq_ignore_ascii_case("cohere") {
        Arc::new(CohereChatService::from_config(config))
    } else {
        Arc::new(RigChatService::from_config(config))
    }
}

/// `ChatService` backed by a rig provider client.
pub struct RigChatService {
    provider: String,
    model: String,
    retry: RetryPolicy,
}

impl RigChatService {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            provider: config.provider.clone(),
            model: config.model.clone(),
            retry: RetryPolicy::from_config(config),
        }
    }

    async fn attempt(&self, request: &ChatRequest) -> Result<String, ChatServiceError> {
        let client = create_completion_client(&self.provider, &request.credential)
            .map_err(|e| ChatServiceError::Setup(format!("{e:#}")))?;

        let agent = client.agent(&self.model).preamble(&request.preamble).build();

        let history = request.history.iter().map(to_rig_message).collect();
        let documents = request.documents.iter().map(to_rig_document).collect();

        let response = agent
            .completion(RigMessage::user(request.message.clone()), history)
            .await
            .map_err(|e| ChatServiceError::Request(e.to_string()))?
            .documents(documents)
            .send()
            .await
            .map_err(|e| ChatServiceError::Request(e.to_string()))?;

        let text: String = response
            .choice
            .iter()
            .filter_map(|content| match content {
                AssistantContent::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect();

        if text.trim().is_empty() {
            return Err(ChatServiceError::EmptyReply);
        }
        Ok(text)
    }
}

#[async_trait]
impl ChatService for RigChatService {
    async fn chat(&self, request: &ChatRequest) -> Result<String, ChatServiceError> {
        tracing::debug!(
            "Sending chat request to {}/{} ({} history, {} documents)",
            self.provider,
            self.model,
            request.history.len(),
            request.documents.len()
        );
        with_retry(&self.retry, || self.attempt(request)).await
    }
}

fn to_rig_message(message: &Message) -> RigMessage {
    match message.role {
        Role::User => RigMessage::user(message.text.clone()),
        Role::Chatbot => RigMessage::assistant(message.text.clone()),
    }
}

fn to_rig_document(chunk: &Chunk) -> Document {
    Document {
        id: chunk.title.clone(),
        text: chunk.snippet.clone(),
        additional_props: HashMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(200),
            max_retries,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&policy(2), || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ChatServiceError::Request("connection reset".into()))
            } else {
                Ok("Take the 3:15 bus.".to_string())
            }
        })
        .await;

        assert_eq!(result.unwrap(), "Take the 3:15 bus.");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<String, _> = with_retry(&policy(2), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ChatServiceError::Request("quota exceeded".into()))
        })
        .await;

        assert!(matches!(result, Err(ChatServiceError::Request(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_setup_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<String, _> = with_retry(&policy(5), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ChatServiceError::Setup("Unsupported provider: foo".into()))
        })
        .await;

        assert!(matches!(result, Err(ChatServiceError::Setup(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out() {
        let result: Result<String, _> = with_retry(&policy(0), || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        })
        .await;

        assert!(matches!(result, Err(ChatServiceError::Timeout(_))));
    }

    #[test]
    fn test_backoff_doubles() {
        let p = RetryPolicy {
            timeout: Duration::from_secs(1),
            max_retries: 3,
            backoff: Duration::from_millis(500),
        };
        assert_eq!(p.delay_for(0), Duration::from_millis(500));
        assert_eq!(p.delay_for(1), Duration::from_millis(1000));
        assert_eq!(p.delay_for(2), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_rejected_requests_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<String, _> = with_retry(&policy(5), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ChatServiceError::Rejected("401 Unauthorized".into()))
        })
        .await;

        assert!(matches!(result, Err(ChatServiceError::Rejected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        assert!(create_completion_client("carrier-pigeon", "key").is_err());
    }

    #[test]
    fn test_cohere_is_not_routed_through_rig() {
        assert!(create_completion_client("cohere", "key").is_err());
    }

    #[test]
    fn test_chunk_maps_to_titled_document() {
        let doc = to_rig_document(&Chunk {
            title: "Page 2 Part 1".into(),
            snippet: "Stanley Plaza 3:15".into(),
        });
        assert_eq!(doc.id, "Page 2 Part 1");
        assert_eq!(doc.text, "Stanley Plaza 3:15");
    }
}
