//! One chat turn: credential gate, remote call, transcript update.

use super::llm_provider::{ChatRequest, ChatService, ChatServiceError};
use super::session::Session;
use crate::config::{LlmConfig, PromptTruncation};

/// Value shipped in sample secrets files; never a real key.
pub const PLACEHOLDER_API_KEY: &str = "PASTE YOUR API KEY HERE";

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("no API key configured")]
    MissingCredential,

    #[error(transparent)]
    Remote(#[from] ChatServiceError),
}

/// Per-deployment settings applied to every turn.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub preamble: String,
    pub prompt_truncation: PromptTruncation,
    pub configured_credential: Option<String>,
    pub history_window: Option<usize>,
}

impl TurnSettings {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            preamble: config.preamble.trim().to_string(),
            prompt_truncation: config.prompt_truncation,
            configured_credential: usable_credential(&config.api_key).map(str::to_string),
            history_window: config.history_window,
        }
    }
}

pub fn is_usable_credential(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && key != PLACEHOLDER_API_KEY
}

fn usable_credential(key: &str) -> Option<&str> {
    is_usable_credential(key).then(|| key.trim())
}

/// Resolve the key for this session: an interactively supplied one wins
/// over the configured one.
pub fn resolve_credential<'a>(session: &'a Session, settings: &'a TurnSettings) -> Option<&'a str> {
    session
        .credential
        .as_deref()
        .and_then(usable_credential)
        .or(settings.configured_credential.as_deref())
}

/// Answer `prompt` within `session`.
///
/// The caller holds the session lock for the whole call, so turns of one
/// session never interleave. Without a usable credential nothing is sent
/// and the transcript is untouched. On success the prompt and the reply are
/// appended together; on a remote failure nothing is appended.
pub async fn take_turn(
    session: &mut Session,
    prompt: &str,
    settings: &TurnSettings,
    chat: &dyn ChatService,
) -> Result<String, TurnError> {
    let credential = resolve_credential(session, settings)
        .ok_or(TurnError::MissingCredential)?
        .to_string();

    let messages = session.transcript.messages();
    let history_start = settings
        .history_window
        .map(|window| messages.len().saturating_sub(window))
        .unwrap_or(0);

    let request = ChatRequest {
        credential,
        history: messages[history_start..].to_vec(),
        message: prompt.to_string(),
        documents: session.chunks.clone(),
        preamble: settings.preamble.clone(),
        prompt_truncation: settings.prompt_truncation,
    };

    let reply = match chat.chat(&request).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!("Session {}: turn failed: {e}", session.id);
            return Err(e.into());
        }
    };

    session.transcript.push_turn(prompt, &reply);
    tracing::info!(
        "Session {}: turn complete ({} messages, location '{}')",
        session.id,
        session.transcript.len(),
        session.location
    );

    Ok(reply)
}
