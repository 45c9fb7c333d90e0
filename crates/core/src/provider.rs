//! Provider capability traits: the abstraction over LLM backends.
//!
//! Backends come in two flavours:
//!
//! - [`StatelessBackend`]: every call carries the full prompt.
//! - [`SessionCapableBackend`]: a session is opened once (seeded with the
//!   system prompt and prior history) and later turns send only the new
//!   message; the backend retains earlier turns.
//!
//! [`Backend`] is the closed union the gateway dispatches on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::archetype::GenerationParams;
use crate::error::ProviderError;
use crate::message::{ConversationId, Message};

/// A single-shot completion request for a stateless backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Backend-specific model name (already normalised).
    pub model: String,
    pub system_prompt: String,
    /// Prior turns, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Message>,
    /// The new user turn, context block already prepended.
    pub user_message: String,
    #[serde(default)]
    pub params: GenerationParams,
}

/// Everything needed to open a provider-side session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSeed {
    pub model: String,
    pub system_prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Message>,
    #[serde(default)]
    pub params: GenerationParams,
}

/// Opaque provider-side session handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle(pub String);

impl std::fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a conversation session: (conversation, model, prompt fingerprint).
///
/// Editing an archetype's prompt changes the fingerprint, so the same
/// conversation gets a fresh session instead of stale history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub conversation_id: ConversationId,
    pub model_id: String,
    pub prompt_fingerprint: String,
}

impl SessionKey {
    pub fn new(conversation_id: ConversationId, model_id: impl Into<String>, system_prompt: &str) -> Self {
        Self {
            conversation_id,
            model_id: model_id.into(),
            prompt_fingerprint: prompt_fingerprint(system_prompt),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.conversation_id, self.model_id, self.prompt_fingerprint
        )
    }
}

/// Short SHA-256 fingerprint of a system prompt.
pub fn prompt_fingerprint(system_prompt: &str) -> String {
    let digest = Sha256::digest(system_prompt.as_bytes());
    hex::encode(&digest[..8])
}

/// A backend that answers one fully-specified prompt per call.
#[async_trait]
pub trait StatelessBackend: Send + Sync {
    /// A human-readable name (e.g. "openai").
    fn name(&self) -> &str;

    /// Model names this backend recognises, preferred first.
    fn supported_models(&self) -> Vec<String>;

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError>;
}

/// A backend that keeps conversation state on its side.
#[async_trait]
pub trait SessionCapableBackend: Send + Sync {
    fn name(&self) -> &str;

    fn supported_models(&self) -> Vec<String>;

    /// Open a session seeded with the system prompt and prior history.
    async fn open_session(&self, seed: SessionSeed) -> Result<SessionHandle, ProviderError>;

    /// Send one user turn in an existing session.
    async fn send(
        &self,
        session: &SessionHandle,
        message: &str,
        params: GenerationParams,
    ) -> Result<String, ProviderError>;

    /// Release a session. Default is a no-op.
    async fn close_session(&self, _session: &SessionHandle) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// The capability a configured backend exposes.
#[derive(Clone)]
pub enum Backend {
    Stateless(Arc<dyn StatelessBackend>),
    SessionCapable(Arc<dyn SessionCapableBackend>),
}

impl Backend {
    pub fn name(&self) -> &str {
        match self {
            Self::Stateless(b) => b.name(),
            Self::SessionCapable(b) => b.name(),
        }
    }

    pub fn supported_models(&self) -> Vec<String> {
        match self {
            Self::Stateless(b) => b.supported_models(),
            Self::SessionCapable(b) => b.supported_models(),
        }
    }

    pub fn supports_sessions(&self) -> bool {
        matches!(self, Self::SessionCapable(_))
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stateless(b) => write!(f, "Stateless({})", b.name()),
            Self::SessionCapable(b) => write!(f, "SessionCapable({})", b.name()),
        }
    }
}

/// Turns text into dense vectors for semantic search.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    /// One vector per input, in input order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}

/// Answers whether a credential is present. Never hands out secret values.
pub trait CredentialStore: Send + Sync {
    fn has(&self, name: &str) -> bool;
}
