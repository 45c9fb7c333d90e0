//! Durable records produced by the engine and the persistence collaborator
//! that stores them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;
use crate::message::ConversationId;

/// One participant's contribution to a council round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantEntry {
    pub archetype: String,
    pub text: String,
    /// True when `text` is an error message rather than a model answer.
    #[serde(default)]
    pub failed: bool,
}

/// The immutable record of one council invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConferenceRecord {
    pub id: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
    /// Participants in selection order (1 to 3).
    pub participants: Vec<String>,
    pub initial: Vec<ParticipantEntry>,
    pub discussion: Vec<ParticipantEntry>,
    pub synthesizer: String,
    pub consensus: String,
    pub created_at: DateTime<Utc>,
}

/// The record of one single-agent exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub id: String,
    pub archetype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
    pub user_text: String,
    /// System prompt plus the user turn as sent to the model.
    pub full_prompt: String,
    pub response: String,
    pub cached: bool,
    pub created_at: DateTime<Utc>,
}

/// Durable storage for engine records. Fire-and-forget from the engine's
/// point of view: errors are logged and never fail a response.
#[async_trait]
pub trait Persistence: Send + Sync {
    fn name(&self) -> &str;

    async fn persist_conference(&self, record: &ConferenceRecord) -> Result<(), MemoryError>;

    async fn persist_exchange(&self, record: &ExchangeRecord) -> Result<(), MemoryError>;
}
