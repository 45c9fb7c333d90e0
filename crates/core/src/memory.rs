//! Retrieval collaborators: similarity search and the conversation log.
//!
//! Both are external systems consumed through narrow traits. Retrieval is
//! best-effort: callers treat any `MemoryError` as "no context".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;
use crate::message::{ConversationId, Message};

/// Which search produced a context item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextScope {
    SameConversation,
    CrossConversation,
}

/// A retrieved snippet. Ephemeral, recomputed per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    pub text: String,
    pub scope: ContextScope,
    /// Distance to the query; lower is more relevant.
    pub score: f32,
    pub source_id: ConversationId,
    pub timestamp: DateTime<Utc>,
}

/// One raw hit returned by a similarity backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityHit {
    pub text: String,
    /// Distance to the query; lower is more relevant.
    pub score: f32,
    pub source_id: ConversationId,
    pub timestamp: DateTime<Utc>,
}

/// Which conversations a similarity search may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope<'a> {
    Everything,
    Only(&'a ConversationId),
    Excluding(&'a ConversationId),
}

impl SearchScope<'_> {
    pub fn admits(&self, conversation_id: &ConversationId) -> bool {
        match self {
            Self::Everything => true,
            Self::Only(id) => *id == conversation_id,
            Self::Excluding(id) => *id != conversation_id,
        }
    }
}

/// Vector-similarity search over past conversation content.
#[async_trait]
pub trait SimilarityBackend: Send + Sync {
    fn name(&self) -> &str;

    /// The `k` nearest snippets among the conversations `scope` admits.
    /// Filtering happens before the cut to `k`.
    async fn search(
        &self,
        text: &str,
        scope: SearchScope<'_>,
        k: usize,
    ) -> Result<Vec<SimilarityHit>, MemoryError>;

    /// Make a snippet searchable. Backends that are fed externally may ignore this.
    async fn index(
        &self,
        _conversation_id: &ConversationId,
        _text: &str,
        _timestamp: DateTime<Utc>,
    ) -> Result<(), MemoryError> {
        Ok(())
    }
}

/// Recency-ordered log of conversation turns.
#[async_trait]
pub trait ConversationLog: Send + Sync {
    /// The last `n` turns of a conversation, oldest first.
    async fn recent_turns(
        &self,
        conversation_id: &ConversationId,
        n: usize,
    ) -> Result<Vec<Message>, MemoryError>;

    async fn append(
        &self,
        conversation_id: &ConversationId,
        message: Message,
    ) -> Result<(), MemoryError>;
}
