//! In-memory retrieval collaborators: useful for testing and single-process use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rada_core::error::MemoryError;
use rada_core::memory::{ConversationLog, SearchScope, SimilarityBackend, SimilarityHit};
use rada_core::message::{ConversationId, Message};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::vector::{term_distance, term_frequencies};

/// Snippets kept before the oldest are dropped.
pub const DEFAULT_INDEX_CAPACITY: usize = 10_000;

struct IndexedSnippet {
    conversation_id: ConversationId,
    text: String,
    timestamp: DateTime<Utc>,
    terms: HashMap<String, f32>,
}

/// Similarity search over term-frequency vectors.
///
/// Scores are cosine distances (lower is closer). Snippets sharing no term
/// with the query are never returned. Holds at most `capacity` snippets,
/// dropping the oldest-indexed first.
pub struct InMemorySimilarityIndex {
    snippets: Arc<RwLock<VecDeque<IndexedSnippet>>>,
    capacity: usize,
}

impl InMemorySimilarityIndex {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INDEX_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            snippets: Arc::new(RwLock::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    /// Build an index from already-logged turns.
    pub async fn from_turns(turns: &[(ConversationId, Message)], capacity: usize) -> Self {
        let index = Self::with_capacity(capacity);
        {
            let mut snippets = index.snippets.write().await;
            for (conversation_id, message) in turns {
                if message.content.trim().is_empty() {
                    continue;
                }
                snippets.push_back(IndexedSnippet {
                    conversation_id: conversation_id.clone(),
                    text: message.content.clone(),
                    timestamp: message.timestamp,
                    terms: term_frequencies(&message.content),
                });
                while snippets.len() > index.capacity {
                    snippets.pop_front();
                }
            }
        }
        index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn len(&self) -> usize {
        self.snippets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snippets.read().await.is_empty()
    }
}

impl Default for InMemorySimilarityIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimilarityBackend for InMemorySimilarityIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(
        &self,
        text: &str,
        scope: SearchScope<'_>,
        k: usize,
    ) -> Result<Vec<SimilarityHit>, MemoryError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query = term_frequencies(text);
        let snippets = self.snippets.read().await;

        let mut hits: Vec<SimilarityHit> = snippets
            .iter()
            .filter(|s| scope.admits(&s.conversation_id))
            .filter_map(|s| {
                let score = term_distance(&query, &s.terms);
                (score < 1.0).then(|| SimilarityHit {
                    text: s.text.clone(),
                    score,
                    source_id: s.conversation_id.clone(),
                    timestamp: s.timestamp,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn index(
        &self,
        conversation_id: &ConversationId,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), MemoryError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let mut snippets = self.snippets.write().await;
        snippets.push_back(IndexedSnippet {
            conversation_id: conversation_id.clone(),
            text: text.to_string(),
            timestamp,
            terms: term_frequencies(text),
        });
        while snippets.len() > self.capacity {
            snippets.pop_front();
        }
        Ok(())
    }
}

/// Conversation turns held in a map, oldest first per conversation.
pub struct InMemoryConversationLog {
    turns: Arc<RwLock<HashMap<ConversationId, Vec<Message>>>>,
}

impl InMemoryConversationLog {
    pub fn new() -> Self {
        Self {
            turns: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Total turns across all conversations.
    pub async fn count(&self) -> usize {
        self.turns.read().await.values().map(Vec::len).sum()
    }
}

impl Default for InMemoryConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationLog for InMemoryConversationLog {
    async fn recent_turns(
        &self,
        conversation_id: &ConversationId,
        n: usize,
    ) -> Result<Vec<Message>, MemoryError> {
        let turns = self.turns.read().await;
        Ok(turns
            .get(conversation_id)
            .map(|all| all[all.len().saturating_sub(n)..].to_vec())
            .unwrap_or_default())
    }

    async fn append(
        &self,
        conversation_id: &ConversationId,
        message: Message,
    ) -> Result<(), MemoryError> {
        self.turns
            .write()
            .await
            .entry(conversation_id.clone())
            .or_default()
            .push(message);
        Ok(())
    }
}
