//! Context assembler: similarity search plus the recency window.
//!
//! Retrieval is best-effort: any collaborator failure is logged and that
//! source contributes nothing. Assembly never fails a request.

use rada_config::ContextConfig;
use rada_core::memory::{
    ContextItem, ContextScope, ConversationLog, SearchScope, SimilarityBackend, SimilarityHit,
};
use rada_core::message::{ConversationId, Message};
use std::sync::Arc;
use tracing::{debug, warn};

/// Bounds applied to one assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLimits {
    /// Same-conversation items (K).
    pub same_conversation: usize,
    /// Cross-conversation items (M).
    pub cross_conversation: usize,
    /// User+assistant pairs in the recency window (N).
    pub recent_exchanges: usize,
    /// Character ceiling per cross-conversation snippet.
    pub cross_snippet_chars: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self::from(&ContextConfig::default())
    }
}

impl From<&ContextConfig> for ContextLimits {
    fn from(config: &ContextConfig) -> Self {
        Self {
            same_conversation: config.same_conversation_k,
            cross_conversation: config.cross_conversation_m,
            recent_exchanges: config.recent_exchanges_n,
            cross_snippet_chars: config.cross_snippet_chars,
        }
    }
}

/// The result of one assembly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledContext {
    pub same_conversation: Vec<ContextItem>,
    pub cross_conversation: Vec<ContextItem>,
    /// Oldest first. Fed to the provider as history, not rendered.
    pub recent_turns: Vec<Message>,
}

impl AssembledContext {
    /// The textual context block: same-conversation items, then
    /// cross-conversation items.
    pub fn render_text(&self) -> String {
        let same = self
            .same_conversation
            .iter()
            .map(|item| format!("Earlier in this conversation:\n{}", item.text));
        let cross = self
            .cross_conversation
            .iter()
            .map(|item| format!("Context from previous chat:\n{}", item.text));
        same.chain(cross).collect::<Vec<_>>().join("\n\n")
    }

    pub fn is_empty(&self) -> bool {
        self.same_conversation.is_empty()
            && self.cross_conversation.is_empty()
            && self.recent_turns.is_empty()
    }
}

/// Gathers context from the optional similarity backend and conversation log.
#[derive(Clone, Default)]
pub struct ContextAssembler {
    similarity: Option<Arc<dyn SimilarityBackend>>,
    log: Option<Arc<dyn ConversationLog>>,
}

impl ContextAssembler {
    pub fn new(
        similarity: Option<Arc<dyn SimilarityBackend>>,
        log: Option<Arc<dyn ConversationLog>>,
    ) -> Self {
        Self { similarity, log }
    }

    pub fn with_similarity(mut self, similarity: Arc<dyn SimilarityBackend>) -> Self {
        self.similarity = Some(similarity);
        self
    }

    pub fn with_log(mut self, log: Arc<dyn ConversationLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn conversation_log(&self) -> Option<&Arc<dyn ConversationLog>> {
        self.log.as_ref()
    }

    pub fn similarity(&self) -> Option<&Arc<dyn SimilarityBackend>> {
        self.similarity.as_ref()
    }

    /// Assemble context for `query` within `conversation_id`.
    pub async fn assemble(
        &self,
        query: &str,
        conversation_id: &ConversationId,
        limits: ContextLimits,
    ) -> AssembledContext {
        let (same_conversation, cross_conversation, recent_turns) = tokio::join!(
            self.same_conversation(query, conversation_id, limits.same_conversation),
            self.cross_conversation(query, conversation_id, limits),
            self.recent_turns(conversation_id, limits.recent_exchanges),
        );

        debug!(
            conversation = %conversation_id,
            same = same_conversation.len(),
            cross = cross_conversation.len(),
            recent = recent_turns.len(),
            "Context assembled"
        );

        AssembledContext {
            same_conversation,
            cross_conversation,
            recent_turns,
        }
    }

    async fn same_conversation(
        &self,
        query: &str,
        conversation_id: &ConversationId,
        k: usize,
    ) -> Vec<ContextItem> {
        let Some(similarity) = &self.similarity else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        match similarity.search(query, SearchScope::Only(conversation_id), k).await {
            Ok(hits) => rank(hits)
                .into_iter()
                .filter(|hit| &hit.source_id == conversation_id)
                .take(k)
                .map(|hit| to_item(hit, ContextScope::SameConversation, None))
                .collect(),
            Err(e) => {
                warn!(backend = similarity.name(), error = %e, "Same-conversation search failed");
                Vec::new()
            }
        }
    }

    async fn cross_conversation(
        &self,
        query: &str,
        conversation_id: &ConversationId,
        limits: ContextLimits,
    ) -> Vec<ContextItem> {
        let Some(similarity) = &self.similarity else {
            return Vec::new();
        };
        let m = limits.cross_conversation;
        if m == 0 {
            return Vec::new();
        }

        match similarity
            .search(query, SearchScope::Excluding(conversation_id), m)
            .await
        {
            Ok(hits) => rank(hits)
                .into_iter()
                .filter(|hit| &hit.source_id != conversation_id)
                .take(m)
                .map(|hit| {
                    to_item(
                        hit,
                        ContextScope::CrossConversation,
                        Some(limits.cross_snippet_chars),
                    )
                })
                .collect(),
            Err(e) => {
                warn!(backend = similarity.name(), error = %e, "Cross-conversation search failed");
                Vec::new()
            }
        }
    }

    async fn recent_turns(&self, conversation_id: &ConversationId, exchanges: usize) -> Vec<Message> {
        let Some(log) = &self.log else {
            return Vec::new();
        };
        if exchanges == 0 {
            return Vec::new();
        }

        match log.recent_turns(conversation_id, exchanges * 2).await {
            Ok(turns) => turns,
            Err(e) => {
                warn!(conversation = %conversation_id, error = %e, "Conversation log unavailable");
                Vec::new()
            }
        }
    }
}

/// Lower score first; equal scores prefer the newer snippet.
fn rank(mut hits: Vec<SimilarityHit>) -> Vec<SimilarityHit> {
    hits.sort_by(|a, b| {
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });
    hits
}

fn to_item(hit: SimilarityHit, scope: ContextScope, max_chars: Option<usize>) -> ContextItem {
    let text = match max_chars {
        Some(limit) if hit.text.chars().count() > limit => hit.text.chars().take(limit).collect(),
        _ => hit.text,
    };
    ContextItem {
        text,
        scope,
        score: hit.score,
        source_id: hit.source_id,
        timestamp: hit.timestamp,
    }
}
