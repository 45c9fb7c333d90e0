//! Semantic similarity search over provider embeddings.
//!
//! Each indexed snippet is embedded once and kept with its vector. Queries
//! are embedded on arrival and ranked by cosine distance. With a store path
//! the vectors are also appended to a JSON-lines file so a restart does not
//! pay for re-embedding the history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rada_core::error::MemoryError;
use rada_core::memory::{SearchScope, SimilarityBackend, SimilarityHit};
use rada_core::message::{ConversationId, Message};
use rada_core::provider::Embedder;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::vector::cosine_similarity;

/// Texts sent to the embedder per request while backfilling.
const BACKFILL_BATCH: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmbeddedSnippet {
    conversation_id: ConversationId,
    text: String,
    timestamp: DateTime<Utc>,
    vector: Vec<f32>,
}

pub struct EmbeddingSimilarityIndex {
    embedder: Arc<dyn Embedder>,
    snippets: Arc<RwLock<VecDeque<EmbeddedSnippet>>>,
    capacity: usize,
    path: Option<PathBuf>,
}

impl EmbeddingSimilarityIndex {
    /// An index that lives only in memory.
    pub fn new(embedder: Arc<dyn Embedder>, capacity: usize) -> Self {
        Self {
            embedder,
            snippets: Arc::new(RwLock::new(VecDeque::new())),
            capacity: capacity.max(1),
            path: None,
        }
    }

    /// Open the vector store at `path`, keeping the newest `capacity` entries.
    /// A missing file starts empty; corrupted lines are skipped.
    pub fn open(path: PathBuf, embedder: Arc<dyn Embedder>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut snippets = Self::load_from_disk(&path);
        if snippets.len() > capacity {
            snippets.drain(..snippets.len() - capacity);
            if let Err(e) = Self::rewrite(&path, &snippets) {
                warn!(error = %e, "Failed to compact embedding store");
            }
        }
        debug!(
            path = %path.display(),
            count = snippets.len(),
            embedder = %embedder.name(),
            "Embedding store loaded"
        );
        Self {
            embedder,
            snippets: Arc::new(RwLock::new(snippets)),
            capacity,
            path: Some(path),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn len(&self) -> usize {
        self.snippets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snippets.read().await.is_empty()
    }

    /// Embed already-logged turns into an empty index, newest `capacity` only.
    ///
    /// Does nothing if the index already holds vectors.
    pub async fn backfill(&self, turns: &[(ConversationId, Message)]) -> Result<usize, MemoryError> {
        if !self.is_empty().await {
            return Ok(0);
        }
        let wanted: Vec<&(ConversationId, Message)> = turns
            .iter()
            .filter(|(_, m)| !m.content.trim().is_empty())
            .collect();
        let wanted = &wanted[wanted.len().saturating_sub(self.capacity)..];

        let mut added = 0;
        for batch in wanted.chunks(BACKFILL_BATCH) {
            let texts: Vec<String> = batch.iter().map(|(_, m)| m.content.clone()).collect();
            let vectors = self.embed(&texts).await?;
            let entries = batch
                .iter()
                .zip(vectors)
                .map(|((conversation_id, message), vector)| EmbeddedSnippet {
                    conversation_id: conversation_id.clone(),
                    text: message.content.clone(),
                    timestamp: message.timestamp,
                    vector,
                });
            for entry in entries {
                self.insert(entry).await?;
                added += 1;
            }
        }
        Ok(added)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemoryError> {
        let vectors = self.embedder.embed(texts).await.map_err(|e| {
            MemoryError::Unavailable(format!("{} embeddings: {e}", self.embedder.name()))
        })?;
        if vectors.len() != texts.len() {
            return Err(MemoryError::Unavailable(format!(
                "{} returned {} embeddings for {} inputs",
                self.embedder.name(),
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    async fn insert(&self, entry: EmbeddedSnippet) -> Result<(), MemoryError> {
        let mut snippets = self.snippets.write().await;
        if let Some(path) = &self.path {
            Self::append_line(path, &entry)?;
        }
        snippets.push_back(entry);
        while snippets.len() > self.capacity {
            snippets.pop_front();
        }
        Ok(())
    }

    fn load_from_disk(path: &Path) -> VecDeque<EmbeddedSnippet> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return VecDeque::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<EmbeddedSnippet>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted embedding line");
                    None
                }
            })
            .collect()
    }

    fn append_line(path: &Path, entry: &EmbeddedSnippet) -> Result<(), MemoryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create embedding directory: {e}"))
            })?;
        }
        let line = serde_json::to_string(entry)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize embedding: {e}")))?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| MemoryError::Storage(format!("Failed to open embedding store: {e}")))?;
        writeln!(file, "{line}")
            .map_err(|e| MemoryError::Storage(format!("Failed to write embedding store: {e}")))
    }

    fn rewrite(path: &Path, snippets: &VecDeque<EmbeddedSnippet>) -> Result<(), MemoryError> {
        let mut content = String::new();
        for entry in snippets {
            let line = serde_json::to_string(entry)
                .map_err(|e| MemoryError::Storage(format!("Failed to serialize embedding: {e}")))?;
            content.push_str(&line);
            content.push('\n');
        }
        std::fs::write(path, content)
            .map_err(|e| MemoryError::Storage(format!("Failed to rewrite embedding store: {e}")))
    }
}

#[async_trait]
impl SimilarityBackend for EmbeddingSimilarityIndex {
    fn name(&self) -> &str {
        "embeddings"
    }

    async fn search(
        &self,
        text: &str,
        scope: SearchScope<'_>,
        k: usize,
    ) -> Result<Vec<SimilarityHit>, MemoryError> {
        if k == 0 || text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let query = self
            .embed(&[text.to_string()])
            .await?
            .pop()
            .unwrap_or_default();
        let snippets = self.snippets.read().await;

        let mut hits: Vec<SimilarityHit> = snippets
            .iter()
            .filter(|s| scope.admits(&s.conversation_id))
            // Vectors from a different embedding model cannot be compared.
            .filter(|s| s.vector.len() == query.len())
            .filter_map(|s| {
                let similarity = cosine_similarity(&query, &s.vector);
                (similarity > 0.0).then(|| SimilarityHit {
                    text: s.text.clone(),
                    score: 1.0 - similarity,
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
        let vector = self
            .embed(&[text.to_string()])
            .await?
            .pop()
            .unwrap_or_default();
        self.insert(EmbeddedSnippet {
            conversation_id: conversation_id.clone(),
            text: text.to_string(),
            timestamp,
            vector,
        })
        .await
    }
}
