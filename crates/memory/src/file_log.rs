//! File-backed conversation log: one JSON object per line.
//!
//! Turns are loaded into memory on creation and each new turn is appended
//! to the file, so the log is human-inspectable and survives restarts.
//!
//! Storage location: `~/.rada/history/conversations.jsonl` by default.

use async_trait::async_trait;
use rada_core::error::MemoryError;
use rada_core::memory::ConversationLog;
use rada_core::message::{ConversationId, Message};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggedTurn {
    conversation_id: ConversationId,
    #[serde(flatten)]
    message: Message,
}

pub struct JsonlConversationLog {
    path: PathBuf,
    turns: Arc<RwLock<Vec<LoggedTurn>>>,
}

impl JsonlConversationLog {
    /// Open the log at `path`. A missing file starts empty; corrupted lines are skipped.
    pub fn new(path: PathBuf) -> Self {
        let turns = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = turns.len(), "Conversation log loaded");
        Self {
            path,
            turns: Arc::new(RwLock::new(turns)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Vec<LoggedTurn> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<LoggedTurn>(line) {
                Ok(turn) => Some(turn),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted conversation log line");
                    None
                }
            })
            .collect()
    }

    /// Every logged turn with its conversation, in log order.
    pub async fn all_turns(&self) -> Vec<(ConversationId, Message)> {
        self.turns
            .read()
            .await
            .iter()
            .map(|t| (t.conversation_id.clone(), t.message.clone()))
            .collect()
    }

    fn append_line(&self, turn: &LoggedTurn) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create log directory: {e}"))
            })?;
        }

        let line = serde_json::to_string(turn)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize turn: {e}")))?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| MemoryError::Storage(format!("Failed to open conversation log: {e}")))?;
        writeln!(file, "{line}")
            .map_err(|e| MemoryError::Storage(format!("Failed to write conversation log: {e}")))
    }
}

#[async_trait]
impl ConversationLog for JsonlConversationLog {
    async fn recent_turns(
        &self,
        conversation_id: &ConversationId,
        n: usize,
    ) -> Result<Vec<Message>, MemoryError> {
        let turns = self.turns.read().await;
        let mut recent: Vec<Message> = turns
            .iter()
            .rev()
            .filter(|t| &t.conversation_id == conversation_id)
            .take(n)
            .map(|t| t.message.clone())
            .collect();
        recent.reverse();
        Ok(recent)
    }

    async fn append(
        &self,
        conversation_id: &ConversationId,
        message: Message,
    ) -> Result<(), MemoryError> {
        let turn = LoggedTurn {
            conversation_id: conversation_id.clone(),
            message,
        };
        let mut turns = self.turns.write().await;
        self.append_line(&turn)?;
        turns.push(turn);
        Ok(())
    }
}
