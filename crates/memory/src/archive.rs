//! JSON-file archive of exchanges and conference records.
//!
//! One pretty-printed file per record, named
//! `<timestamp>_<kind>_<key>.json` so a directory listing reads as a
//! chronological history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rada_core::conference::{ConferenceRecord, ExchangeRecord, Persistence};
use rada_core::error::MemoryError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct JsonFileArchive {
    dir: PathBuf,
}

impl JsonFileArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(created_at: DateTime<Utc>, kind: &str, key: &str) -> String {
        let key: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("{}_{kind}_{key}.json", created_at.format("%Y%m%d_%H%M%S_%3f"))
    }

    async fn write<T: Serialize + Sync>(
        &self,
        file_name: String,
        record: &T,
    ) -> Result<PathBuf, MemoryError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to create archive directory: {e}")))?;

        let body = serde_json::to_string_pretty(record)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize record: {e}")))?;

        let path = self.dir.join(file_name);
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to write {}: {e}", path.display())))?;
        debug!(path = %path.display(), "Archived record");
        Ok(path)
    }

    /// Archived files, oldest first.
    pub async fn list(&self) -> Result<Vec<PathBuf>, MemoryError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MemoryError::QueryFailed(e.to_string())),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MemoryError::QueryFailed(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl Persistence for JsonFileArchive {
    fn name(&self) -> &str {
        "json_file"
    }

    async fn persist_conference(&self, record: &ConferenceRecord) -> Result<(), MemoryError> {
        let key = record.id.get(..8).unwrap_or(&record.id);
        let name = Self::file_name(record.created_at, "conference", key);
        self.write(name, record).await.map(|_| ())
    }

    async fn persist_exchange(&self, record: &ExchangeRecord) -> Result<(), MemoryError> {
        let name = Self::file_name(record.created_at, "exchange", &record.archetype);
        self.write(name, record).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rada_core::conference::ParticipantEntry;

    fn exchange() -> ExchangeRecord {
        ExchangeRecord {
            id: "e1".into(),
            archetype: "sofiya".into(),
            conversation_id: None,
            user_text: "Write a haiku".into(),
            full_prompt: "You are a poet.\n\nWrite a haiku".into(),
            response: "An old pond".into(),
            cached: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn exchange_written_as_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let archive = JsonFileArchive::new(dir.path().join("history"));
        archive.persist_exchange(&exchange()).await.unwrap();

        let files = archive.list().await.unwrap();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("_exchange_sofiya.json"));

        let body = std::fs::read_to_string(&files[0]).unwrap();
        let parsed: ExchangeRecord = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.response, "An old pond");
        assert!(body.contains('\n'));
    }

    #[tokio::test]
    async fn conference_written_with_short_id() {
        let dir = tempfile::tempdir().unwrap();
        let archive = JsonFileArchive::new(dir.path());
        let record = ConferenceRecord {
            id: "0123456789abcdef".into(),
            question: "Should we ship v2?".into(),
            conversation_id: None,
            participants: vec!["lyra".into()],
            initial: vec![ParticipantEntry {
                archetype: "lyra".into(),
                text: "Maybe".into(),
                failed: false,
            }],
            discussion: vec![],
            synthesizer: "lyra".into(),
            consensus: "Ship after review".into(),
            created_at: Utc::now(),
        };
        archive.persist_conference(&record).await.unwrap();

        let files = archive.list().await.unwrap();
        let name = files[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("_conference_01234567.json"));
    }

    #[tokio::test]
    async fn missing_directory_lists_empty() {
        let archive = JsonFileArchive::new("/nonexistent/rada/history");
        assert!(archive.list().await.unwrap().is_empty());
    }

    #[test]
    fn file_name_sanitises_key() {
        let name = JsonFileArchive::file_name(Utc::now(), "exchange", "../evil key");
        assert!(name.ends_with("_exchange____evil_key.json"));
        assert!(!name.contains('/'));
    }
}
