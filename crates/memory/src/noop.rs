//! No-op collaborators: disable retrieval or archiving entirely.

use async_trait::async_trait;
use rada_core::conference::{ConferenceRecord, ExchangeRecord, Persistence};
use rada_core::error::MemoryError;
use rada_core::memory::{SearchScope, SimilarityBackend, SimilarityHit};

/// A similarity backend that never finds anything.
pub struct NoopSimilarity;

#[async_trait]
impl SimilarityBackend for NoopSimilarity {
    fn name(&self) -> &str {
        "none"
    }

    async fn search(
        &self,
        _text: &str,
        _scope: SearchScope<'_>,
        _k: usize,
    ) -> Result<Vec<SimilarityHit>, MemoryError> {
        Ok(Vec::new())
    }
}

/// A persistence collaborator that discards every record.
pub struct NoopPersistence;

#[async_trait]
impl Persistence for NoopPersistence {
    fn name(&self) -> &str {
        "none"
    }

    async fn persist_conference(&self, _record: &ConferenceRecord) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn persist_exchange(&self, _record: &ExchangeRecord) -> Result<(), MemoryError> {
        Ok(())
    }
}
