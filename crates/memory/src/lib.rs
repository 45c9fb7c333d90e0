//! Storage-side collaborators for Rada.
//!
//! - [`cache`]: content-addressed, TTL-bounded response cache
//! - [`in_memory`]: term-vector similarity index and conversation log
//! - [`embedding_index`]: similarity index ranked by provider embeddings
//! - [`file_log`]: JSON-lines conversation log that survives restarts
//! - [`archive`]: one JSON file per exchange or conference record
//! - [`noop`]: collaborators that do nothing, for disabled features

pub mod archive;
pub mod cache;
pub mod embedding_index;
pub mod file_log;
pub mod in_memory;
pub mod noop;
pub mod vector;

pub use archive::JsonFileArchive;
pub use cache::{CacheStats, CacheStore, InMemoryResponseCache, key_for};
pub use embedding_index::EmbeddingSimilarityIndex;
pub use file_log::JsonlConversationLog;
pub use in_memory::{DEFAULT_INDEX_CAPACITY, InMemoryConversationLog, InMemorySimilarityIndex};
pub use noop::{NoopPersistence, NoopSimilarity};
pub use vector::{cosine_similarity, term_distance};
