//! # Rada Core
//!
//! Domain types, traits, and error definitions for the Rada conversation
//! orchestration engine. This crate performs no I/O: it defines the domain
//! model that all other crates implement against.
//!
//! Every external collaborator (LLM backend, similarity search, conversation
//! log, persistence, credentials) is a trait here, so the orchestrator can be
//! wired with real implementations or test fakes.

pub mod archetype;
pub mod conference;
pub mod error;
pub mod memory;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use archetype::{ArchetypeConfig, ArchetypeRole, GenerationParams, PromptFragment, PromptSource};
pub use conference::{ConferenceRecord, ExchangeRecord, ParticipantEntry, Persistence};
pub use error::{Error, ErrorKind, MemoryError, ProviderError, Result};
pub use memory::{
    ContextItem, ContextScope, ConversationLog, SearchScope, SimilarityBackend, SimilarityHit,
};
pub use message::{ConversationId, Message, Role};
pub use provider::{
    Backend, CompletionRequest, CredentialStore, Embedder, SessionCapableBackend, SessionHandle,
    SessionKey, SessionSeed, StatelessBackend,
};
