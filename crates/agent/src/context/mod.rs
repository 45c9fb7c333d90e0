//! Hybrid context retrieval.
//!
//! Three sources feed every contextual request:
//!
//! | Source | Backend | Bound |
//! |--------|---------|-------|
//! | Same conversation | Similarity search scoped to the conversation | K items |
//! | Other conversations | Unscoped similarity search, current one excluded | M items, truncated |
//! | Recent turns | Conversation log | last N exchanges |
//!
//! The first two render into a textual context block; the recent turns are
//! returned separately and travel as provider history.

pub mod assembler;

pub use assembler::{AssembledContext, ContextAssembler, ContextLimits};
