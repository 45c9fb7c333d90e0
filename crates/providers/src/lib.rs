//! LLM backends and the provider gateway for Rada.
//!
//! Backends implement either `rada_core::StatelessBackend` or
//! `rada_core::SessionCapableBackend`. The [`ProviderGateway`] selects one
//! by credential availability and dispatches on its capability.

pub mod embeddings;
pub mod gateway;
pub mod gemini;
pub mod normalize;
pub mod openai_compat;
pub mod sessions;

pub use embeddings::{EmbedderChain, build_embedder};
pub use gateway::{GenerationRequest, ProviderGateway, build_from_config};
pub use gemini::GeminiBackend;
pub use normalize::normalize_model;
pub use openai_compat::OpenAiCompatBackend;
pub use sessions::{EvictedSession, SessionTable};
