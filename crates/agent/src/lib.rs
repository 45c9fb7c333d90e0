//! The conversation orchestration engine.
//!
//! Two entry points sit on top of the same pipeline:
//!
//! - [`Orchestrator::process`] runs one archetype on one message, with
//!   optional conversation context and the response cache for stateless
//!   requests.
//! - [`Orchestrator::run_conference`] runs a council of up to three
//!   archetypes through initial, discussion and consensus rounds.
//!
//! The pipeline is: composed system prompt ([`ArchetypeRegistry`]) →
//! context ([`ContextAssembler`]) → provider gateway, consulting the cache
//! only when no conversation state is involved.

pub mod context;
pub mod council;
pub mod orchestrator;
pub mod prompts;
pub mod registry;

#[cfg(test)]
mod test_helpers;

pub use context::{AssembledContext, ContextAssembler, ContextLimits};
pub use council::{ConferenceOutcome, MAX_PARTICIPANTS, RoundResults, pick_synthesizer};
pub use orchestrator::{AgentOutcome, MAX_TEXT_CHARS, Orchestrator, ProcessResponse};
pub use registry::ArchetypeRegistry;
