//! Single-agent pipeline.
//!
//! `process` runs one archetype on one user message:
//!
//! 1. **Validate** text, archetype key, conversation id and overrides
//! 2. **Compose** the archetype's system prompt (cached by the registry)
//! 3. **Assemble context** when a conversation id is given
//! 4. **Consult the cache** for stateless requests only
//! 5. **Generate** through the provider gateway
//! 6. **Record** the exchange and append the turns to the conversation log
//!
//! Recording is best-effort: a persistence failure never fails the response.

use crate::context::{ContextAssembler, ContextLimits};
use crate::registry::ArchetypeRegistry;
use chrono::Utc;
use rada_config::archetypes::is_valid_key;
use rada_core::archetype::{ArchetypeConfig, GenerationParams};
use rada_core::conference::{ExchangeRecord, Persistence};
use rada_core::error::{Error, ErrorKind, Result};
use rada_core::memory::{ConversationLog, SimilarityBackend};
use rada_core::message::{ConversationId, Message};
use rada_core::provider::SessionKey;
use rada_memory::{CacheStore, NoopPersistence, key_for};
use rada_providers::{GenerationRequest, ProviderGateway};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest accepted user message, in characters.
pub const MAX_TEXT_CHARS: usize = 10_000;

/// Longest accepted conversation id.
pub const MAX_CONVERSATION_ID_LEN: usize = 255;

/// The caller-facing result of `process`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub response: String,
    pub cached: bool,
}

/// One agent's result inside a batch flow. Failures are values here so a
/// council round can continue past a single agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    Response(String),
    Failed { kind: ErrorKind, message: String },
}

impl AgentOutcome {
    pub fn from_result(result: Result<String>) -> Self {
        match result {
            Ok(text) => Self::Response(text),
            Err(e) => Self::Failed {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }

    /// The response, or the raw error text for a failure.
    pub fn text(&self) -> &str {
        match self {
            Self::Response(text) => text,
            Self::Failed { message, .. } => message,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl std::fmt::Display for AgentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// What one pipeline run produced.
pub(crate) struct Generated {
    pub text: String,
    pub cached: bool,
    pub full_prompt: String,
}

/// Runs archetypes against the provider gateway with context, caching and
/// recording.
pub struct Orchestrator {
    registry: Arc<ArchetypeRegistry>,
    gateway: Arc<ProviderGateway>,
    cache: Option<Arc<dyn CacheStore>>,
    cache_ttl: Duration,
    assembler: ContextAssembler,
    limits: ContextLimits,
    persistence: Arc<dyn Persistence>,
}

impl Orchestrator {
    pub fn new(registry: Arc<ArchetypeRegistry>, gateway: Arc<ProviderGateway>) -> Self {
        Self {
            registry,
            gateway,
            cache: None,
            cache_ttl: Duration::from_secs(3600),
            assembler: ContextAssembler::default(),
            limits: ContextLimits::default(),
            persistence: Arc::new(NoopPersistence),
        }
    }

    /// Enable the response cache for stateless requests.
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    pub fn with_similarity(mut self, similarity: Arc<dyn SimilarityBackend>) -> Self {
        self.assembler = self.assembler.with_similarity(similarity);
        self
    }

    pub fn with_conversation_log(mut self, log: Arc<dyn ConversationLog>) -> Self {
        self.assembler = self.assembler.with_log(log);
        self
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn with_context_limits(mut self, limits: ContextLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn registry(&self) -> &Arc<ArchetypeRegistry> {
        &self.registry
    }

    pub fn gateway(&self) -> &Arc<ProviderGateway> {
        &self.gateway
    }

    pub fn cache(&self) -> Option<&Arc<dyn CacheStore>> {
        self.cache.as_ref()
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub(crate) fn persistence(&self) -> &Arc<dyn Persistence> {
        &self.persistence
    }

    /// Run `archetype_key` on `text`.
    pub async fn process(
        &self,
        text: &str,
        archetype_key: &str,
        conversation_id: Option<&str>,
        params: Option<GenerationParams>,
    ) -> Result<ProcessResponse> {
        let text = validate_text(text)?;
        let config = self.resolve_archetype(archetype_key)?;
        let conversation = parse_conversation_id(conversation_id)?;
        let overrides = params.unwrap_or_default();
        if let Err(problems) = overrides.validate() {
            return Err(Error::validation(problems.join("; ")));
        }

        info!(
            archetype = %config.key,
            conversation = conversation.as_ref().map(|c| c.as_str()).unwrap_or("-"),
            "Processing request"
        );

        let generated = self
            .run_pipeline(&config, text, conversation.as_ref(), overrides, true)
            .await?;

        self.record_exchange(&config, text, conversation.as_ref(), &generated)
            .await;

        Ok(ProcessResponse {
            response: generated.text,
            cached: generated.cached,
        })
    }

    /// Look up an archetype by key, rejecting malformed or unknown keys.
    pub(crate) fn resolve_archetype(&self, key: &str) -> Result<ArchetypeConfig> {
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::validation("Archetype must be specified"));
        }
        if !is_valid_key(key) {
            return Err(Error::validation(format!("Invalid archetype key '{key}'")));
        }
        self.registry
            .get(key)
            .ok_or_else(|| Error::validation(format!("Archetype '{key}' not found")))
    }

    /// Run one archetype and fold any failure into an [`AgentOutcome`].
    /// Council rounds go through here and never touch the cache.
    pub(crate) async fn run_agent(
        &self,
        config: &ArchetypeConfig,
        text: &str,
        conversation: Option<&ConversationId>,
    ) -> AgentOutcome {
        let result = self
            .run_pipeline(config, text, conversation, GenerationParams::default(), false)
            .await
            .map(|generated| generated.text);
        if let Err(e) = &result {
            warn!(archetype = %config.key, kind = %e.kind(), error = %e, "Agent failed");
        }
        AgentOutcome::from_result(result)
    }

    pub(crate) async fn run_pipeline(
        &self,
        config: &ArchetypeConfig,
        text: &str,
        conversation: Option<&ConversationId>,
        overrides: GenerationParams,
        cacheable: bool,
    ) -> Result<Generated> {
        if config.model_name.trim().is_empty() {
            return Err(Error::configuration(format!(
                "Model name not specified for archetype '{}'",
                config.key
            )));
        }
        let system_prompt = self.registry.prompt_for(&config.key)?;
        let params = overrides.or(config.params);

        let mut request = GenerationRequest::new(&config.model_name, system_prompt, text);
        request.params = params;

        if let Some(conversation) = conversation {
            let context = self
                .assembler
                .assemble(text, conversation, self.limits)
                .await;
            request.context_text = context.render_text();
            request.history = context.recent_turns;
            request.session_key = Some(SessionKey::new(
                conversation.clone(),
                &config.model_name,
                &request.system_prompt,
            ));
        }

        let full_prompt = format!("{}\n\n{}", request.system_prompt, request.user_turn());

        let cache = match &self.cache {
            Some(cache) if cacheable && !request.is_contextual() => Some(cache),
            _ => None,
        };
        let cache_key = cache.map(|_| {
            key_for(
                &full_prompt,
                &config.model_name,
                params.temperature,
                params.max_tokens,
                params.top_p,
                params.top_k,
            )
        });

        if let (Some(cache), Some(key)) = (cache, &cache_key) {
            if let Some(text) = cache.get(key, self.cache_ttl) {
                debug!(archetype = %config.key, "Serving cached response");
                return Ok(Generated {
                    text,
                    cached: true,
                    full_prompt,
                });
            }
        }

        let text = self.gateway.generate(request).await?;

        if let (Some(cache), Some(key)) = (cache, &cache_key) {
            cache.put(key, &text, self.cache_ttl);
        }

        Ok(Generated {
            text,
            cached: false,
            full_prompt,
        })
    }

    async fn record_exchange(
        &self,
        config: &ArchetypeConfig,
        text: &str,
        conversation: Option<&ConversationId>,
        generated: &Generated,
    ) {
        let record = ExchangeRecord {
            id: uuid::Uuid::new_v4().to_string(),
            archetype: config.key.clone(),
            conversation_id: conversation.cloned(),
            user_text: text.to_string(),
            full_prompt: generated.full_prompt.clone(),
            response: generated.text.clone(),
            cached: generated.cached,
            created_at: Utc::now(),
        };
        if let Err(e) = self.persistence.persist_exchange(&record).await {
            warn!(
                persistence = self.persistence.name(),
                error = %e,
                "Failed to persist exchange"
            );
        }

        if let Some(conversation) = conversation {
            self.remember_turns(conversation, text, &generated.text).await;
        }
    }

    /// Append a user/assistant pair to the conversation log and make both
    /// searchable.
    pub(crate) async fn remember_turns(
        &self,
        conversation: &ConversationId,
        user_text: &str,
        reply: &str,
    ) {
        let turns = [Message::user(user_text), Message::assistant(reply)];

        if let Some(log) = self.assembler.conversation_log() {
            for turn in &turns {
                if let Err(e) = log.append(conversation, turn.clone()).await {
                    warn!(conversation = %conversation, error = %e, "Failed to append turn");
                    break;
                }
            }
        }

        if let Some(similarity) = self.assembler.similarity() {
            for turn in &turns {
                if let Err(e) = similarity
                    .index(conversation, &turn.content, turn.timestamp)
                    .await
                {
                    warn!(backend = similarity.name(), error = %e, "Failed to index turn");
                    break;
                }
            }
        }
    }
}

/// Trimmed, non-empty, bounded user text.
pub(crate) fn validate_text(text: &str) -> Result<&str> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::validation("Text must not be empty"));
    }
    let chars = text.chars().count();
    if chars > MAX_TEXT_CHARS {
        return Err(Error::validation(format!(
            "Text is too long ({chars} characters, maximum {MAX_TEXT_CHARS})"
        )));
    }
    Ok(text)
}

pub(crate) fn parse_conversation_id(raw: Option<&str>) -> Result<Option<ConversationId>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let id = raw.trim();
    let valid = !id.is_empty()
        && id.len() <= MAX_CONVERSATION_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(Error::validation(format!("Invalid conversation id '{raw}'")));
    }
    Ok(Some(ConversationId::new(id)))
}
