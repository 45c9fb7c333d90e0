//! Wiring shared by the commands: config, registry, gateway and the
//! file-backed collaborators under the archive directory.

use anyhow::Context;
use rada_agent::{ArchetypeRegistry, ContextLimits, Orchestrator};
use rada_config::{AppConfig, EnvCredentials};
use rada_core::memory::SimilarityBackend;
use rada_core::message::{ConversationId, Message};
use rada_memory::{
    EmbeddingSimilarityIndex, InMemoryResponseCache, InMemorySimilarityIndex, JsonFileArchive,
    JsonlConversationLog,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Conversation log file inside the archive directory.
pub const CONVERSATION_LOG: &str = "conversations.jsonl";

/// Embedding vector store inside the archive directory.
pub const EMBEDDING_STORE: &str = "embeddings.jsonl";

/// Load the config from `path` (or the default location) with env overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let mut config = match path {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => return AppConfig::load().context("Failed to load config"),
    };
    config.apply_env_overrides()?;
    Ok(config)
}

/// The archetype file for `config`. Relative paths are tried next to an
/// explicit config file first.
pub fn archetypes_path(config: &AppConfig, config_path: Option<&Path>) -> PathBuf {
    if config.archetypes_path.is_relative() {
        if let Some(dir) = config_path.and_then(Path::parent) {
            let candidate = dir.join(&config.archetypes_path);
            if candidate.exists() {
                return candidate;
            }
        }
    }
    config.resolved_archetypes_path()
}

pub fn load_registry(
    config: &AppConfig,
    config_path: Option<&Path>,
) -> anyhow::Result<ArchetypeRegistry> {
    let path = archetypes_path(config, config_path);
    ArchetypeRegistry::load(&path, config.prompts_dir.clone())
        .with_context(|| format!("Failed to load archetypes from {}", path.display()))
}

pub struct Runtime {
    pub orchestrator: Orchestrator,
    pub cache: Option<Arc<InMemoryResponseCache>>,
}

/// Build the orchestrator described by `config`.
pub async fn build(config: &AppConfig, config_path: Option<&Path>) -> anyhow::Result<Runtime> {
    let registry = Arc::new(load_registry(config, config_path)?);
    let credentials = Arc::new(EnvCredentials::new());
    let gateway = Arc::new(rada_providers::build_from_config(config, credentials.clone())?);

    let archive_dir = config.archive_dir();
    let log = Arc::new(JsonlConversationLog::new(archive_dir.join(CONVERSATION_LOG)));
    let similarity = build_similarity(config, &credentials, &archive_dir, &log.all_turns().await)
        .await?;

    let mut orchestrator = Orchestrator::new(registry, gateway)
        .with_conversation_log(log)
        .with_similarity(similarity)
        .with_persistence(Arc::new(JsonFileArchive::new(archive_dir)))
        .with_context_limits(ContextLimits::from(&config.context));

    let cache = config.cache.enabled.then(|| Arc::new(InMemoryResponseCache::new()));
    if let Some(cache) = &cache {
        orchestrator =
            orchestrator.with_cache(cache.clone(), Duration::from_secs(config.cache.ttl_secs));
    }

    Ok(Runtime {
        orchestrator,
        cache,
    })
}

/// Embedding search when enabled and some backend can embed, otherwise
/// the term index rebuilt from the log.
async fn build_similarity(
    config: &AppConfig,
    credentials: &EnvCredentials,
    archive_dir: &Path,
    turns: &[(ConversationId, Message)],
) -> anyhow::Result<Arc<dyn SimilarityBackend>> {
    let capacity = config.context.index_capacity;
    let embedder = if config.context.semantic_search {
        rada_providers::build_embedder(config, credentials)?
    } else {
        None
    };

    if let Some(embedder) = embedder {
        let index = EmbeddingSimilarityIndex::open(
            archive_dir.join(EMBEDDING_STORE),
            Arc::new(embedder),
            capacity,
        );
        match index.backfill(turns).await {
            Ok(0) => {}
            Ok(added) => debug!(added, "Embedded existing conversation history"),
            Err(e) => warn!(error = %e, "Could not embed existing history"),
        }
        debug!(indexed = index.len().await, "Semantic search enabled");
        return Ok(Arc::new(index));
    }

    let index = InMemorySimilarityIndex::from_turns(turns, capacity).await;
    debug!(
        archive = %archive_dir.display(),
        indexed = index.len().await,
        "Term-match search enabled"
    );
    Ok(Arc::new(index))
}
