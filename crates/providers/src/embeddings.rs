//! Embedding selection: an ordered chain of embedders built from the
//! configured backends whose credentials are present.

use async_trait::async_trait;
use rada_config::{AppConfig, BackendConfig, BackendKind, EnvCredentials};
use rada_core::error::{Error, ProviderError, Result};
use rada_core::provider::Embedder;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::gemini::GeminiBackend;
use crate::openai_compat::OpenAiCompatBackend;

/// Tries each embedder in order and returns the first success.
pub struct EmbedderChain {
    chain: Vec<Arc<dyn Embedder>>,
    timeout: Duration,
}

impl EmbedderChain {
    pub fn new(timeout: Duration) -> Self {
        Self {
            chain: Vec::new(),
            timeout,
        }
    }

    pub fn add(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.chain.push(embedder);
        self
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

#[async_trait]
impl Embedder for EmbedderChain {
    fn name(&self) -> &str {
        self.chain.first().map_or("none", |e| e.name())
    }

    async fn embed(&self, inputs: &[String]) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        let mut last_error = ProviderError::NotConfigured("No embedders configured".into());

        for embedder in &self.chain {
            match tokio::time::timeout(self.timeout, embedder.embed(inputs)).await {
                Ok(Ok(vectors)) => return Ok(vectors),
                Ok(Err(e)) => {
                    warn!(embedder = %embedder.name(), error = %e, "Embedding failed, trying next");
                    last_error = e;
                }
                Err(_) => {
                    warn!(
                        embedder = %embedder.name(),
                        timeout_secs = self.timeout.as_secs(),
                        "Embedding timed out, trying next"
                    );
                    last_error = ProviderError::Timeout(format!(
                        "{} embedding after {}s",
                        embedder.name(),
                        self.timeout.as_secs()
                    ));
                }
            }
        }
        Err(last_error)
    }
}

fn build_one(config: &BackendConfig, api_key: String) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.kind {
        BackendKind::Gemini => {
            let mut backend = match &config.api_url {
                Some(url) => GeminiBackend::with_base_url(url, api_key),
                None => GeminiBackend::new(api_key),
            }
            .map_err(|e| Error::provider("gemini", e))?;
            if let Some(model) = &config.embedding_model {
                backend = backend.with_embedding_model(model);
            }
            Arc::new(backend)
        }
        BackendKind::OpenaiCompat => {
            let mut backend = match &config.api_url {
                Some(url) => OpenAiCompatBackend::new("openai_compat", url, api_key),
                None => OpenAiCompatBackend::openai(api_key),
            }
            .map_err(|e| Error::provider("openai", e))?;
            if let Some(model) = &config.embedding_model {
                backend = backend.with_embedding_model(model);
            }
            Arc::new(backend)
        }
    };
    Ok(embedder)
}

/// Embedders for the configured backends, primary first.
///
/// A backend joins only if its credential is present. `None` means no
/// backend can embed and callers should fall back to term matching.
pub fn build_embedder(
    config: &AppConfig,
    credentials: &EnvCredentials,
) -> Result<Option<EmbedderChain>> {
    let mut chain = EmbedderChain::new(Duration::from_secs(config.request_timeout_secs));
    let backends = std::iter::once(&config.providers.primary).chain(&config.providers.secondary);

    for backend in backends {
        match credentials.resolve(&backend.credential_env) {
            Some(api_key) => chain = chain.add(build_one(backend, api_key)?),
            None => debug!(
                kind = ?backend.kind,
                credential = %backend.credential_env,
                "No credential, skipping embedder"
            ),
        }
    }
    Ok((!chain.is_empty()).then_some(chain))
}
