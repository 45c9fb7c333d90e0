//! Archetype registry: configured personas and their composed prompts.
//!
//! The composed system prompt is the base prompt followed by every
//! additional fragment, separated by a blank line, with empty parts
//! skipped. Prompts are composed once per load and cached; `reload`
//! swaps in a fresh registry only if the new configuration is valid.

use rada_config::{ArchetypeFile, load_archetypes};
use rada_core::archetype::{ArchetypeConfig, PromptFragment, PromptSource};
use rada_core::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{info, warn};

/// Resolves prompt file paths: prompts directory, then the archetype
/// file's directory, then the path as given.
#[derive(Debug, Clone, Default)]
struct PromptResolver {
    prompts_dir: Option<PathBuf>,
    base_dir: PathBuf,
}

impl PromptResolver {
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        let candidates = self
            .prompts_dir
            .iter()
            .map(|dir| dir.join(path))
            .chain(std::iter::once(self.base_dir.join(path)));
        for candidate in candidates {
            if candidate.is_file() {
                return candidate;
            }
        }
        path.to_path_buf()
    }

    fn read(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(self.resolve(path))
    }
}

struct RegistryState {
    source: Option<PathBuf>,
    resolver: PromptResolver,
    order: Vec<String>,
    archetypes: HashMap<String, ArchetypeConfig>,
    prompts: Mutex<HashMap<String, String>>,
}

impl RegistryState {
    fn new(
        source: Option<PathBuf>,
        resolver: PromptResolver,
        configs: Vec<ArchetypeConfig>,
    ) -> Self {
        let order = configs.iter().map(|c| c.key.clone()).collect();
        let archetypes = configs.into_iter().map(|c| (c.key.clone(), c)).collect();
        let state = Self {
            source,
            resolver,
            order,
            archetypes,
            prompts: Mutex::new(HashMap::new()),
        };
        state.warm();
        state
    }

    /// Compose every prompt up front so broken archetypes are reported at load.
    fn warm(&self) {
        let mut prompts = self.prompts.lock().unwrap_or_else(|e| e.into_inner());
        for key in &self.order {
            let Some(config) = self.archetypes.get(key) else {
                continue;
            };
            match compose(config, &self.resolver) {
                Ok(prompt) => {
                    prompts.insert(key.clone(), prompt);
                }
                Err(e) => warn!(archetype = %key, error = %e, "Archetype unusable"),
            }
        }
    }
}

/// Owns archetype configurations and their composed prompts.
pub struct ArchetypeRegistry {
    prompts_dir: Option<PathBuf>,
    state: RwLock<Arc<RegistryState>>,
}

impl ArchetypeRegistry {
    /// Load archetypes from a TOML file.
    pub fn load(path: &Path, prompts_dir: Option<PathBuf>) -> Result<Self> {
        let state = Self::read_state(path, prompts_dir.clone())?;
        Ok(Self {
            prompts_dir,
            state: RwLock::new(Arc::new(state)),
        })
    }

    /// Build a registry from already-validated configurations.
    pub fn from_configs(
        configs: Vec<ArchetypeConfig>,
        base_dir: impl Into<PathBuf>,
        prompts_dir: Option<PathBuf>,
    ) -> Self {
        let resolver = PromptResolver {
            prompts_dir: prompts_dir.clone(),
            base_dir: base_dir.into(),
        };
        Self {
            prompts_dir,
            state: RwLock::new(Arc::new(RegistryState::new(None, resolver, configs))),
        }
    }

    fn read_state(path: &Path, prompts_dir: Option<PathBuf>) -> Result<RegistryState> {
        let file: ArchetypeFile = load_archetypes(path)?;
        let resolver = PromptResolver {
            prompts_dir,
            base_dir: file.base_dir(),
        };
        let state = RegistryState::new(Some(file.path), resolver, file.archetypes);
        info!(
            path = %path.display(),
            archetypes = state.order.len(),
            "Archetype registry loaded"
        );
        Ok(state)
    }

    fn snapshot(&self) -> Arc<RegistryState> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Re-read the source file. On failure the current registry stays in place.
    pub fn reload(&self) -> Result<()> {
        let current = self.snapshot();
        let Some(source) = current.source.clone() else {
            return Err(Error::configuration(
                "registry was not loaded from a file and cannot be reloaded",
            ));
        };

        match Self::read_state(&source, self.prompts_dir.clone()) {
            Ok(state) => {
                *self.state.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(state);
                Ok(())
            }
            Err(e) => {
                warn!(path = %source.display(), error = %e, "Reload failed, keeping previous archetypes");
                Err(e)
            }
        }
    }

    /// Compose the full system prompt for `config`.
    pub fn compose_prompt(&self, config: &ArchetypeConfig) -> Result<String> {
        compose(config, &self.snapshot().resolver)
    }

    /// The cached composed prompt for a registered archetype.
    pub fn prompt_for(&self, key: &str) -> Result<String> {
        let state = self.snapshot();
        let config = state
            .archetypes
            .get(key)
            .ok_or_else(|| Error::validation(format!("Unknown archetype '{key}'")))?;

        let mut prompts = state.prompts.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prompt) = prompts.get(key) {
            return Ok(prompt.clone());
        }
        let prompt = compose(config, &state.resolver)?;
        prompts.insert(key.to_string(), prompt.clone());
        Ok(prompt)
    }

    pub fn get(&self, key: &str) -> Option<ArchetypeConfig> {
        self.snapshot().archetypes.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.snapshot().archetypes.contains_key(key)
    }

    /// Keys in configuration order.
    pub fn keys(&self) -> Vec<String> {
        self.snapshot().order.clone()
    }

    /// The first `n` keys in configuration order.
    pub fn first_keys(&self, n: usize) -> Vec<String> {
        self.snapshot().order.iter().take(n).cloned().collect()
    }

    /// All archetypes in configuration order.
    pub fn archetypes(&self) -> Vec<ArchetypeConfig> {
        let state = self.snapshot();
        state
            .order
            .iter()
            .filter_map(|k| state.archetypes.get(k).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn compose(config: &ArchetypeConfig, resolver: &PromptResolver) -> Result<String> {
    let base = match &config.prompt {
        PromptSource::Inline(text) => text.clone(),
        PromptSource::File(path) => resolver.read(path).map_err(|e| {
            Error::configuration(format!(
                "archetype '{}': cannot read prompt file {}: {e}",
                config.key,
                path.display()
            ))
        })?,
    };

    let mut parts = vec![base];
    for fragment in &config.additional_prompts {
        match fragment {
            PromptFragment::Inline(text) => parts.push(text.clone()),
            PromptFragment::File(path) => match resolver.read(path) {
                Ok(text) => parts.push(text),
                Err(e) => warn!(
                    archetype = %config.key,
                    file = %path.display(),
                    error = %e,
                    "Skipping unreadable prompt fragment"
                ),
            },
        }
    }

    let composed = parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    if composed.is_empty() {
        return Err(Error::configuration(format!(
            "archetype '{}': composed prompt is empty",
            config.key
        )));
    }
    Ok(composed)
}
