//! Configuration loading, validation, and management for Rada.
//!
//! Loads application configuration from `~/.rada/config.toml` with
//! environment variable overrides, and archetype definitions from a separate
//! human-editable TOML document (see [`archetypes`]). Validates all settings
//! at startup.

pub mod archetypes;
pub mod credentials;

pub use archetypes::{ArchetypeFile, load_archetypes, parse_archetypes};
pub use credentials::EnvCredentials;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.rada/config.toml`. Credentials are referenced by
/// environment variable *name* only; values never live in this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the archetype definitions
    #[serde(default = "default_archetypes_path")]
    pub archetypes_path: PathBuf,

    /// Directory searched first for prompt files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts_dir: Option<PathBuf>,

    /// Directory for archived exchanges and conference records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_dir: Option<PathBuf>,

    /// Provider-level temperature used when an archetype leaves it unset
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Provider-level max tokens used when an archetype leaves it unset
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Caller-side timeout for a single provider call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub sessions: SessionConfig,
}

fn default_archetypes_path() -> PathBuf {
    PathBuf::from("archetypes.toml")
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_request_timeout() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

/// Which wire protocol a backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Google Gemini, session-capable
    Gemini,
    /// Any OpenAI-compatible chat completions endpoint, stateless
    OpenaiCompat,
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google_ai" => Ok(Self::Gemini),
            "openai_compat" | "openai" => Ok(Self::OpenaiCompat),
            other => Err(ConfigError::ValidationError(format!(
                "unknown backend kind '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,

    /// Name of the environment variable holding the API key
    pub credential_env: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Overrides the backend's built-in model list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,

    /// Overrides the backend's default embedding model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

impl BackendConfig {
    pub fn gemini() -> Self {
        Self {
            kind: BackendKind::Gemini,
            credential_env: "GOOGLE_API_KEY".into(),
            api_url: None,
            models: vec![],
            embedding_model: None,
        }
    }

    pub fn openai() -> Self {
        Self {
            kind: BackendKind::OpenaiCompat,
            credential_env: "OPENAI_API_KEY".into(),
            api_url: None,
            models: vec![],
            embedding_model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "BackendConfig::gemini")]
    pub primary: BackendConfig,

    #[serde(default = "default_secondary")]
    pub secondary: Option<BackendConfig>,
}

fn default_secondary() -> Option<BackendConfig> {
    Some(BackendConfig::openai())
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            primary: BackendConfig::gemini(),
            secondary: default_secondary(),
        }
    }
}

impl ProvidersConfig {
    /// Make `kind` the primary backend if the secondary speaks it.
    pub fn prefer(&mut self, kind: BackendKind) {
        if self.primary.kind == kind {
            return;
        }
        match self.secondary.take() {
            Some(secondary) if secondary.kind == kind => {
                let old_primary = std::mem::replace(&mut self.primary, secondary);
                self.secondary = Some(old_primary);
            }
            other => {
                self.secondary = other;
                tracing::warn!(?kind, "Preferred backend is not configured, keeping primary");
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

fn default_cache_ttl() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl(),
        }
    }
}

/// Bounds for hybrid context retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_same_k")]
    pub same_conversation_k: usize,

    #[serde(default = "default_cross_m")]
    pub cross_conversation_m: usize,

    /// User+assistant pairs kept in the sliding window
    #[serde(default = "default_recent_n")]
    pub recent_exchanges_n: usize,

    /// Character ceiling for each cross-conversation snippet
    #[serde(default = "default_snippet_chars")]
    pub cross_snippet_chars: usize,

    /// Rank snippets by provider embeddings when a credential allows it
    #[serde(default = "default_true")]
    pub semantic_search: bool,

    /// Snippets held by the similarity index before the oldest drop out
    #[serde(default = "default_index_capacity")]
    pub index_capacity: usize,
}

fn default_same_k() -> usize {
    3
}
fn default_cross_m() -> usize {
    2
}
fn default_recent_n() -> usize {
    5
}
fn default_snippet_chars() -> usize {
    500
}
fn default_index_capacity() -> usize {
    10_000
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            same_conversation_k: default_same_k(),
            cross_conversation_m: default_cross_m(),
            recent_exchanges_n: default_recent_n(),
            cross_snippet_chars: default_snippet_chars(),
            semantic_search: true,
            index_capacity: default_index_capacity(),
        }
    }
}

/// Bounds for the provider session table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_capacity")]
    pub capacity: usize,

    #[serde(default = "default_session_ttl")]
    pub idle_ttl_secs: u64,
}

fn default_session_capacity() -> usize {
    256
}
fn default_session_ttl() -> u64 {
    3600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: default_session_capacity(),
            idle_ttl_secs: default_session_ttl(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.rada/config.toml).
    ///
    /// Environment overrides:
    /// - `RADA_ARCHETYPES`: archetype file path
    /// - `RADA_PROVIDER`: preferred backend kind (`gemini` / `openai_compat`)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply `RADA_ARCHETYPES` and `RADA_PROVIDER` on top of a loaded file.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(
            std::env::var("RADA_ARCHETYPES").ok(),
            std::env::var("RADA_PROVIDER").ok(),
        )
    }

    /// Apply overrides, then validate the result again.
    pub fn apply_overrides(
        &mut self,
        archetypes_path: Option<String>,
        provider: Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(path) = archetypes_path {
            self.archetypes_path = PathBuf::from(path);
        }
        if let Some(kind) = provider {
            self.providers.prefer(kind.parse()?);
        }
        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".rada")
    }

    /// Archive directory, defaulting to `~/.rada/history`.
    pub fn archive_dir(&self) -> PathBuf {
        self.archive_dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("history"))
    }

    /// The archetype file to load. A relative path that does not exist in
    /// the working directory is looked up in the config directory.
    pub fn resolved_archetypes_path(&self) -> PathBuf {
        let path = &self.archetypes_path;
        if path.is_absolute() || path.exists() {
            return path.clone();
        }
        let in_config_dir = Self::config_dir().join(path);
        if in_config_dir.exists() {
            in_config_dir
        } else {
            path.clone()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.archetypes_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "archetypes_path must not be empty".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.default_max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "default_max_tokens must be > 0".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".into(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "cache.ttl_secs must be > 0".into(),
            ));
        }
        if self.sessions.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "sessions.capacity must be > 0".into(),
            ));
        }
        if self.context.index_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "context.index_capacity must be > 0".into(),
            ));
        }
        let primary = &self.providers.primary;
        if primary.credential_env.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "providers.primary.credential_env must not be empty".into(),
            ));
        }
        if let Some(secondary) = &self.providers.secondary {
            if secondary.credential_env.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "providers.secondary.credential_env must not be empty".into(),
                ));
            }
        }
        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            archetypes_path: default_archetypes_path(),
            prompts_dir: None,
            archive_dir: None,
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout(),
            providers: ProvidersConfig::default(),
            cache: CacheConfig::default(),
            context: ContextConfig::default(),
            sessions: SessionConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found at {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for rada_core::Error {
    fn from(err: ConfigError) -> Self {
        rada_core::Error::configuration(err.to_string())
    }
}
