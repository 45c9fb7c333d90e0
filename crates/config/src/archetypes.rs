//! Archetype definitions file.
//!
//! A TOML document with one table per archetype key:
//!
//! ```toml
//! [sofiya]
//! name = "Sofiya"
//! role = "creative_generator"
//! model_name = "gemini-2.5-flash"
//! prompt = "You are a poet."
//! additional_prompts = ["style.md", "Answer briefly."]
//! ```
//!
//! Parsing validates every entry and reports all problems at once. Table
//! order is preserved; it is the registry's order.

use rada_core::archetype::{
    ArchetypeConfig, ArchetypeRole, GenerationParams, PromptFragment, PromptSource,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Upper bound on archetypes per file.
pub const MAX_ARCHETYPES: usize = 10;

/// A parsed and validated archetype file.
#[derive(Debug, Clone)]
pub struct ArchetypeFile {
    /// Where the definitions were read from.
    pub path: PathBuf,
    /// Archetypes in file order.
    pub archetypes: Vec<ArchetypeConfig>,
}

impl ArchetypeFile {
    /// Directory relative prompt files are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RawArchetype {
    name: Option<String>,
    description: Option<String>,
    role: Option<String>,
    model_name: Option<String>,
    prompt: Option<String>,
    prompt_file: Option<String>,
    additional_prompts: Option<OneOrMany>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    top_p: Option<f32>,
    top_k: Option<u32>,
}

/// Read and validate an archetype file.
pub fn load_archetypes(path: &Path) -> Result<ArchetypeFile, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let archetypes = parse_archetypes(&content).map_err(|e| match e {
        ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    })?;
    tracing::info!(
        path = %path.display(),
        count = archetypes.len(),
        "Archetypes loaded"
    );
    Ok(ArchetypeFile {
        path: path.to_path_buf(),
        archetypes,
    })
}

/// Parse and validate archetype definitions from TOML text.
pub fn parse_archetypes(content: &str) -> Result<Vec<ArchetypeConfig>, ConfigError> {
    let table: toml::Table = toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: PathBuf::from("<inline>"),
        reason: e.to_string(),
    })?;

    let mut problems = Vec::new();
    if table.is_empty() {
        problems.push("at least one archetype must be defined".to_string());
    }
    if table.len() > MAX_ARCHETYPES {
        problems.push(format!(
            "too many archetypes ({}, maximum {MAX_ARCHETYPES})",
            table.len()
        ));
    }

    let mut archetypes = Vec::with_capacity(table.len());
    for (key, value) in table {
        if !is_valid_key(&key) {
            problems.push(format!(
                "archetype key '{key}' must contain only alphanumerics, '_' or '-'"
            ));
            continue;
        }
        let raw: RawArchetype = match value.try_into() {
            Ok(raw) => raw,
            Err(e) => {
                problems.push(format!("archetype '{key}': {e}"));
                continue;
            }
        };
        match validate_entry(&key, raw) {
            Ok(config) => archetypes.push(config),
            Err(mut entry_problems) => problems.append(&mut entry_problems),
        }
    }

    if problems.is_empty() {
        Ok(archetypes)
    } else {
        Err(ConfigError::ValidationError(problems.join("; ")))
    }
}

/// Keys, archetype names in requests and conversation ids share this alphabet.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn validate_entry(key: &str, raw: RawArchetype) -> Result<ArchetypeConfig, Vec<String>> {
    let mut problems = Vec::new();

    let name = non_empty(raw.name);
    if name.is_none() {
        problems.push(format!("archetype '{key}': missing required field 'name'"));
    }

    let model_name = non_empty(raw.model_name);
    if model_name.is_none() {
        problems.push(format!(
            "archetype '{key}': missing required field 'model_name'"
        ));
    }

    let role = match raw.role.as_deref().map(str::parse::<ArchetypeRole>) {
        Some(Ok(role)) => Some(role),
        Some(Err(e)) => {
            problems.push(format!("archetype '{key}': {e}"));
            None
        }
        None => {
            problems.push(format!("archetype '{key}': missing required field 'role'"));
            None
        }
    };

    let prompt = match (non_empty(raw.prompt), non_empty(raw.prompt_file)) {
        (Some(text), None) => Some(PromptSource::Inline(text)),
        (None, Some(file)) => Some(PromptSource::File(PathBuf::from(file.trim()))),
        (Some(_), Some(_)) => {
            problems.push(format!(
                "archetype '{key}': set either 'prompt' or 'prompt_file', not both"
            ));
            None
        }
        (None, None) => {
            problems.push(format!(
                "archetype '{key}': either 'prompt' or 'prompt_file' must be provided"
            ));
            None
        }
    };

    let additional_prompts = match raw.additional_prompts {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    }
    .into_iter()
    .filter(|s| !s.trim().is_empty())
    .map(|s| PromptFragment::classify(&s))
    .collect();

    let params = GenerationParams {
        temperature: raw.temperature,
        max_tokens: raw.max_tokens,
        top_p: raw.top_p,
        top_k: raw.top_k,
    };
    if let Err(param_problems) = params.validate() {
        problems.extend(
            param_problems
                .into_iter()
                .map(|p| format!("archetype '{key}': {p}")),
        );
    }

    match (name, model_name, role, prompt) {
        (Some(name), Some(model_name), Some(role), Some(prompt)) if problems.is_empty() => {
            Ok(ArchetypeConfig {
                key: key.to_string(),
                name,
                description: non_empty(raw.description),
                role,
                model_name,
                prompt,
                additional_prompts,
                params,
            })
        }
        _ => Err(problems),
    }
}
