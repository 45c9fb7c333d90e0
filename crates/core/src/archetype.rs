//! Archetype domain model: a named agent persona.
//!
//! An archetype owns its prompt sources, target model and generation
//! parameters. The composed system prompt is derived from these sources by
//! the registry and is never stored here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File extensions recognised as prompt files inside `additional_prompts`.
pub const PROMPT_FILE_EXTENSIONS: &[&str] = &["txt", "md"];

/// Role an archetype plays in a council.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchetypeRole {
    Critic,
    Executor,
    CreativeGenerator,
    Other,
}

impl ArchetypeRole {
    pub const ALL: [ArchetypeRole; 4] = [
        Self::Critic,
        Self::Executor,
        Self::CreativeGenerator,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critic => "critic",
            Self::Executor => "executor",
            Self::CreativeGenerator => "creative_generator",
            Self::Other => "other",
        }
    }

    /// Rank used to pick the consensus synthesizer. Lower wins; `None` means
    /// the role never outranks the first selected participant.
    pub fn consensus_rank(&self) -> Option<u8> {
        match self {
            Self::Critic => Some(0),
            Self::Executor => Some(1),
            Self::CreativeGenerator => Some(2),
            Self::Other => None,
        }
    }
}

impl std::fmt::Display for ArchetypeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArchetypeRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Self::ALL.iter().map(|r| r.as_str()).collect();
                format!("unknown role '{s}', expected one of: {}", allowed.join(", "))
            })
    }
}

/// Where the base prompt comes from. Exactly one source per archetype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptSource {
    Inline(String),
    File(PathBuf),
}

/// An additional prompt fragment appended after the base prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptFragment {
    Inline(String),
    File(PathBuf),
}

impl PromptFragment {
    /// Classify a raw config string: a recognised prompt-file extension makes
    /// it a file reference, anything else is verbatim text.
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();
        let is_file = std::path::Path::new(trimmed)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                PROMPT_FILE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });
        if is_file && !trimmed.contains('\n') {
            Self::File(PathBuf::from(trimmed))
        } else {
            Self::Inline(raw.to_string())
        }
    }
}

/// Generation parameters. `None` falls through to the next layer
/// (request override → archetype → provider default).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

impl GenerationParams {
    /// Fields set in `self` win; unset fields are taken from `fallback`.
    pub fn or(self, fallback: GenerationParams) -> Self {
        Self {
            temperature: self.temperature.or(fallback.temperature),
            max_tokens: self.max_tokens.or(fallback.max_tokens),
            top_p: self.top_p.or(fallback.top_p),
            top_k: self.top_k.or(fallback.top_k),
        }
    }

    /// Range-check every set field.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                problems.push(format!("temperature {t} must be between 0.0 and 2.0"));
            }
        }
        if let Some(m) = self.max_tokens {
            if !(1..=32_000).contains(&m) {
                problems.push(format!("max_tokens {m} must be between 1 and 32000"));
            }
        }
        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                problems.push(format!("top_p {p} must be between 0.0 and 1.0"));
            }
        }
        if let Some(k) = self.top_k {
            if !(1..=100).contains(&k) {
                problems.push(format!("top_k {k} must be between 1 and 100"));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

/// A validated archetype configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeConfig {
    /// Registry key (e.g. `sofiya`).
    pub key: String,
    /// Display name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub role: ArchetypeRole,
    /// Requested model; normalised per backend at dispatch time.
    pub model_name: String,
    pub prompt: PromptSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_prompts: Vec<PromptFragment>,
    #[serde(default)]
    pub params: GenerationParams,
}

impl ArchetypeConfig {
    /// Convenience constructor for an inline-prompt archetype.
    pub fn inline(
        key: impl Into<String>,
        name: impl Into<String>,
        role: ArchetypeRole,
        model_name: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: None,
            role,
            model_name: model_name.into(),
            prompt: PromptSource::Inline(prompt.into()),
            additional_prompts: Vec::new(),
            params: GenerationParams::default(),
        }
    }

    /// Label used when peers see this archetype's output.
    pub fn label(&self) -> String {
        match &self.description {
            Some(d) if !d.trim().is_empty() => format!("{} ({})", self.name, d.trim()),
            _ => format!("{} ({})", self.name, self.role),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_known_values() {
        assert_eq!("critic".parse::<ArchetypeRole>().unwrap(), ArchetypeRole::Critic);
        assert_eq!(
            "creative_generator".parse::<ArchetypeRole>().unwrap(),
            ArchetypeRole::CreativeGenerator
        );
        let err = "philosopher".parse::<ArchetypeRole>().unwrap_err();
        assert!(err.contains("philosopher"));
        assert!(err.contains("executor"));
    }

    #[test]
    fn fragment_classification() {
        assert_eq!(
            PromptFragment::classify("style.md"),
            PromptFragment::File(PathBuf::from("style.md"))
        );
        assert_eq!(
            PromptFragment::classify("rules/extra.TXT"),
            PromptFragment::File(PathBuf::from("rules/extra.TXT"))
        );
        assert_eq!(
            PromptFragment::classify("Answer briefly."),
            PromptFragment::Inline("Answer briefly.".into())
        );
    }

    #[test]
    fn params_layering() {
        let request = GenerationParams {
            temperature: Some(0.1),
            ..Default::default()
        };
        let archetype = GenerationParams {
            temperature: Some(0.9),
            max_tokens: Some(256),
            ..Default::default()
        };
        let merged = request.or(archetype);
        assert_eq!(merged.temperature, Some(0.1));
        assert_eq!(merged.max_tokens, Some(256));
        assert_eq!(merged.top_k, None);
    }

    #[test]
    fn params_validation_reports_every_problem() {
        let params = GenerationParams {
            temperature: Some(3.0),
            max_tokens: Some(0),
            top_p: Some(0.5),
            top_k: Some(500),
        };
        let problems = params.validate().unwrap_err();
        assert_eq!(problems.len(), 3);
    }

    #[test]
    fn consensus_rank_ordering() {
        assert!(ArchetypeRole::Critic.consensus_rank() < ArchetypeRole::Executor.consensus_rank());
        assert!(
            ArchetypeRole::Executor.consensus_rank()
                < ArchetypeRole::CreativeGenerator.consensus_rank()
        );
        assert_eq!(ArchetypeRole::Other.consensus_rank(), None);
    }
}
