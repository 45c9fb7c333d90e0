//! Error types for the Rada domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Callers see exactly three kinds of failure (see [`ErrorKind`]); the
//! collaborator errors (`MemoryError`) never escape the orchestrator.

use thiserror::Error;

/// Machine-checkable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad caller input. Never retried.
    Validation,
    /// Missing or malformed archetype/application configuration.
    Configuration,
    /// Backend call failure or missing credentials.
    Provider,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validation => "ValidationError",
            Self::Configuration => "ConfigurationError",
            Self::Provider => "ProviderError",
        };
        f.write_str(s)
    }
}

/// The top-level error type returned to callers of the engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Provider '{provider}' failed: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, source: ProviderError) -> Self {
        Self::Provider {
            provider: provider.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Provider { .. } => ErrorKind::Provider,
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("No credentials available: neither {primary} nor {secondary} is set")]
    MissingCredentials { primary: String, secondary: String },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Unknown session handle: {0}")]
    SessionNotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Terminal conditions that no amount of retrying will fix.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::MissingCredentials { .. } | Self::AuthenticationFailed(_) | Self::NotConfigured(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::provider(
            "gemini",
            ProviderError::ApiError {
                status_code: 429,
                message: "Too many requests".into(),
            },
        );
        assert!(err.to_string().contains("gemini"));
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
        assert_eq!(err.kind(), ErrorKind::Provider);
    }

    #[test]
    fn missing_credentials_names_both() {
        let err = ProviderError::MissingCredentials {
            primary: "GOOGLE_API_KEY".into(),
            secondary: "OPENAI_API_KEY".into(),
        };
        let text = err.to_string();
        assert!(text.contains("GOOGLE_API_KEY"));
        assert!(text.contains("OPENAI_API_KEY"));
        assert!(err.is_terminal());
        assert!(!ProviderError::Network("reset".into()).is_terminal());
    }

    #[test]
    fn kinds_render_as_error_names() {
        assert_eq!(Error::validation("empty").kind().to_string(), "ValidationError");
        assert_eq!(
            Error::configuration("bad role").kind().to_string(),
            "ConfigurationError"
        );
    }
}
