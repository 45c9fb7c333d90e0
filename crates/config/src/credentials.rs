//! Environment-backed credential store.
//!
//! The rest of the system only ever asks *whether* a credential exists.
//! Secret values are handed out solely to backend constructors.

use rada_core::provider::CredentialStore;
use std::collections::HashMap;

/// Reads credentials from process environment, with optional fixed overrides
/// (used by tests and embedding applications).
#[derive(Default, Clone)]
pub struct EnvCredentials {
    overrides: HashMap<String, Option<String>>,
}

impl EnvCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin a credential to a value regardless of the environment.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), Some(value.into()));
        self
    }

    /// Treat a credential as absent regardless of the environment.
    pub fn without(mut self, name: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), None);
        self
    }

    /// The secret value, if present and non-empty.
    pub fn resolve(&self, name: &str) -> Option<String> {
        let value = match self.overrides.get(name) {
            Some(pinned) => pinned.clone(),
            None => std::env::var(name).ok(),
        };
        value.filter(|v| !v.trim().is_empty())
    }
}

impl CredentialStore for EnvCredentials {
    fn has(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}

impl std::fmt::Debug for EnvCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&String> = self.overrides.keys().collect();
        f.debug_struct("EnvCredentials")
            .field("overrides", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win() {
        let creds = EnvCredentials::new()
            .with("RADA_TEST_PRESENT", "sk-test")
            .without("PATH");
        assert!(creds.has("RADA_TEST_PRESENT"));
        assert!(!creds.has("PATH"));
    }

    #[test]
    fn blank_values_are_absent() {
        let creds = EnvCredentials::new().with("RADA_TEST_BLANK", "   ");
        assert!(!creds.has("RADA_TEST_BLANK"));
    }

    #[test]
    fn unset_variable_is_absent() {
        let creds = EnvCredentials::new();
        assert!(!creds.has("RADA_TEST_SURELY_NOT_SET_1234"));
    }

    #[test]
    fn debug_never_prints_values() {
        let creds = EnvCredentials::new().with("KEY", "super-secret");
        assert!(!format!("{creds:?}").contains("super-secret"));
    }
}
