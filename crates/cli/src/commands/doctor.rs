//! `rada doctor`: Diagnose configuration, archetypes and credentials.

use crate::runtime;
use rada_config::{AppConfig, BackendConfig, EnvCredentials};
use rada_core::provider::CredentialStore;
use std::path::Path;

pub fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    println!("Rada Doctor - System Diagnostics");
    println!("================================\n");

    let mut issues = 0;

    let config = match runtime::load_config(config_path) {
        Ok(config) => {
            println!("  ok    config valid");
            config
        }
        Err(e) => {
            println!("  FAIL  config invalid: {e:#}");
            println!("\n  1 issue found.");
            return Ok(());
        }
    };

    match runtime::load_registry(&config, config_path) {
        Ok(registry) => {
            println!("  ok    {} archetypes loaded", registry.len());
            for key in registry.keys() {
                if let Err(e) = registry.prompt_for(&key) {
                    println!("  FAIL  archetype '{key}': {e}");
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  FAIL  {e:#}");
            issues += 1;
        }
    }

    let credentials = EnvCredentials::new();
    issues += credential_issues(&config, &credentials);

    if !config.context.semantic_search {
        println!("  ok    context search: term matching (semantic search disabled)");
    } else if any_credential(&config, &credentials) {
        println!("  ok    context search: provider embeddings");
    } else {
        println!("  warn  context search: term matching (no embedding credential)");
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }
    Ok(())
}

fn any_credential(config: &AppConfig, credentials: &dyn CredentialStore) -> bool {
    std::iter::once(&config.providers.primary)
        .chain(&config.providers.secondary)
        .any(|backend| credentials.has(&backend.credential_env))
}

/// Report each configured backend's credential; an issue only when none is set.
fn credential_issues(config: &AppConfig, credentials: &dyn CredentialStore) -> usize {
    let backends: Vec<(&str, &BackendConfig)> =
        std::iter::once(("primary", &config.providers.primary))
            .chain(config.providers.secondary.as_ref().map(|b| ("secondary", b)))
            .collect();

    let mut usable = 0;
    for (slot, backend) in &backends {
        if credentials.has(&backend.credential_env) {
            println!("  ok    {slot} backend: {} is set", backend.credential_env);
            usable += 1;
        } else {
            println!("  warn  {slot} backend: {} is not set", backend.credential_env);
        }
    }

    if usable == 0 {
        println!("  FAIL  no backend credential available");
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secondary_credential_is_enough() {
        let config = AppConfig::default();
        let primary = config.providers.primary.credential_env.clone();
        let secondary = config
            .providers
            .secondary
            .as_ref()
            .map(|b| b.credential_env.clone())
            .unwrap();

        let only_secondary = EnvCredentials::new().without(&primary).with(&secondary, "sk-test");
        assert_eq!(credential_issues(&config, &only_secondary), 0);

        let none = EnvCredentials::new().without(&primary).without(&secondary);
        assert_eq!(credential_issues(&config, &none), 1);
    }
}
