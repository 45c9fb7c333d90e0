//! `rada archetypes`: List configured archetypes.

use crate::runtime;
use std::path::Path;

pub fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = runtime::load_config(config_path)?;
    let registry = runtime::load_registry(&config, config_path)?;

    println!("Archetypes ({})", registry.len());
    println!("==============");
    for archetype in registry.archetypes() {
        let status = match registry.prompt_for(&archetype.key) {
            Ok(prompt) => format!("{} chars of prompt", prompt.chars().count()),
            Err(e) => format!("unusable: {e}"),
        };
        println!(
            "  {:<12} {:<28} {:<20} {:<18} {status}",
            archetype.key,
            archetype.label(),
            archetype.role.as_str(),
            archetype.model_name
        );
    }
    Ok(())
}
