//! `rada onboard`: First-time setup.

use rada_config::AppConfig;
use std::path::Path;

const SAMPLE_ARCHETYPES: &str = r#"# Archetypes: one table per key.
# role is one of critic, executor, creative_generator, other.

[sofiya]
name = "Sofiya"
description = "Creative generator"
role = "creative_generator"
model_name = "gemini-2.5-flash"
prompt = "You are Sofiya, a creative generator. Offer bold, original ideas."
temperature = 0.9

[lyra]
name = "Lyra"
description = "Critic"
role = "critic"
model_name = "gemini-2.5-flash"
prompt = "You are Lyra, a rigorous critic and materialist. Test every idea against reality."
temperature = 0.4

[maker]
name = "Maker"
description = "Technologist"
role = "executor"
model_name = "gemini-2.5-flash"
prompt = "You are Maker, a technologist. Turn ideas into practical plans."
"#;

pub fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    let config_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_dir);

    println!("Rada - First-Time Setup");
    println!("=======================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("  Created config directory: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("  Config already exists at: {}", config_path.display());
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("  Created {}", config_path.display());
    }

    let archetypes_path = config_dir.join("archetypes.toml");
    if archetypes_path.exists() {
        println!("  Archetypes already exist at: {}", archetypes_path.display());
    } else {
        std::fs::write(&archetypes_path, SAMPLE_ARCHETYPES)?;
        println!("  Created {}", archetypes_path.display());
    }

    println!("\nNext steps:");
    println!("  1. Export GOOGLE_API_KEY (or OPENAI_API_KEY for the fallback backend)");
    println!("  2. rada ask sofiya -m \"Write a haiku\"");
    println!("  3. rada council \"Should we ship v2?\"");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_archetypes_are_valid() {
        let archetypes = rada_config::parse_archetypes(SAMPLE_ARCHETYPES).unwrap();
        let keys: Vec<&str> = archetypes.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["sofiya", "lyra", "maker"]);
    }

    #[test]
    fn onboard_writes_both_files_once() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("rada").join("config.toml");

        run(Some(&config_path)).unwrap();
        assert!(config_path.exists());
        assert!(dir.path().join("rada").join("archetypes.toml").exists());

        std::fs::write(&config_path, "default_temperature = 0.3\n").unwrap();
        run(Some(&config_path)).unwrap();
        let kept = std::fs::read_to_string(&config_path).unwrap();
        assert_eq!(kept, "default_temperature = 0.3\n");

        let config = AppConfig::load_from(&config_path).unwrap();
        assert_eq!(config.default_temperature, 0.3);
    }
}
