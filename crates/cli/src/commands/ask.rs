//! `rada ask`: Single-message or interactive chat with one archetype.

use crate::runtime::{self, Runtime};
use clap::Args;
use rada_core::GenerationParams;
use rada_memory::CacheStore;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Per-request generation overrides.
#[derive(Debug, Clone, Default, Args)]
pub struct ParamArgs {
    /// Sampling temperature (0.0 to 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Maximum tokens in the answer
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Nucleus sampling (0.0 to 1.0)
    #[arg(long)]
    pub top_p: Option<f32>,

    /// Top-k sampling (1 to 100)
    #[arg(long)]
    pub top_k: Option<u32>,
}

impl ParamArgs {
    /// `None` when no override was given.
    pub fn to_params(&self) -> Option<GenerationParams> {
        let params = GenerationParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            top_k: self.top_k,
        };
        (params != GenerationParams::default()).then_some(params)
    }
}

pub async fn run(
    config_path: Option<&Path>,
    archetype: &str,
    message: Option<String>,
    conversation: Option<String>,
    params: ParamArgs,
) -> anyhow::Result<()> {
    let config = runtime::load_config(config_path)?;
    let runtime = runtime::build(&config, config_path).await?;
    let params = params.to_params();

    if let Some(message) = message {
        // Single message mode
        let response = runtime
            .orchestrator
            .process(&message, archetype, conversation.as_deref(), params)
            .await?;
        println!("{}", response.response);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  Rada - talking to '{archetype}'");
    println!(
        "  Conversation: {}",
        conversation.as_deref().unwrap_or("none (stateless, cached)")
    );
    println!("  Commands: /stats  /sweep  /reload  /exit");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            "/exit" | "/quit" => break,
            command if command.starts_with('/') => run_command(command, &runtime),
            text => match runtime
                .orchestrator
                .process(text, archetype, conversation.as_deref(), params)
                .await
            {
                Ok(response) => {
                    let tag = if response.cached { " (cached)" } else { "" };
                    println!();
                    for line in response.response.lines() {
                        println!("  {archetype}{tag} > {line}");
                    }
                    println!();
                }
                Err(e) => eprintln!("  [{}] {e}", e.kind()),
            },
        }
        prompt()?;
    }

    println!();
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    use std::io::Write;
    print!("  You > ");
    std::io::stdout().flush()
}

fn run_command(command: &str, runtime: &Runtime) {
    let ttl = runtime.orchestrator.cache_ttl();
    match (command, &runtime.cache) {
        ("/stats", Some(cache)) => {
            let stats = cache.stats();
            println!(
                "  cache: {} entries, {} hits, {} misses, hit rate {:.0}%, {} evictions",
                stats.size,
                stats.hits,
                stats.misses,
                stats.hit_rate * 100.0,
                stats.evictions
            );
        }
        ("/sweep", Some(cache)) => {
            println!("  swept {} expired entries", cache.sweep(ttl));
        }
        ("/stats" | "/sweep", None) => println!("  cache is disabled"),
        ("/reload", _) => match runtime.orchestrator.registry().reload() {
            Ok(()) => println!("  reloaded {} archetypes", runtime.orchestrator.registry().len()),
            Err(e) => eprintln!("  reload failed, keeping previous archetypes: {e}"),
        },
        (other, _) => println!("  unknown command {other}"),
    }
}
