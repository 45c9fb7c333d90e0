//! `rada council`: Run the RADA council on a question.

use crate::runtime;
use rada_agent::{ConferenceOutcome, RoundResults};
use serde_json::{Map, Value, json};
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    question: &str,
    participants: Vec<String>,
    conversation: Option<String>,
    as_json: bool,
) -> anyhow::Result<()> {
    let config = runtime::load_config(config_path)?;
    let runtime = runtime::build(&config, config_path).await?;

    let selection = (!participants.is_empty()).then_some(participants.as_slice());
    let outcome = runtime
        .orchestrator
        .run_conference(question, selection, conversation.as_deref())
        .await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&to_json(&outcome))?);
        return Ok(());
    }

    print_round("Initial round", &outcome.initial);
    print_round("Discussion", &outcome.discussion);
    println!("== Consensus ({}) ==", outcome.synthesizer);
    println!("{}", outcome.consensus_text());
    Ok(())
}

fn print_round(title: &str, round: &RoundResults) {
    println!("== {title} ==");
    for (key, outcome) in round.iter() {
        let marker = if outcome.is_failed() { " [failed]" } else { "" };
        println!("-- {key}{marker}");
        println!("{}", outcome.text());
        println!();
    }
}

fn round_json(round: &RoundResults) -> Value {
    let map: Map<String, Value> = round
        .iter()
        .map(|(key, outcome)| (key.to_string(), Value::String(outcome.text().to_string())))
        .collect();
    Value::Object(map)
}

fn to_json(outcome: &ConferenceOutcome) -> Value {
    json!({
        "id": outcome.record.id,
        "participants": outcome.participants,
        "initial": round_json(&outcome.initial),
        "discussion": round_json(&outcome.discussion),
        "synthesizer": outcome.synthesizer,
        "consensus": outcome.consensus_text(),
    })
}
