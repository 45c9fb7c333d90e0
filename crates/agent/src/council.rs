//! Conference orchestrator: the RADA council protocol.
//!
//! Up to three archetypes answer one question in three rounds:
//!
//! 1. **Initial**: every participant answers the raw question, concurrently
//! 2. **Discussion**: every participant reacts to the others' initial
//!    answers with a role-specific instruction, concurrently
//! 3. **Consensus**: the highest-priority participant (critic, then
//!    executor, then creative generator, else the first selected) writes
//!    the council's shared answer
//!
//! A participant that fails in one round does not stop the conference; its
//! error text is carried into later rounds in place of an answer. Council
//! calls never read or write the response cache.

use crate::orchestrator::{AgentOutcome, Orchestrator, parse_conversation_id, validate_text};
use crate::prompts::{Contribution, PeerText, consensus_prompt, discussion_prompt};
use chrono::Utc;
use futures::future::join_all;
use rada_core::archetype::ArchetypeConfig;
use rada_core::conference::{ConferenceRecord, ParticipantEntry};
use rada_core::error::{Error, Result};
use tracing::{debug, info, warn};

/// Largest council size; larger selections are truncated.
pub const MAX_PARTICIPANTS: usize = 3;

/// Per-participant results of one round, in selection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundResults(Vec<(String, AgentOutcome)>);

impl RoundResults {
    pub fn get(&self, key: &str) -> Option<&AgentOutcome> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, o)| o)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AgentOutcome)> {
        self.0.iter().map(|(k, o)| (k.as_str(), o))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn entries(&self) -> Vec<ParticipantEntry> {
        self.0
            .iter()
            .map(|(key, outcome)| ParticipantEntry {
                archetype: key.clone(),
                text: outcome.text().to_string(),
                failed: outcome.is_failed(),
            })
            .collect()
    }
}

/// Everything a council run produced.
#[derive(Debug, Clone)]
pub struct ConferenceOutcome {
    pub participants: Vec<String>,
    pub initial: RoundResults,
    pub discussion: RoundResults,
    pub consensus: AgentOutcome,
    /// Key of the participant that wrote the consensus.
    pub synthesizer: String,
    pub record: ConferenceRecord,
}

impl ConferenceOutcome {
    pub fn consensus_text(&self) -> &str {
        self.consensus.text()
    }
}

/// Index of the consensus writer: lowest role rank, ties and unranked
/// roles resolved by selection order.
pub fn pick_synthesizer(participants: &[ArchetypeConfig]) -> usize {
    participants
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.role.consensus_rank().map(|rank| (rank, i)))
        .min()
        .map(|(_, i)| i)
        .unwrap_or(0)
}

impl Orchestrator {
    /// Run a council on `text`.
    ///
    /// `participants = None` selects the first (up to three) configured
    /// archetypes. An explicit empty selection is rejected; duplicates are
    /// collapsed and anything past the third participant is dropped.
    pub async fn run_conference(
        &self,
        text: &str,
        participants: Option<&[String]>,
        conversation_id: Option<&str>,
    ) -> Result<ConferenceOutcome> {
        let question = validate_text(text)?;
        let conversation = parse_conversation_id(conversation_id)?;
        let members = self.select_participants(participants)?;
        let keys: Vec<String> = members.iter().map(|m| m.key.clone()).collect();

        info!(participants = ?keys, "Council convened");

        // Initial round
        let initial = join_all(
            members
                .iter()
                .map(|m| self.run_agent(m, question, conversation.as_ref())),
        )
        .await;
        let initial = RoundResults(keys.iter().cloned().zip(initial).collect());
        debug!(
            failed = initial.iter().filter(|(_, o)| o.is_failed()).count(),
            "Initial round done"
        );

        // Discussion round
        let labels: Vec<String> = members.iter().map(|m| m.label()).collect();
        let discussion_prompts: Vec<String> = members
            .iter()
            .enumerate()
            .map(|(i, member)| {
                let peers: Vec<PeerText<'_>> = initial
                    .0
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(j, (_, outcome))| PeerText {
                        label: &labels[j],
                        text: outcome.text(),
                    })
                    .collect();
                discussion_prompt(member, question, &peers)
            })
            .collect();
        let discussion = join_all(
            members
                .iter()
                .zip(&discussion_prompts)
                .map(|(m, prompt)| self.run_agent(m, prompt, conversation.as_ref())),
        )
        .await;
        let discussion = RoundResults(keys.iter().cloned().zip(discussion).collect());
        debug!(
            failed = discussion.iter().filter(|(_, o)| o.is_failed()).count(),
            "Discussion round done"
        );

        // Consensus
        let synthesizer = &members[pick_synthesizer(&members)];
        let contributions: Vec<Contribution<'_>> = labels
            .iter()
            .zip(initial.0.iter().zip(&discussion.0))
            .map(|(label, ((_, first), (_, second)))| Contribution {
                label,
                initial: first.text(),
                discussion: second.text(),
            })
            .collect();
        let prompt = consensus_prompt(question, &contributions);
        let consensus = self
            .run_agent(synthesizer, &prompt, conversation.as_ref())
            .await;

        info!(
            synthesizer = %synthesizer.key,
            failed = consensus.is_failed(),
            "Council reached consensus"
        );

        let record = ConferenceRecord {
            id: uuid::Uuid::new_v4().to_string(),
            question: question.to_string(),
            conversation_id: conversation.clone(),
            participants: keys.clone(),
            initial: initial.entries(),
            discussion: discussion.entries(),
            synthesizer: synthesizer.key.clone(),
            consensus: consensus.text().to_string(),
            created_at: Utc::now(),
        };

        let persistence = self.persistence();
        if let Err(e) = persistence.persist_conference(&record).await {
            warn!(persistence = persistence.name(), error = %e, "Failed to persist conference");
        }

        if let (Some(conversation), AgentOutcome::Response(answer)) = (&conversation, &consensus) {
            self.remember_turns(conversation, question, answer).await;
        }

        Ok(ConferenceOutcome {
            participants: keys,
            initial,
            discussion,
            synthesizer: synthesizer.key.clone(),
            consensus,
            record,
        })
    }

    fn select_participants(&self, requested: Option<&[String]>) -> Result<Vec<ArchetypeConfig>> {
        let keys = match requested {
            None => {
                let keys = self.registry().first_keys(MAX_PARTICIPANTS);
                if keys.is_empty() {
                    return Err(Error::validation("No archetypes are configured"));
                }
                keys
            }
            Some([]) => {
                return Err(Error::validation(
                    "A council needs at least one participant",
                ));
            }
            Some(requested) => {
                let mut keys: Vec<String> = Vec::new();
                for key in requested {
                    let key = key.trim();
                    if !keys.iter().any(|k| k == key) {
                        keys.push(key.to_string());
                    }
                }
                if keys.len() > MAX_PARTICIPANTS {
                    debug!(
                        requested = keys.len(),
                        kept = MAX_PARTICIPANTS,
                        "Truncating council participants"
                    );
                    keys.truncate(MAX_PARTICIPANTS);
                }
                keys
            }
        };

        keys.iter().map(|key| self.resolve_archetype(key)).collect()
    }
}
