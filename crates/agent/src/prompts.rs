//! Council prompt templates.

use rada_core::archetype::{ArchetypeConfig, ArchetypeRole};

/// One participant's text as shown to the others.
#[derive(Debug, Clone, Copy)]
pub struct PeerText<'a> {
    pub label: &'a str,
    pub text: &'a str,
}

/// What a participant is asked to do with its peers' answers.
fn discussion_instruction(role: ArchetypeRole) -> &'static str {
    match role {
        ArchetypeRole::Critic => {
            "As the critic of this council, identify the strengths and weaknesses of these answers. Be specific."
        }
        ArchetypeRole::Executor => {
            "As the executor of this council, propose a concrete action plan that takes these answers into account."
        }
        ArchetypeRole::CreativeGenerator => {
            "As the creative generator of this council, synthesize a fresh idea that builds on your peers' input."
        }
        ArchetypeRole::Other => "Offer your own perspective on these answers.",
    }
}

/// Discussion-round prompt for `participant`, embedding the other
/// participants' initial answers.
pub fn discussion_prompt(
    participant: &ArchetypeConfig,
    question: &str,
    peers: &[PeerText<'_>],
) -> String {
    let mut prompt = format!("The council is discussing this question:\n{question}\n\n");

    if peers.is_empty() {
        prompt.push_str("No other council member has answered.\n\n");
    } else {
        prompt.push_str("Other council members answered:\n\n");
        for peer in peers {
            prompt.push_str(&format!("{}:\n{}\n\n", peer.label, peer.text.trim()));
        }
    }

    prompt.push_str(discussion_instruction(participant.role));
    prompt
}

/// A participant's contributions across both rounds.
#[derive(Debug, Clone, Copy)]
pub struct Contribution<'a> {
    pub label: &'a str,
    pub initial: &'a str,
    pub discussion: &'a str,
}

/// Consensus prompt embedding every participant's initial and discussion output.
pub fn consensus_prompt(question: &str, contributions: &[Contribution<'_>]) -> String {
    let mut prompt = format!(
        "Here is the record of the council's discussion of this question:\n{question}\n\n"
    );
    for c in contributions {
        prompt.push_str(&format!("{}, initial answer:\n{}\n\n", c.label, c.initial.trim()));
        prompt.push_str(&format!("{}, in discussion:\n{}\n\n", c.label, c.discussion.trim()));
    }
    prompt.push_str(
        "Formulate the shared answer of the whole council. Keep it brief and to the point.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(role: ArchetypeRole) -> ArchetypeConfig {
        ArchetypeConfig::inline("k", "Name", role, "m1", "p")
    }

    #[test]
    fn each_role_gets_its_own_instruction() {
        let peers = [PeerText {
            label: "Sofiya (creative_generator)",
            text: "Ship it with fireworks.",
        }];
        let critic = discussion_prompt(&member(ArchetypeRole::Critic), "Ship v2?", &peers);
        let executor = discussion_prompt(&member(ArchetypeRole::Executor), "Ship v2?", &peers);
        let creative =
            discussion_prompt(&member(ArchetypeRole::CreativeGenerator), "Ship v2?", &peers);
        let other = discussion_prompt(&member(ArchetypeRole::Other), "Ship v2?", &peers);

        assert!(critic.contains("strengths and weaknesses"));
        assert!(executor.contains("concrete action plan"));
        assert!(creative.contains("synthesize"));
        assert!(other.contains("your own perspective"));
        for prompt in [&critic, &executor, &creative, &other] {
            assert!(prompt.contains("Ship v2?"));
            assert!(prompt.contains("Sofiya (creative_generator):\nShip it with fireworks."));
        }
    }

    #[test]
    fn lone_participant_sees_no_peers() {
        let prompt = discussion_prompt(&member(ArchetypeRole::Critic), "Q", &[]);
        assert!(prompt.contains("No other council member has answered."));
    }

    #[test]
    fn consensus_embeds_both_rounds() {
        let prompt = consensus_prompt(
            "Should we ship v2?",
            &[
                Contribution {
                    label: "Lyra (critic)",
                    initial: "Risky.",
                    discussion: "Still risky.",
                },
                Contribution {
                    label: "Maker (executor)",
                    initial: "Plan it.",
                    discussion: "Week one: tests.",
                },
            ],
        );
        assert!(prompt.contains("Should we ship v2?"));
        assert!(prompt.contains("Lyra (critic), initial answer:\nRisky."));
        assert!(prompt.contains("Maker (executor), in discussion:\nWeek one: tests."));
    }
}
