//! End-to-end scenarios for the single-agent pipeline and the council,
//! wired with in-process fakes for every external collaborator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rada_agent::{AgentOutcome, ArchetypeRegistry, Orchestrator};
use rada_core::archetype::{ArchetypeConfig, ArchetypeRole};
use rada_core::error::{ErrorKind, MemoryError, ProviderError};
use rada_core::memory::{SearchScope, SimilarityBackend, SimilarityHit};
use rada_core::message::ConversationId;
use rada_core::provider::{
    Backend, CompletionRequest, CredentialStore, SessionCapableBackend, SessionHandle,
    SessionSeed, StatelessBackend,
};
use rada_core::GenerationParams;
use rada_memory::{
    CacheStats, CacheStore, InMemoryConversationLog, InMemoryResponseCache, JsonFileArchive,
    JsonlConversationLog,
};
use rada_providers::ProviderGateway;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Fakes ─────────────────────────────────────────────────────────────────

struct AllCredentials;

impl CredentialStore for AllCredentials {
    fn has(&self, _name: &str) -> bool {
        true
    }
}

/// Stateless backend that records every request and answers via [`answer_for`].
#[derive(Default)]
struct RecordingBackend {
    requests: Mutex<Vec<CompletionRequest>>,
}

impl RecordingBackend {
    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatelessBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn supported_models(&self) -> Vec<String> {
        vec!["m1".into()]
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let answer = answer_for(&request.system_prompt, &request.user_message);
        self.requests.lock().unwrap().push(request);
        Ok(answer)
    }
}

/// Council answers are recognisable per participant and round.
fn answer_for(system_prompt: &str, user_message: &str) -> String {
    let who = system_prompt.split_whitespace().last().unwrap_or("?");
    if user_message.starts_with("The council is discussing") {
        format!("discussion by {who}")
    } else if user_message.starts_with("Here is the record") {
        format!("consensus by {who}")
    } else {
        format!("initial by {who}: {user_message}")
    }
}

/// Session-capable backend counting opened sessions and sends.
#[derive(Default)]
struct SessionBackend {
    opened: Mutex<Vec<SessionSeed>>,
    sends: Mutex<Vec<(SessionHandle, String)>>,
}

#[async_trait]
impl SessionCapableBackend for SessionBackend {
    fn name(&self) -> &str {
        "sessions"
    }

    fn supported_models(&self) -> Vec<String> {
        vec!["m1".into()]
    }

    async fn open_session(&self, seed: SessionSeed) -> Result<SessionHandle, ProviderError> {
        let mut opened = self.opened.lock().unwrap();
        opened.push(seed);
        Ok(SessionHandle(format!("s{}", opened.len())))
    }

    async fn send(
        &self,
        session: &SessionHandle,
        message: &str,
        _params: GenerationParams,
    ) -> Result<String, ProviderError> {
        self.sends
            .lock()
            .unwrap()
            .push((session.clone(), message.to_string()));
        Ok(format!("reply in {session}"))
    }
}

/// Counts every cache call and delegates to the real cache.
#[derive(Default)]
struct SpyCache {
    inner: InMemoryResponseCache,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl SpyCache {
    fn count(&self, op: &'static str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    fn total(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn bump(&self, op: &'static str) {
        *self.calls.lock().unwrap().entry(op).or_default() += 1;
    }
}

impl CacheStore for SpyCache {
    fn get(&self, key: &str, ttl: Duration) -> Option<String> {
        self.bump("get");
        self.inner.get(key, ttl)
    }

    fn put(&self, key: &str, text: &str, ttl: Duration) {
        self.bump("put");
        self.inner.put(key, text, ttl)
    }

    fn sweep(&self, ttl: Duration) -> usize {
        self.bump("sweep");
        self.inner.sweep(ttl)
    }

    fn clear(&self) -> usize {
        self.bump("clear");
        self.inner.clear()
    }

    fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

struct BrokenSimilarity;

#[async_trait]
impl SimilarityBackend for BrokenSimilarity {
    fn name(&self) -> &str {
        "broken"
    }

    async fn search(
        &self,
        _text: &str,
        _scope: SearchScope<'_>,
        _k: usize,
    ) -> Result<Vec<SimilarityHit>, MemoryError> {
        Err(MemoryError::Unavailable("index offline".into()))
    }

    async fn index(
        &self,
        _conversation_id: &ConversationId,
        _text: &str,
        _timestamp: DateTime<Utc>,
    ) -> Result<(), MemoryError> {
        Err(MemoryError::Unavailable("index offline".into()))
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────

fn council_members() -> Vec<ArchetypeConfig> {
    vec![
        ArchetypeConfig::inline(
            "sofiya",
            "Sofiya",
            ArchetypeRole::CreativeGenerator,
            "m1",
            "You are sofiya",
        ),
        ArchetypeConfig::inline("lyra", "Lyra", ArchetypeRole::Critic, "m1", "You are lyra"),
        ArchetypeConfig::inline("maker", "Maker", ArchetypeRole::Executor, "m1", "You are maker"),
        ArchetypeConfig::inline("echo", "Echo", ArchetypeRole::Other, "m1", "You are echo"),
    ]
}

fn stateless(backend: Arc<RecordingBackend>, members: Vec<ArchetypeConfig>) -> Orchestrator {
    let gateway =
        ProviderGateway::new(Backend::Stateless(backend), "TEST_KEY", Arc::new(AllCredentials));
    Orchestrator::new(
        Arc::new(ArchetypeRegistry::from_configs(members, ".", None)),
        Arc::new(gateway),
    )
}

fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|k| k.to_string()).collect()
}

// ── Single agent ──────────────────────────────────────────────────────────

#[tokio::test]
async fn sofiya_stateless_request_is_cached() {
    let backend = Arc::new(RecordingBackend::default());
    let cache = Arc::new(SpyCache::default());
    let poet = ArchetypeConfig::inline(
        "sofiya",
        "Sofiya",
        ArchetypeRole::CreativeGenerator,
        "m1",
        "You are a poet.",
    );
    let orch = stateless(backend.clone(), vec![poet])
        .with_cache(cache.clone(), Duration::from_secs(3600));

    let first = orch
        .process("Write a haiku", "sofiya", None, None)
        .await
        .unwrap();
    let second = orch
        .process("Write a haiku", "sofiya", None, None)
        .await
        .unwrap();

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(first.response, second.response);
    assert_eq!(backend.requests().len(), 1);

    let requests = backend.requests();
    let request = &requests[0];
    assert_eq!(request.system_prompt, "You are a poet.");
    assert_eq!(request.user_message, "Write a haiku");
    assert!(request.history.is_empty());

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));
}

#[tokio::test]
async fn contextual_requests_never_touch_cache() {
    let backend = Arc::new(RecordingBackend::default());
    let cache = Arc::new(SpyCache::default());
    let orch = stateless(backend.clone(), council_members())
        .with_cache(cache.clone(), Duration::from_secs(3600))
        .with_conversation_log(Arc::new(InMemoryConversationLog::new()));

    orch.process("Write a haiku", "sofiya", Some("chat-1"), None)
        .await
        .unwrap();
    orch.process("Write a haiku", "sofiya", Some("chat-1"), None)
        .await
        .unwrap();

    assert_eq!(cache.total(), 0);
    assert_eq!(backend.requests().len(), 2);
    assert_eq!(backend.requests()[1].history.len(), 2);

    orch.process("Write a haiku", "sofiya", None, None)
        .await
        .unwrap();
    assert_eq!(cache.count("get"), 1);
    assert_eq!(cache.count("put"), 1);
}

#[tokio::test]
async fn retrieval_outage_degrades_to_no_context() {
    let backend = Arc::new(RecordingBackend::default());
    let orch =
        stateless(backend.clone(), council_members()).with_similarity(Arc::new(BrokenSimilarity));

    let response = orch
        .process("Should we ship v2?", "lyra", Some("chat-1"), None)
        .await
        .unwrap();

    assert_eq!(response.response, "initial by lyra: Should we ship v2?");
    assert_eq!(backend.requests()[0].user_message, "Should we ship v2?");
}

#[tokio::test]
async fn session_affinity_follows_conversation_and_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("archetypes.toml");
    let write = |prompt: &str| {
        std::fs::write(
            &path,
            format!(
                "[lyra]\nname = \"Lyra\"\nrole = \"critic\"\nmodel_name = \"m1\"\nprompt = \"{prompt}\"\n"
            ),
        )
        .unwrap();
    };
    write("You are a critic.");

    let backend = Arc::new(SessionBackend::default());
    let gateway = ProviderGateway::new(
        Backend::SessionCapable(backend.clone()),
        "TEST_KEY",
        Arc::new(AllCredentials),
    );
    let registry = Arc::new(ArchetypeRegistry::load(&path, None).unwrap());
    let orch = Orchestrator::new(registry.clone(), Arc::new(gateway));

    orch.process("first", "lyra", Some("chat-1"), None).await.unwrap();
    orch.process("second", "lyra", Some("chat-1"), None).await.unwrap();
    assert_eq!(backend.opened.lock().unwrap().len(), 1);

    write("You are a harsher critic.");
    registry.reload().unwrap();
    let third = orch.process("third", "lyra", Some("chat-1"), None).await.unwrap();

    let opened = backend.opened.lock().unwrap();
    assert_eq!(opened.len(), 2);
    assert_eq!(opened[1].system_prompt, "You are a harsher critic.");
    assert_eq!(third.response, "reply in s2");
    assert!(!third.cached);

    let sends = backend.sends.lock().unwrap();
    assert_eq!(sends[0].0, sends[1].0);
    assert_ne!(sends[1].0, sends[2].0);
}

#[tokio::test]
async fn unknown_archetype_is_a_validation_error() {
    let orch = stateless(Arc::new(RecordingBackend::default()), council_members());
    let err = orch.process("hello", "nobody", None, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.kind().to_string(), "ValidationError");
}

// ── Council ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn council_of_three_reaches_consensus_through_critic() {
    let backend = Arc::new(RecordingBackend::default());
    let orch = stateless(backend.clone(), council_members());
    let selection = keys(&["sofiya", "lyra", "maker"]);

    let outcome = orch
        .run_conference("Should we ship v2?", Some(selection.as_slice()), None)
        .await
        .unwrap();

    assert_eq!(outcome.participants, selection);
    assert_eq!(outcome.initial.len(), 3);
    assert_eq!(outcome.discussion.len(), 3);
    assert_eq!(
        outcome.initial.get("maker"),
        Some(&AgentOutcome::Response(
            "initial by maker: Should we ship v2?".into()
        ))
    );
    assert_eq!(
        outcome.discussion.get("sofiya").map(|o| o.text()),
        Some("discussion by sofiya")
    );

    let requests = backend.requests();
    for (me, others) in [
        ("sofiya", ["lyra", "maker"]),
        ("lyra", ["sofiya", "maker"]),
        ("maker", ["sofiya", "lyra"]),
    ] {
        let discussion = requests
            .iter()
            .find(|r| {
                r.system_prompt == format!("You are {me}")
                    && r.user_message.starts_with("The council is discussing")
            })
            .unwrap();
        for other in others {
            assert!(
                discussion
                    .user_message
                    .contains(&format!("initial by {other}: Should we ship v2?")),
                "{me} should see {other}"
            );
        }
        assert!(
            !discussion
                .user_message
                .contains(&format!("initial by {me}:"))
        );
        assert!(discussion.user_message.contains("Should we ship v2?"));
    }

    assert_eq!(outcome.synthesizer, "lyra");
    assert_eq!(outcome.consensus_text(), "consensus by lyra");
    assert_eq!(requests.len(), 7);

    let consensus_request = requests.last().unwrap();
    for who in ["sofiya", "lyra", "maker"] {
        assert!(consensus_request.user_message.contains(&format!("discussion by {who}")));
        assert!(consensus_request.user_message.contains(&format!("initial by {who}")));
    }
}

#[tokio::test]
async fn executor_outranks_creative_generator() {
    let orch = stateless(Arc::new(RecordingBackend::default()), council_members());
    let outcome = orch
        .run_conference("Plan the launch", Some(keys(&["sofiya", "maker"]).as_slice()), None)
        .await
        .unwrap();
    assert_eq!(outcome.synthesizer, "maker");
}

#[tokio::test]
async fn sole_creative_generator_synthesizes() {
    let orch = stateless(Arc::new(RecordingBackend::default()), council_members());
    let outcome = orch
        .run_conference("Plan the launch", Some(keys(&["sofiya"]).as_slice()), None)
        .await
        .unwrap();
    assert_eq!(outcome.synthesizer, "sofiya");
    assert_eq!(outcome.consensus_text(), "consensus by sofiya");
}

#[tokio::test]
async fn council_bounds() {
    let backend = Arc::new(RecordingBackend::default());
    let orch = stateless(backend.clone(), council_members());

    let none: Vec<String> = Vec::new();
    let err = orch
        .run_conference("Q", Some(none.as_slice()), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(backend.requests().is_empty());

    let outcome = orch
        .run_conference("Q", Some(keys(&["echo", "maker", "sofiya", "lyra"]).as_slice()), None)
        .await
        .unwrap();
    assert_eq!(outcome.participants, keys(&["echo", "maker", "sofiya"]));
    assert_eq!(outcome.synthesizer, "maker");
}

#[tokio::test]
async fn council_with_conversation_is_recorded_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let archive = Arc::new(JsonFileArchive::new(dir.path().join("history")));
    let log = Arc::new(JsonlConversationLog::new(
        dir.path().join("history").join("conversations.jsonl"),
    ));
    let cache = Arc::new(SpyCache::default());
    let orch = stateless(Arc::new(RecordingBackend::default()), council_members())
        .with_persistence(archive.clone())
        .with_conversation_log(log.clone())
        .with_cache(cache.clone(), Duration::from_secs(60));

    let outcome = orch
        .run_conference("Should we ship v2?", None, Some("chat-9"))
        .await
        .unwrap();

    let files = archive.list().await.unwrap();
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.contains("_conference_"));

    let turns = log.all_turns().await;
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].1.content, "Should we ship v2?");
    assert_eq!(turns[1].1.content, outcome.consensus_text());
    assert_eq!(cache.total(), 0);
}
