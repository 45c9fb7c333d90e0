//! Provider gateway: backend selection, session affinity, timeouts.
//!
//! The primary backend is used while its credential is present, otherwise
//! the secondary. There is no retry: a failed call is returned to the caller
//! as `Error::Provider` naming the backend.
//!
//! Dispatch depends on the selected backend's capability, not its name:
//!
//! | backend          | session key | behaviour                                  |
//! |------------------|-------------|--------------------------------------------|
//! | stateless        | any         | one call with system + history + turn      |
//! | session-capable  | present     | reuse or open the keyed session, send turn |
//! | session-capable  | absent      | ephemeral session, closed after the turn   |

use rada_config::{AppConfig, BackendConfig, BackendKind, EnvCredentials};
use rada_core::archetype::GenerationParams;
use rada_core::error::{Error, ProviderError, Result};
use rada_core::message::Message;
use rada_core::provider::{
    Backend, CompletionRequest, CredentialStore, SessionCapableBackend, SessionKey, SessionSeed,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::gemini::GeminiBackend;
use crate::normalize::normalize_model;
use crate::openai_compat::OpenAiCompatBackend;
use crate::sessions::{EvictedSession, SessionTable};

/// One generation call.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Model as named by the archetype; normalised per backend.
    pub model_id: String,
    pub system_prompt: String,
    pub user_message: String,
    /// Rendered retrieval block, prepended to the user turn.
    pub context_text: String,
    /// Prior turns, oldest first. Seeds a new session or rides along on
    /// stateless calls; ignored when an existing session is reused.
    pub history: Vec<Message>,
    pub session_key: Option<SessionKey>,
    pub params: GenerationParams,
}

impl GenerationRequest {
    pub fn new(
        model_id: impl Into<String>,
        system_prompt: impl Into<String>,
        user_message: impl Into<String>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            system_prompt: system_prompt.into(),
            user_message: user_message.into(),
            ..Default::default()
        }
    }

    /// True when the request depends on conversation state.
    pub fn is_contextual(&self) -> bool {
        !self.context_text.trim().is_empty()
            || !self.history.is_empty()
            || self.session_key.is_some()
    }

    /// The turn actually sent: context block, blank line, user message.
    pub fn user_turn(&self) -> String {
        if self.context_text.trim().is_empty() {
            self.user_message.clone()
        } else {
            format!("{}\n\n{}", self.context_text.trim_end(), self.user_message)
        }
    }
}

struct BackendEntry {
    backend: Backend,
    credential: String,
}

pub struct ProviderGateway {
    primary: BackendEntry,
    secondary: Option<BackendEntry>,
    credentials: Arc<dyn CredentialStore>,
    sessions: SessionTable,
    defaults: GenerationParams,
    timeout: Duration,
}

impl ProviderGateway {
    pub fn new(
        primary: Backend,
        credential: impl Into<String>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            primary: BackendEntry {
                backend: primary,
                credential: credential.into(),
            },
            secondary: None,
            credentials,
            sessions: SessionTable::new(256, Duration::from_secs(3600)),
            defaults: GenerationParams::default(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_secondary(mut self, backend: Backend, credential: impl Into<String>) -> Self {
        self.secondary = Some(BackendEntry {
            backend,
            credential: credential.into(),
        });
        self
    }

    /// Provider-level parameters used where neither request nor archetype sets one.
    pub fn with_defaults(mut self, defaults: GenerationParams) -> Self {
        self.defaults = defaults;
        self
    }

    /// Caller-side timeout applied to each backend call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_session_limits(mut self, capacity: usize, idle_ttl: Duration) -> Self {
        self.sessions = SessionTable::new(capacity, idle_ttl);
        self
    }

    /// Sessions currently tracked.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Name of the backend the next call would use, if any is usable.
    pub fn active_backend(&self) -> Option<&str> {
        self.select().ok().map(|entry| entry.backend.name())
    }

    fn select(&self) -> Result<&BackendEntry> {
        if self.credentials.has(&self.primary.credential) {
            return Ok(&self.primary);
        }
        if let Some(secondary) = &self.secondary {
            if self.credentials.has(&secondary.credential) {
                debug!(
                    primary = %self.primary.backend.name(),
                    secondary = %secondary.backend.name(),
                    "Primary credential absent, using secondary backend"
                );
                return Ok(secondary);
            }
        }
        Err(Error::provider(
            self.primary.backend.name(),
            ProviderError::MissingCredentials {
                primary: self.primary.credential.clone(),
                secondary: self
                    .secondary
                    .as_ref()
                    .map(|s| s.credential.clone())
                    .unwrap_or_else(|| "<none configured>".into()),
            },
        ))
    }

    /// Generate a response for `request` on the selected backend.
    pub async fn generate(&self, request: GenerationRequest) -> Result<String> {
        let entry = self.select()?;
        let backend_name = entry.backend.name().to_string();
        let model = normalize_model(&request.model_id, &entry.backend.supported_models());
        let params = request.params.or(self.defaults);
        let user_turn = request.user_turn();

        info!(
            provider = %backend_name,
            model = %model,
            sessions = entry.backend.supports_sessions(),
            contextual = request.is_contextual(),
            "Dispatching generation"
        );

        let result = match &entry.backend {
            Backend::Stateless(backend) => {
                let completion = CompletionRequest {
                    model,
                    system_prompt: request.system_prompt,
                    history: request.history,
                    user_message: user_turn,
                    params,
                };
                self.timed(&backend_name, backend.complete(completion)).await
            }
            Backend::SessionCapable(backend) => {
                let seed = SessionSeed {
                    model,
                    system_prompt: request.system_prompt,
                    history: request.history,
                    params,
                };
                match request.session_key {
                    Some(key) => {
                        self.send_in_session(backend, &backend_name, &key, seed, &user_turn, params)
                            .await
                    }
                    None => {
                        self.send_once(backend, &backend_name, seed, &user_turn, params)
                            .await
                    }
                }
            }
        };

        result.map_err(|source| {
            warn!(provider = %backend_name, error = %source, "Generation failed");
            Error::provider(backend_name, source)
        })
    }

    async fn send_in_session(
        &self,
        backend: &Arc<dyn SessionCapableBackend>,
        backend_name: &str,
        key: &SessionKey,
        seed: SessionSeed,
        user_turn: &str,
        params: GenerationParams,
    ) -> std::result::Result<String, ProviderError> {
        let checkout = self.sessions.checkout(backend_name, key);
        self.close_evicted(checkout.evicted).await;

        let mut slot = checkout.slot.lock().await;
        let handle = match slot.as_ref() {
            Some(handle) => {
                debug!(session = %handle, key = %key, "Reusing session");
                handle.clone()
            }
            None => {
                let handle = self.timed(backend_name, backend.open_session(seed)).await?;
                debug!(session = %handle, key = %key, "Opened session");
                *slot = Some(handle.clone());
                handle
            }
        };

        match self
            .timed(backend_name, backend.send(&handle, user_turn, params))
            .await
        {
            Err(ProviderError::SessionNotFound(h)) => {
                // Backend lost the session; the next turn starts a fresh one.
                *slot = None;
                Err(ProviderError::SessionNotFound(h))
            }
            other => other,
        }
    }

    /// Close evicted sessions on the backend that opened them.
    async fn close_evicted(&self, evicted: Vec<EvictedSession>) {
        for EvictedSession { backend, handle } in evicted {
            let Some(owner) = self.session_backend(&backend) else {
                debug!(session = %handle, provider = %backend, "Evicted session has no owner");
                continue;
            };
            if let Err(e) = owner.close_session(&handle).await {
                debug!(session = %handle, error = %e, "Failed to close evicted session");
            }
        }
    }

    fn session_backend(&self, name: &str) -> Option<&Arc<dyn SessionCapableBackend>> {
        std::iter::once(&self.primary)
            .chain(self.secondary.as_ref())
            .find_map(|entry| match &entry.backend {
                Backend::SessionCapable(backend) if backend.name() == name => Some(backend),
                _ => None,
            })
    }

    async fn send_once(
        &self,
        backend: &Arc<dyn SessionCapableBackend>,
        backend_name: &str,
        seed: SessionSeed,
        user_turn: &str,
        params: GenerationParams,
    ) -> std::result::Result<String, ProviderError> {
        let handle = self.timed(backend_name, backend.open_session(seed)).await?;
        let result = self
            .timed(backend_name, backend.send(&handle, user_turn, params))
            .await;
        if let Err(e) = backend.close_session(&handle).await {
            debug!(session = %handle, error = %e, "Failed to close one-shot session");
        }
        result
    }

    async fn timed<T>(
        &self,
        backend_name: &str,
        call: impl Future<Output = std::result::Result<T, ProviderError>>,
    ) -> std::result::Result<T, ProviderError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    provider = %backend_name,
                    timeout_secs = self.timeout.as_secs(),
                    "Provider call timed out"
                );
                Err(ProviderError::Timeout(format!(
                    "Provider '{}' timed out after {}s",
                    backend_name,
                    self.timeout.as_secs()
                )))
            }
        }
    }
}

fn build_backend(config: &BackendConfig, credentials: &EnvCredentials) -> Result<Backend> {
    let api_key = credentials.resolve(&config.credential_env).unwrap_or_default();
    let backend = match config.kind {
        BackendKind::Gemini => {
            let backend = match &config.api_url {
                Some(url) => GeminiBackend::with_base_url(url, api_key),
                None => GeminiBackend::new(api_key),
            }
            .map_err(|e| Error::provider("gemini", e))?;
            Backend::SessionCapable(Arc::new(backend.with_models(config.models.clone())))
        }
        BackendKind::OpenaiCompat => {
            let backend = match &config.api_url {
                Some(url) => OpenAiCompatBackend::new("openai_compat", url, api_key),
                None => OpenAiCompatBackend::openai(api_key),
            }
            .map_err(|e| Error::provider("openai", e))?;
            Backend::Stateless(Arc::new(backend.with_models(config.models.clone())))
        }
    };
    Ok(backend)
}

/// Build the gateway described by `config`.
pub fn build_from_config(
    config: &AppConfig,
    credentials: Arc<EnvCredentials>,
) -> Result<ProviderGateway> {
    let primary = build_backend(&config.providers.primary, &credentials)?;
    let secondary = config
        .providers
        .secondary
        .as_ref()
        .map(|c| build_backend(c, &credentials).map(|b| (b, c.credential_env.clone())))
        .transpose()?;

    let mut gateway = ProviderGateway::new(
        primary,
        config.providers.primary.credential_env.clone(),
        credentials,
    )
    .with_defaults(GenerationParams {
        temperature: Some(config.default_temperature),
        max_tokens: Some(config.default_max_tokens),
        top_p: None,
        top_k: None,
    })
    .with_timeout(Duration::from_secs(config.request_timeout_secs))
    .with_session_limits(
        config.sessions.capacity,
        Duration::from_secs(config.sessions.idle_ttl_secs),
    );

    if let Some((backend, credential)) = secondary {
        gateway = gateway.with_secondary(backend, credential);
    }
    Ok(gateway)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rada_core::provider::{SessionHandle, StatelessBackend};
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct Present(HashSet<&'static str>);

    impl Present {
        fn of(names: &[&'static str]) -> Arc<Self> {
            Arc::new(Self(names.iter().copied().collect()))
        }
    }

    impl CredentialStore for Present {
        fn has(&self, name: &str) -> bool {
            self.0.contains(name)
        }
    }

    /// Stateless fake recording every request.
    struct RecordingBackend {
        name: String,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl RecordingBackend {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn last(&self) -> CompletionRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl StatelessBackend for RecordingBackend {
        fn name(&self) -> &str {
            &self.name
        }

        fn supported_models(&self) -> Vec<String> {
            vec!["gpt-4o".into(), "gpt-4".into()]
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> std::result::Result<String, ProviderError> {
            self.requests.lock().unwrap().push(request);
            Ok(format!("{} says hi", self.name))
        }
    }

    /// Session-capable fake counting opens and recording sent turns.
    struct SessionSpy {
        name: &'static str,
        opens: Mutex<Vec<SessionSeed>>,
        sends: Mutex<Vec<(SessionHandle, String)>>,
        closes: Mutex<usize>,
    }

    impl Default for SessionSpy {
        fn default() -> Self {
            Self::named("spy")
        }
    }

    impl SessionSpy {
        fn named(name: &'static str) -> Self {
            Self {
                name,
                opens: Mutex::new(Vec::new()),
                sends: Mutex::new(Vec::new()),
                closes: Mutex::new(0),
            }
        }

        fn closes(&self) -> usize {
            *self.closes.lock().unwrap()
        }

        fn opens(&self) -> usize {
            self.opens.lock().unwrap().len()
        }

        fn sends(&self) -> Vec<(SessionHandle, String)> {
            self.sends.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SessionCapableBackend for SessionSpy {
        fn name(&self) -> &str {
            self.name
        }

        fn supported_models(&self) -> Vec<String> {
            vec!["gemini-2.5-flash".into()]
        }

        async fn open_session(
            &self,
            seed: SessionSeed,
        ) -> std::result::Result<SessionHandle, ProviderError> {
            let mut opens = self.opens.lock().unwrap();
            opens.push(seed);
            Ok(SessionHandle(format!("{}-s{}", self.name, opens.len())))
        }

        async fn send(
            &self,
            session: &SessionHandle,
            message: &str,
            _params: GenerationParams,
        ) -> std::result::Result<String, ProviderError> {
            self.sends
                .lock()
                .unwrap()
                .push((session.clone(), message.to_string()));
            Ok(format!("reply via {session}"))
        }

        async fn close_session(
            &self,
            _session: &SessionHandle,
        ) -> std::result::Result<(), ProviderError> {
            *self.closes.lock().unwrap() += 1;
            Ok(())
        }
    }

    /// Never answers.
    struct HangingBackend;

    #[async_trait]
    impl StatelessBackend for HangingBackend {
        fn name(&self) -> &str {
            "hanging"
        }

        fn supported_models(&self) -> Vec<String> {
            vec![]
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> std::result::Result<String, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    fn session_request(conv: &str, prompt: &str, text: &str) -> GenerationRequest {
        GenerationRequest {
            session_key: Some(SessionKey::new(conv.into(), "gemini-2.5-flash", prompt)),
            history: vec![Message::user("earlier"), Message::assistant("reply")],
            ..GenerationRequest::new("gemini-2.5-flash", prompt, text)
        }
    }

    #[tokio::test]
    async fn primary_used_when_credential_present() {
        let primary = RecordingBackend::new("primary");
        let secondary = RecordingBackend::new("secondary");
        let gateway = ProviderGateway::new(
            Backend::Stateless(primary.clone()),
            "PRIMARY_KEY",
            Present::of(&["PRIMARY_KEY", "SECONDARY_KEY"]),
        )
        .with_secondary(Backend::Stateless(secondary.clone()), "SECONDARY_KEY");

        let text = gateway
            .generate(GenerationRequest::new("gpt-4o", "sys", "hello"))
            .await
            .unwrap();
        assert_eq!(text, "primary says hi");
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn falls_back_when_primary_credential_absent() {
        let primary = RecordingBackend::new("primary");
        let secondary = RecordingBackend::new("secondary");
        let gateway = ProviderGateway::new(
            Backend::Stateless(primary.clone()),
            "PRIMARY_KEY",
            Present::of(&["SECONDARY_KEY"]),
        )
        .with_secondary(Backend::Stateless(secondary.clone()), "SECONDARY_KEY");

        assert_eq!(gateway.active_backend(), Some("secondary"));
        gateway
            .generate(GenerationRequest::new("gpt-4o", "sys", "hello"))
            .await
            .unwrap();
        assert_eq!(primary.calls(), 0);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn no_credentials_fails_naming_both() {
        let primary = RecordingBackend::new("primary");
        let gateway = ProviderGateway::new(
            Backend::Stateless(primary.clone()),
            "GOOGLE_API_KEY",
            Present::of(&[]),
        )
        .with_secondary(
            Backend::Stateless(RecordingBackend::new("secondary")),
            "OPENAI_API_KEY",
        );

        let err = gateway
            .generate(GenerationRequest::new("m1", "sys", "hello"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), rada_core::ErrorKind::Provider);
        let text = err.to_string();
        assert!(text.contains("GOOGLE_API_KEY"));
        assert!(text.contains("OPENAI_API_KEY"));
        assert_eq!(primary.calls(), 0);
        assert_eq!(gateway.active_backend(), None);
    }

    #[tokio::test]
    async fn stateless_call_normalises_model_and_applies_defaults() {
        let backend = RecordingBackend::new("openai");
        let gateway = ProviderGateway::new(
            Backend::Stateless(backend.clone()),
            "KEY",
            Present::of(&["KEY"]),
        )
        .with_defaults(GenerationParams {
            temperature: Some(0.7),
            max_tokens: Some(2000),
            ..Default::default()
        });

        let request = GenerationRequest {
            params: GenerationParams {
                temperature: Some(0.2),
                ..Default::default()
            },
            ..GenerationRequest::new("GPT-4o-mini", "You are a poet.", "Write a haiku")
        };
        gateway.generate(request).await.unwrap();

        let sent = backend.last();
        assert_eq!(sent.model, "gpt-4o");
        assert_eq!(sent.params.temperature, Some(0.2));
        assert_eq!(sent.params.max_tokens, Some(2000));
        assert_eq!(sent.system_prompt, "You are a poet.");
        assert_eq!(sent.user_message, "Write a haiku");
    }

    #[tokio::test]
    async fn stateless_backend_receives_history_and_context() {
        let backend = RecordingBackend::new("openai");
        let gateway = ProviderGateway::new(
            Backend::Stateless(backend.clone()),
            "KEY",
            Present::of(&["KEY"]),
        );

        let request = GenerationRequest {
            context_text: "Relevant context:\n- earlier note".into(),
            ..session_request("c1", "sys", "next question")
        };
        gateway.generate(request).await.unwrap();

        let sent = backend.last();
        assert_eq!(sent.history.len(), 2);
        assert!(sent.user_message.starts_with("Relevant context:"));
        assert!(sent.user_message.ends_with("\n\nnext question"));
        assert_eq!(gateway.session_count(), 0);
    }

    #[tokio::test]
    async fn consecutive_turns_reuse_one_session() {
        let spy = Arc::new(SessionSpy::default());
        let gateway = ProviderGateway::new(
            Backend::SessionCapable(spy.clone()),
            "KEY",
            Present::of(&["KEY"]),
        );

        gateway
            .generate(session_request("c1", "You are a poet.", "first"))
            .await
            .unwrap();
        gateway
            .generate(session_request("c1", "You are a poet.", "second"))
            .await
            .unwrap();

        assert_eq!(spy.opens(), 1);
        let sends = spy.sends();
        assert_eq!(sends.len(), 2);
        assert_eq!(sends[0].0, sends[1].0);
        // Only the new turn travels; history seeded the session once.
        assert_eq!(sends[1].1, "second");
        assert_eq!(spy.opens.lock().unwrap()[0].history.len(), 2);
    }

    #[tokio::test]
    async fn changed_prompt_opens_new_session() {
        let spy = Arc::new(SessionSpy::default());
        let gateway = ProviderGateway::new(
            Backend::SessionCapable(spy.clone()),
            "KEY",
            Present::of(&["KEY"]),
        );

        gateway
            .generate(session_request("c1", "You are a poet.", "first"))
            .await
            .unwrap();
        gateway
            .generate(session_request("c1", "You are a critic.", "second"))
            .await
            .unwrap();

        assert_eq!(spy.opens(), 2);
        let sends = spy.sends();
        assert_ne!(sends[0].0, sends[1].0);
    }

    #[tokio::test]
    async fn concurrent_first_turns_open_one_session() {
        let spy = Arc::new(SessionSpy::default());
        let gateway = Arc::new(ProviderGateway::new(
            Backend::SessionCapable(spy.clone()),
            "KEY",
            Present::of(&["KEY"]),
        ));

        let a = {
            let g = gateway.clone();
            tokio::spawn(async move { g.generate(session_request("c1", "p", "a")).await })
        };
        let b = {
            let g = gateway.clone();
            tokio::spawn(async move { g.generate(session_request("c1", "p", "b")).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(spy.opens(), 1);
        assert_eq!(spy.sends().len(), 2);
    }

    /// Credentials that can be revoked between calls.
    struct Revocable(Mutex<HashSet<&'static str>>);

    impl Revocable {
        fn of(names: &[&'static str]) -> Arc<Self> {
            Arc::new(Self(Mutex::new(names.iter().copied().collect())))
        }

        fn revoke(&self, name: &str) {
            self.0.lock().unwrap().remove(name);
        }
    }

    impl CredentialStore for Revocable {
        fn has(&self, name: &str) -> bool {
            self.0.lock().unwrap().contains(name)
        }
    }

    #[tokio::test]
    async fn evicted_session_is_closed_on_its_own_backend() {
        let alpha = Arc::new(SessionSpy::named("alpha"));
        let beta = Arc::new(SessionSpy::named("beta"));
        let credentials = Revocable::of(&["ALPHA_KEY", "BETA_KEY"]);
        let gateway = ProviderGateway::new(
            Backend::SessionCapable(alpha.clone()),
            "ALPHA_KEY",
            credentials.clone(),
        )
        .with_secondary(Backend::SessionCapable(beta.clone()), "BETA_KEY")
        .with_session_limits(1, Duration::from_secs(3600));

        gateway
            .generate(session_request("c1", "p", "on alpha"))
            .await
            .unwrap();
        credentials.revoke("ALPHA_KEY");
        gateway
            .generate(session_request("c2", "p", "on beta"))
            .await
            .unwrap();

        assert_eq!(alpha.closes(), 1);
        assert_eq!(beta.closes(), 0);
        assert_eq!(gateway.session_count(), 1);
    }

    #[tokio::test]
    async fn session_capable_without_key_uses_ephemeral_session() {
        let spy = Arc::new(SessionSpy::default());
        let gateway = ProviderGateway::new(
            Backend::SessionCapable(spy.clone()),
            "KEY",
            Present::of(&["KEY"]),
        );

        gateway
            .generate(GenerationRequest::new("gemini", "sys", "one-shot"))
            .await
            .unwrap();

        assert_eq!(spy.opens(), 1);
        assert_eq!(spy.closes(), 1);
        assert_eq!(gateway.session_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_a_provider_error() {
        let gateway = ProviderGateway::new(
            Backend::Stateless(Arc::new(HangingBackend)),
            "KEY",
            Present::of(&["KEY"]),
        )
        .with_timeout(Duration::from_secs(5));

        let err = gateway
            .generate(GenerationRequest::new("m1", "sys", "hello"))
            .await
            .unwrap_err();
        match err {
            Error::Provider { provider, source } => {
                assert_eq!(provider, "hanging");
                assert!(matches!(source, ProviderError::Timeout(_)));
            }
            other => panic!("Expected provider timeout, got: {other:?}"),
        }
    }

    #[test]
    fn contextual_flag() {
        let plain = GenerationRequest::new("m1", "sys", "hi");
        assert!(!plain.is_contextual());
        assert_eq!(plain.user_turn(), "hi");

        let with_context = GenerationRequest {
            context_text: "ctx".into(),
            ..plain.clone()
        };
        assert!(with_context.is_contextual());

        let with_history = GenerationRequest {
            history: vec![Message::user("x")],
            ..plain.clone()
        };
        assert!(with_history.is_contextual());
    }

    #[test]
    fn build_from_default_config() {
        let credentials = Arc::new(
            EnvCredentials::new()
                .without("GOOGLE_API_KEY")
                .with("OPENAI_API_KEY", "sk-test"),
        );
        let gateway = build_from_config(&AppConfig::default(), credentials).unwrap();
        assert_eq!(gateway.active_backend(), Some("openai"));
        assert_eq!(gateway.timeout, Duration::from_secs(60));
        assert_eq!(gateway.defaults.max_tokens, Some(2000));
    }
}
