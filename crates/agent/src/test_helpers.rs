//! Shared fakes for orchestrator and council tests.

use async_trait::async_trait;
use rada_core::archetype::ArchetypeConfig;
use rada_core::conference::{ConferenceRecord, ExchangeRecord, Persistence};
use rada_core::error::{MemoryError, ProviderError};
use rada_core::provider::{Backend, CompletionRequest, CredentialStore, StatelessBackend};
use rada_providers::ProviderGateway;
use std::sync::{Arc, Mutex};

use crate::registry::ArchetypeRegistry;

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String, ProviderError> + Send + Sync>;

/// A stateless backend that records every request and answers through a
/// closure.
pub struct ScriptedBackend {
    responder: Responder,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new(
        responder: impl Fn(&CompletionRequest) -> Result<String, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers `echo: <user message>`.
    pub fn echo() -> Self {
        Self::new(|req| Ok(format!("echo: {}", req.user_message)))
    }

    /// Fails every call with an API error carrying `message`.
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::new(move |_| {
            Err(ProviderError::ApiError {
                status_code: 500,
                message: message.clone(),
            })
        })
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatelessBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn supported_models(&self) -> Vec<String> {
        Vec::new()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let answer = (self.responder)(&request);
        self.requests.lock().unwrap().push(request);
        answer
    }
}

/// Every credential is present.
pub struct AllCredentials;

impl CredentialStore for AllCredentials {
    fn has(&self, _name: &str) -> bool {
        true
    }
}

pub fn gateway(backend: Arc<ScriptedBackend>) -> ProviderGateway {
    ProviderGateway::new(Backend::Stateless(backend), "TEST_API_KEY", Arc::new(AllCredentials))
}

pub fn registry(configs: Vec<ArchetypeConfig>) -> ArchetypeRegistry {
    ArchetypeRegistry::from_configs(configs, ".", None)
}

/// Persistence that keeps records in memory, optionally failing every call.
pub struct RecordingPersistence {
    fail: bool,
    exchanges: Mutex<Vec<ExchangeRecord>>,
    conferences: Mutex<Vec<ConferenceRecord>>,
}

impl RecordingPersistence {
    pub fn new() -> Self {
        Self {
            fail: false,
            exchanges: Mutex::new(Vec::new()),
            conferences: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.lock().unwrap().len()
    }

    pub fn exchanges(&self) -> Vec<ExchangeRecord> {
        self.exchanges.lock().unwrap().clone()
    }

    pub fn conferences(&self) -> Vec<ConferenceRecord> {
        self.conferences.lock().unwrap().clone()
    }

    fn outcome(&self) -> Result<(), MemoryError> {
        if self.fail {
            Err(MemoryError::Storage("disk full".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Persistence for RecordingPersistence {
    fn name(&self) -> &str {
        "recording"
    }

    async fn persist_conference(&self, record: &ConferenceRecord) -> Result<(), MemoryError> {
        self.conferences.lock().unwrap().push(record.clone());
        self.outcome()
    }

    async fn persist_exchange(&self, record: &ExchangeRecord) -> Result<(), MemoryError> {
        self.exchanges.lock().unwrap().push(record.clone());
        self.outcome()
    }
}
