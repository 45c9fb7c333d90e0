//! Google Gemini session-capable backend.
//!
//! The REST API itself is stateless, so sessions are held here: each handle
//! owns the system instruction and the accumulated `contents` list. A turn
//! sends the stored history plus the new message, and the exchange is
//! appended only when the call succeeds.
//!
//! The backend also embeds text through `batchEmbedContents`
//! (`text-embedding-004` by default).

use async_trait::async_trait;
use rada_core::archetype::GenerationParams;
use rada_core::error::ProviderError;
use rada_core::message::{Message, Role};
use rada_core::provider::{Embedder, SessionCapableBackend, SessionHandle, SessionSeed};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-1.5-pro",
    "gemini-1.5-flash",
    "gemini-pro",
];

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

struct GeminiSession {
    model: String,
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    params: GenerationParams,
}

pub struct GeminiBackend {
    base_url: String,
    api_key: String,
    models: Vec<String>,
    embedding_model: String,
    client: reqwest::Client,
    sessions: Mutex<HashMap<SessionHandle, GeminiSession>>,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            client,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Replace the advertised model list. An empty list keeps the defaults.
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        if !models.is_empty() {
            self.models = models;
        }
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Number of open sessions.
    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn to_content(message: &Message) -> Option<Content> {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "model",
            // System turns belong in the system instruction, not the history.
            Role::System => return None,
        };
        Some(Content::text(role, &message.content))
    }

    fn generation_config(params: &GenerationParams) -> Option<GenerationConfig> {
        let config = GenerationConfig {
            temperature: params.temperature,
            max_output_tokens: params.max_tokens,
            top_p: params.top_p,
            top_k: params.top_k,
        };
        (config != GenerationConfig::default()).then_some(config)
    }

    async fn generate_content(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/models/{model}:generateContent", self.base_url);
        let parsed: GenerateContentResponse = self.post(&url, body).await?;
        extract_text(parsed)
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<R, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider = "gemini", status, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_message(&error_body),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))
    }
}

#[async_trait]
impl SessionCapableBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn supported_models(&self) -> Vec<String> {
        self.models.clone()
    }

    async fn open_session(&self, seed: SessionSeed) -> Result<SessionHandle, ProviderError> {
        let handle = SessionHandle(uuid::Uuid::new_v4().to_string());
        let system_instruction = (!seed.system_prompt.trim().is_empty())
            .then(|| Content::text("system", &seed.system_prompt));
        let contents: Vec<Content> = seed.history.iter().filter_map(Self::to_content).collect();

        debug!(
            session = %handle,
            model = %seed.model,
            seeded_turns = contents.len(),
            "Opened Gemini session"
        );

        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                handle.clone(),
                GeminiSession {
                    model: seed.model,
                    system_instruction,
                    contents,
                    params: seed.params,
                },
            );
        Ok(handle)
    }

    async fn send(
        &self,
        session: &SessionHandle,
        message: &str,
        params: GenerationParams,
    ) -> Result<String, ProviderError> {
        let user_turn = Content::text("user", message);

        let (model, request) = {
            let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            let state = sessions
                .get(session)
                .ok_or_else(|| ProviderError::SessionNotFound(session.to_string()))?;
            let mut contents = state.contents.clone();
            contents.push(user_turn.clone());
            let request = GenerateContentRequest {
                contents,
                system_instruction: state.system_instruction.clone(),
                generation_config: Self::generation_config(&params.or(state.params)),
            };
            (state.model.clone(), request)
        };

        let text = self.generate_content(&model, &request).await?;

        if let Some(state) = self
            .sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(session)
        {
            state.contents.push(user_turn);
            state.contents.push(Content::text("model", &text));
        }
        Ok(text)
    }

    async fn close_session(&self, session: &SessionHandle) -> Result<(), ProviderError> {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session);
        debug!(session = %session, "Closed Gemini session");
        Ok(())
    }
}

#[async_trait]
impl Embedder for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let model = &self.embedding_model;
        let url = format!("{}/models/{model}:batchEmbedContents", self.base_url);
        let body = BatchEmbedRequest {
            requests: inputs
                .iter()
                .map(|text| EmbedRequest {
                    model: format!("models/{model}"),
                    content: EmbedContent {
                        parts: vec![Part { text: text.clone() }],
                    },
                })
                .collect(),
        };

        debug!(model = %model, count = inputs.len(), "Sending Gemini embedding request");
        let parsed: BatchEmbedResponse = self.post(&url, &body).await?;
        extract_embeddings(parsed, inputs.len())
    }
}

fn extract_embeddings(
    response: BatchEmbedResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let vectors: Vec<Vec<f32>> = response.embeddings.into_iter().map(|e| e.values).collect();
    if vectors.len() != expected {
        return Err(ProviderError::InvalidResponse(format!(
            "Expected {expected} embeddings, got {}",
            vectors.len()
        )));
    }
    Ok(vectors)
}

fn extract_text(response: GenerateContentResponse) -> Result<String, ProviderError> {
    let text: Vec<String> = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ProviderError::InvalidResponse(
            "Gemini returned no text in the response candidates".into(),
        ));
    }
    Ok(text.concat())
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let message = wrapper.error.message.unwrap_or_else(|| body.to_string());
            match wrapper.error.status {
                Some(status) if !status.is_empty() => format!("{status}: {message}"),
                _ => message,
            }
        })
        .unwrap_or_else(|_| body.to_string())
}

// --- Gemini wire types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

impl Content {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}
