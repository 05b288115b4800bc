//! OpenAI Chat Completions API adapter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::http::{error_from_response, map_transport_error, sse_events};
use super::secrets::{ApiCredential, CredentialSource};
use super::{
    AdapterFactory, Completion, MessageRole, ProviderAdapter, ProviderError, TextChunk,
    TextStream, TokenUsage, DEFAULT_ATTEMPT_TIMEOUT,
};
use crate::config::ConfigError;
use crate::invocation::InvocationRequest;

/// Environment variable name for the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DONE_MARKER: &str = "[DONE]";

/// Adapter for OpenAI chat models and compatible endpoints.
pub struct OpenAiAdapter {
    id: String,
    credential: ApiCredential,
    base_url: String,
    organization: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAdapter")
            .field("id", &self.id)
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("organization", &self.organization)
            .finish()
    }
}

impl OpenAiAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(
            "openai",
            ApiCredential::new(api_key, CredentialSource::Programmatic, "OpenAI API key"),
        )
    }

    /// Create from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let credential = ApiCredential::from_env(OPENAI_API_KEY_ENV, "OpenAI API key")?;
        Ok(Self::with_credential("openai", credential))
    }

    /// Create from JSON configuration with environment fallback for the key.
    pub fn from_config(provider_id: &str, config: &JsonValue) -> Result<Self, ConfigError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            OPENAI_API_KEY_ENV,
            "OpenAI API key",
        )?;

        let mut adapter = Self::with_credential(provider_id, credential);
        if let Some(url) = config["base_url"].as_str() {
            adapter.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(organization) = config["organization"].as_str() {
            adapter.organization = Some(organization.to_string());
        }
        if let Some(raw) = config["timeout"].as_str() {
            adapter.timeout = humantime::parse_duration(raw)
                .map_err(|e| ConfigError::Invalid(format!("invalid timeout '{raw}': {e}")))?;
        }
        Ok(adapter)
    }

    fn with_credential(provider_id: &str, credential: ApiCredential) -> Self {
        Self {
            id: provider_id.to_string(),
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            organization: None,
            timeout: DEFAULT_ATTEMPT_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_request<'a>(
        &self,
        model: &'a str,
        request: &'a InvocationRequest,
        stream: bool,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model,
            messages: request
                .messages()
                .iter()
                .map(|m| ApiMessage {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
            max_tokens: request.max_output_tokens(),
            temperature: request.temperature(),
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    async fn send(
        &self,
        model: &str,
        request: &InvocationRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .json(&self.build_request(model, request, stream));

        if let Some(organization) = &self.organization {
            builder = builder.header("OpenAI-Organization", organization);
        }
        if !stream {
            builder = builder.timeout(self.timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: MessageRole,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl From<ApiUsage> for TokenUsage {
    fn from(usage: ApiUsage) -> Self {
        TokenUsage::new(usage.prompt_tokens, usage.completion_tokens)
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn provider_id(&self) -> &str {
        &self.id
    }

    async fn invoke(
        &self,
        model: &str,
        request: &InvocationRequest,
    ) -> Result<Completion, ProviderError> {
        let response = self.send(model, request, false).await?;
        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| map_transport_error(e, self.timeout))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Network("response contained no choices".to_string()))?;

        Ok(Completion {
            text: choice.message.content.unwrap_or_default(),
            model: body.model,
            usage: body.usage.map(TokenUsage::from).unwrap_or_default(),
            stop_reason: choice.finish_reason,
        })
    }

    async fn invoke_streaming(
        &self,
        model: &str,
        request: &InvocationRequest,
    ) -> Result<TextStream, ProviderError> {
        let response = self.send(model, request, true).await?;
        let mut events = Box::pin(sse_events(response));

        let stream = async_stream::stream! {
            let mut usage = None;
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(error) => {
                        yield Err(error);
                        return;
                    }
                };

                if event.data.trim() == DONE_MARKER {
                    yield Ok(TextChunk::finished(usage));
                    return;
                }

                match serde_json::from_str::<StreamChunk>(&event.data) {
                    Ok(chunk) => {
                        if let Some(reported) = chunk.usage {
                            usage = Some(TokenUsage::from(reported));
                        }
                        for choice in chunk.choices {
                            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                                yield Ok(TextChunk::delta(text));
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(ProviderError::Network(format!("Malformed stream chunk: {e}")));
                        return;
                    }
                }
            }
            yield Err(ProviderError::Network("stream closed before [DONE]".to_string()));
        };

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn attempt_timeout(&self) -> Duration {
        self.timeout
    }
}

/// Factory for OpenAI adapters.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "sk-...",           // Optional, falls back to OPENAI_API_KEY
///   "base_url": "https://...",     // Optional, for compatible endpoints
///   "organization": "org-...",     // Optional
///   "timeout": "30s"               // Optional, per attempt
/// }
/// ```
pub struct OpenAiAdapterFactory;

impl AdapterFactory for OpenAiAdapterFactory {
    fn provider_type(&self) -> &'static str {
        "openai"
    }

    fn create(
        &self,
        provider_id: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
        Ok(Arc::new(OpenAiAdapter::from_config(provider_id, config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ConfigError> {
        if !ApiCredential::is_available(config, "api_key", OPENAI_API_KEY_ENV) {
            return Err(ConfigError::MissingCredential(format!(
                "OpenAI API key required: set 'api_key' in config or {OPENAI_API_KEY_ENV}"
            )));
        }

        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Invalid(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        if let Some(raw) = config["timeout"].as_str() {
            humantime::parse_duration(raw)
                .map_err(|e| ConfigError::Invalid(format!("invalid timeout '{raw}': {e}")))?;
        }
        Ok(())
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({
            "base_url": DEFAULT_BASE_URL,
            "timeout": "30s"
        })
    }

    fn description(&self) -> &'static str {
        "OpenAI Chat Completions API and compatible endpoints"
    }
}
