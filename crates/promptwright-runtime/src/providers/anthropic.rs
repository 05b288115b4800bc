//! Anthropic Messages API adapter.
//!
//! ## Security
//!
//! The API key is held in an [`ApiCredential`] and only exposed when the
//! request header is written.

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

/// Environment variable name for the Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Adapter for Anthropic Claude models.
pub struct AnthropicAdapter {
    id: String,
    credential: ApiCredential,
    base_url: String,
    timeout: Duration,
    prompt_caching: bool,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicAdapter")
            .field("id", &self.id)
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AnthropicAdapter {
    /// Create an adapter with an explicit API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(
            "anthropic",
            ApiCredential::new(api_key, CredentialSource::Programmatic, "Anthropic API key"),
        )
    }

    /// Create from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let credential = ApiCredential::from_env(ANTHROPIC_API_KEY_ENV, "Anthropic API key")?;
        Ok(Self::with_credential("anthropic", credential))
    }

    /// Create from JSON configuration, falling back to the environment for
    /// the API key.
    pub fn from_config(provider_id: &str, config: &JsonValue) -> Result<Self, ConfigError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            ANTHROPIC_API_KEY_ENV,
            "Anthropic API key",
        )?;

        let mut adapter = Self::with_credential(provider_id, credential);
        if let Some(url) = config["base_url"].as_str() {
            adapter.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(timeout) = config_timeout(config)? {
            adapter.timeout = timeout;
        }
        if let Some(caching) = config["prompt_caching"].as_bool() {
            adapter.prompt_caching = caching;
        }
        Ok(adapter)
    }

    fn with_credential(provider_id: &str, credential: ApiCredential) -> Self {
        Self {
            id: provider_id.to_string(),
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_ATTEMPT_TIMEOUT,
            prompt_caching: true,
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
    ) -> MessagesRequest<'a> {
        let system = request.system_prompt().map(|text| {
            vec![SystemBlock {
                kind: "text",
                text,
                cache_control: self.prompt_caching.then_some(CacheControl { kind: "ephemeral" }),
            }]
        });

        let messages = request
            .conversation()
            .map(|m| ApiMessage {
                role: m.role,
                content: &m.content,
            })
            .collect();

        MessagesRequest {
            model,
            max_tokens: request.max_output_tokens(),
            system,
            messages,
            temperature: request.temperature(),
            stream,
        }
    }

    async fn send(
        &self,
        model: &str,
        request: &InvocationRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let body = self.build_request(model, request, stream);

        let mut builder = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        // A streamed body may outlive the attempt timeout; only the opening
        // is bounded, by the orchestrator.
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
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<Vec<SystemBlock>>,
    messages: Vec<ApiMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct SystemBlock {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
}

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: MessageRole,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    model: String,
    stop_reason: Option<String>,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

/// Server-sent event payloads of a streamed call.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    MessageStart { message: StartedMessage },
    ContentBlockDelta { delta: BlockDelta },
    MessageDelta { usage: Option<ApiUsage> },
    MessageStop,
    Error { error: ApiErrorDetail },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StartedMessage {
    #[serde(default)]
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct BlockDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

/// Map an error delivered inside an open stream.
fn stream_error(detail: ApiErrorDetail) -> ProviderError {
    match detail.kind.as_str() {
        "rate_limit_error" => ProviderError::RateLimited { retry_after: None },
        "overloaded_error" | "api_error" => ProviderError::Network(detail.message),
        "authentication_error" | "permission_error" => {
            ProviderError::Authentication(detail.message)
        }
        "not_found_error" => ProviderError::ModelNotFound(detail.message),
        _ => ProviderError::InvalidRequest(detail.message),
    }
}

fn config_timeout(config: &JsonValue) -> Result<Option<Duration>, ConfigError> {
    match config["timeout"].as_str() {
        Some(raw) => humantime::parse_duration(raw)
            .map(Some)
            .map_err(|e| ConfigError::Invalid(format!("invalid timeout '{raw}': {e}"))),
        None => Ok(None),
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn provider_id(&self) -> &str {
        &self.id
    }

    async fn invoke(
        &self,
        model: &str,
        request: &InvocationRequest,
    ) -> Result<Completion, ProviderError> {
        let response = self.send(model, request, false).await?;
        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| map_transport_error(e, self.timeout))?;

        let text = body
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<String>();

        Ok(Completion {
            text,
            model: body.model,
            usage: TokenUsage::new(body.usage.input_tokens, body.usage.output_tokens),
            stop_reason: body.stop_reason,
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
            let mut usage = TokenUsage::default();
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(error) => {
                        yield Err(error);
                        return;
                    }
                };

                match serde_json::from_str::<StreamEvent>(&event.data) {
                    Ok(StreamEvent::MessageStart { message }) => {
                        usage.input_tokens = message.usage.input_tokens;
                    }
                    Ok(StreamEvent::ContentBlockDelta { delta }) => {
                        if let Some(text) = delta.text.filter(|t| !t.is_empty()) {
                            yield Ok(TextChunk::delta(text));
                        }
                    }
                    Ok(StreamEvent::MessageDelta { usage: Some(delta) }) => {
                        usage.output_tokens = delta.output_tokens;
                    }
                    Ok(StreamEvent::MessageStop) => {
                        yield Ok(TextChunk::finished(Some(usage)));
                        return;
                    }
                    Ok(StreamEvent::Error { error }) => {
                        yield Err(stream_error(error));
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        yield Err(ProviderError::Network(format!("Malformed stream event: {e}")));
                        return;
                    }
                }
            }
            yield Err(ProviderError::Network("stream closed before message_stop".to_string()));
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

/// Factory for Anthropic adapters.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "sk-ant-...",       // Optional, falls back to ANTHROPIC_API_KEY
///   "base_url": "https://...",     // Optional
///   "timeout": "30s",              // Optional, per attempt
///   "prompt_caching": true         // Optional, cache the system prompt
/// }
/// ```
pub struct AnthropicAdapterFactory;

impl AdapterFactory for AnthropicAdapterFactory {
    fn provider_type(&self) -> &'static str {
        "anthropic"
    }

    fn create(
        &self,
        provider_id: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
        Ok(Arc::new(AnthropicAdapter::from_config(provider_id, config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ConfigError> {
        if !ApiCredential::is_available(config, "api_key", ANTHROPIC_API_KEY_ENV) {
            return Err(ConfigError::MissingCredential(format!(
                "Anthropic API key required: set 'api_key' in config or {ANTHROPIC_API_KEY_ENV}"
            )));
        }

        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Invalid(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        config_timeout(config).map(|_| ())
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({
            "base_url": DEFAULT_BASE_URL,
            "timeout": "30s",
            "prompt_caching": true
        })
    }

    fn description(&self) -> &'static str {
        "Anthropic Messages API with streaming and prompt caching"
    }
}
