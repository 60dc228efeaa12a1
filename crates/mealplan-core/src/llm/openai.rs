use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{CompletionClient, CompletionRequest, UpstreamError, truncate_detail};

/// Where an OpenAI-compatible provider lives and how to authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEndpoint {
    /// Base URL including the version segment, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: Option<String>,
}

impl ChatEndpoint {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
        }
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Adds the bearer header when a key is configured.
    pub(crate) fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => request.bearer_auth(key),
            _ => request,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Completion client for OpenAI-compatible chat APIs.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    endpoint: ChatEndpoint,
}

impl OpenAiClient {
    pub fn new(endpoint: ChatEndpoint) -> Result<Self, UpstreamError> {
        let http = Client::builder().build().map_err(UpstreamError::transport)?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &ChatEndpoint {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError> {
        let body = ChatRequest {
            model: &request.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
        };

        let url = self.endpoint.completions_url();
        let response = self
            .endpoint
            .authorize(self.http.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| {
                error!(url = %url, error = %e, "completion request failed");
                UpstreamError::transport(e)
            })?;

        let status = response.status();
        let text = response.text().await.map_err(UpstreamError::transport)?;
        debug!(status = status.as_u16(), bytes = text.len(), "completion response received");

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                detail: truncate_detail(&text),
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| UpstreamError::MissingContent {
                detail: format!("response is not a chat completion: {e}"),
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(|| UpstreamError::MissingContent {
                detail: truncate_detail(&text),
            })
    }
}
