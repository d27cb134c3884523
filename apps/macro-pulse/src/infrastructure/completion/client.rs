//! OpenAI-compatible chat completion client.

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::ports::{CompletionError, CompletionPort, CompletionRequest};
use crate::domain::shared::truncate_chars;
use crate::infrastructure::config::{CompletionSettings, Secret};

/// Longest error body kept from a failed call.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Chat completion client for `POST {base_url}/chat/completions`.
#[derive(Debug)]
pub struct ChatCompletionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<Secret>,
    enabled: bool,
}

impl ChatCompletionClient {
    /// Create a client from settings.
    ///
    /// The HTTP client timeout is the report deadline; callers bound
    /// shorter calls themselves.
    pub fn new(settings: &CompletionSettings) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout.max(settings.commentary_timeout))
            .build()
            .map_err(|e| CompletionError::Network {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key: settings.api_key.clone(),
            enabled: settings.is_usable(),
        })
    }
}

#[async_trait]
impl CompletionPort for ChatCompletionClient {
    #[tracing::instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let Some(key) = self.api_key.as_ref().filter(|_| self.enabled) else {
            return Err(CompletionError::Disabled);
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: truncate_chars(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        let reply: ChatCompletionResponse =
            response.json().await.map_err(|e| CompletionError::Malformed {
                message: e.to_string(),
            })?;

        first_choice_text(reply)
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

fn classify_transport(err: &reqwest::Error) -> CompletionError {
    if err.is_timeout() {
        CompletionError::Timeout
    } else {
        CompletionError::Network {
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

fn first_choice_text(reply: ChatCompletionResponse) -> Result<String, CompletionError> {
    let choice = reply
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionError::Malformed {
            message: "reply has no choices".to_string(),
        })?;

    choice
        .message
        .content
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| CompletionError::Malformed {
            message: "first choice has no content".to_string(),
        })
}
