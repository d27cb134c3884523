//! Completion Port (Driven Port)
//!
//! Chat-style text completion.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::narrative::ChatPrompt;

/// Chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction.
    System,
    /// User content.
    User,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Author role.
    pub role: Role,
    /// Message text.
    pub content: String,
}

/// Completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    /// Model identifier.
    pub model: String,
    /// Conversation, system message first.
    pub messages: Vec<ChatMessage>,
    /// Reply token limit.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl CompletionRequest {
    /// Build a request from a system/user prompt pair.
    #[must_use]
    pub fn from_prompt(prompt: ChatPrompt, model: &str, max_tokens: u32, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: prompt.system,
                },
                ChatMessage {
                    role: Role::User,
                    content: prompt.user,
                },
            ],
            max_tokens,
            temperature,
        }
    }
}

/// Completion failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    /// No reply within the deadline.
    #[error("completion request timed out")]
    Timeout,

    /// Transport failure.
    #[error("completion network error: {message}")]
    Network {
        /// Error details.
        message: String,
    },

    /// Non-success HTTP status.
    #[error("completion service returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// Reply had no usable content.
    #[error("malformed completion reply: {message}")]
    Malformed {
        /// Error details.
        message: String,
    },

    /// Completion is switched off or has no valid key.
    #[error("completion is disabled")]
    Disabled,
}

impl CompletionError {
    /// Short kind label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Network { .. } => "network",
            Self::Status { .. } => "status",
            Self::Malformed { .. } => "malformed",
            Self::Disabled => "disabled",
        }
    }
}

/// Text completion service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionPort: Send + Sync {
    /// Return the first choice's text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;

    /// Whether calls can succeed at all. Disabled ports are never called.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Port used when completion is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCompletion;

#[async_trait]
impl CompletionPort for DisabledCompletion {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionError> {
        Err(CompletionError::Disabled)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
