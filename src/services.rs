//! The upstream completion capability consumed by the gateway.
//!
//! Two implementations exist outside this crate: a conversational model and a
//! web-augmented model that may embed source citations in its output. The
//! core only ever talks to the [`ChatService`] trait.

use crate::conversation::Role;
use crate::error::ServiceError;
use async_trait::async_trait;
use std::fmt;

/// Which upstream completion service produced (or should produce) a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// The plain conversational model.
    Conversational,
    /// The web-augmented model with citation support.
    WebSearch,
}

impl ServiceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceKind::Conversational => "conversational",
            ServiceKind::WebSearch => "web-search",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of model context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// A single completion request as handed to a wire-level client.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub history: Vec<ChatMessage>,
    pub user_message: String,
    pub max_tokens: u32,
}

/// An upstream text-completion service, reachable only via network I/O.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Stable name used in logs and breaker state.
    fn name(&self) -> &str;

    /// Produce a completion for `request`.
    ///
    /// Implementations classify their failures into [`ServiceError`] kinds;
    /// the retry policy and circuit breaker act on that classification.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError>;
}
