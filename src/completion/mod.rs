//! Chat completion boundary
//!
//! Everything that talks to a text-generation backend goes through the
//! [`Completion`] trait. Failures never cross it: an implementation logs what
//! went wrong and answers `None`, which callers treat as "no output".

pub mod openai;

use serde::{Deserialize, Serialize};

/// Chat role, serialized the way OpenAI-compatible APIs expect it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Reasons a completion call produced nothing
#[derive(Debug, thiserror::Error)]
pub enum GenerationFailure {
    #[error("no messages to send")]
    EmptyRequest,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider returned HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("response contained no choices")]
    NoChoices,
    #[error("first choice has no message content")]
    MissingContent,
}

/// A text-generation backend
pub trait Completion {
    /// Generate a reply to `messages`; `None` when generation failed.
    fn generate(&self, messages: &[Message], temperature: f32) -> Option<String>;
}
