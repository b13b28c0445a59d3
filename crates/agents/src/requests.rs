//! Request and message types for language-model elicitation.
//!
//! These types implement the `Request` trait from core's capability system,
//! enabling type-safe dispatch to anything that `Handles<LlmRequest>`.
//!
//! A [`Conversation`] is an immutable, append-only transcript: appending
//! returns a new value, so each elicitation attempt threads its own history
//! and nothing leaks between attempts.

use causalq_core::capability::Request;
use serde::{Deserialize, Serialize};

// ============================================================================
// Messages
// ============================================================================

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// Conversation
// ============================================================================

/// Ordered message history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// An empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// A conversation that opens with a system prompt.
    pub fn fresh(system_prompt: impl Into<String>) -> Self {
        Self::new().with(Message::system(system_prompt))
    }

    /// Append a message, returning the extended conversation.
    pub fn with(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Append one question and its answer.
    pub fn with_exchange(self, question: impl Into<String>, answer: impl Into<String>) -> Self {
        self.with(Message::user(question))
            .with(Message::assistant(answer))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent message, if any.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

// ============================================================================
// LLM Request/Response
// ============================================================================

/// Request for LLM completion.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    /// Conversation messages, oldest first
    pub messages: Vec<Message>,
    /// Maximum tokens to generate
    pub max_tokens: usize,
    /// Temperature for sampling
    pub temperature: f32,
    /// Nucleus sampling mass
    pub top_p: f32,
}

impl LlmRequest {
    /// Create a new LLM request.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            max_tokens: 256,
            temperature: 1.0,
            top_p: 0.001,
        }
    }

    /// Set max tokens.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set top-p.
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    /// Content of the final user message.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Response from LLM completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmResponse {
    /// Raw text of the answer
    pub content: String,
}

impl LlmResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn as_text(&self) -> &str {
        &self.content
    }
}

impl Request for LlmRequest {
    type Response = LlmResponse;

    fn name() -> &'static str {
        "LlmRequest"
    }
}

// ============================================================================
// Tests
// ============================================================================
