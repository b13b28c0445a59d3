//! LLM client abstraction.
//!
//! Any capability that implements `Handles<LlmRequest>` can back an
//! elicitation. No network client ships here; [`ScriptedLlm`] replays a
//! fixed sequence of answers for tests and demos.

use std::collections::VecDeque;
use std::sync::Mutex;

use causalq_core::capability::{Capability, CapabilityError, Handles};

use crate::requests::{LlmRequest, LlmResponse};

// ============================================================================
// LLM Client Trait
// ============================================================================

/// Trait for LLM clients (convenience trait combining Capability + Handles).
pub trait LlmClient: Capability + Handles<LlmRequest> + Send + Sync {}

impl<T> LlmClient for T where T: Capability + Handles<LlmRequest> + Send + Sync {}

// ============================================================================
// Scripted LLM
// ============================================================================

/// Replays queued answers in order and records every request it sees.
///
/// Once the queue is empty every call fails with
/// [`CapabilityError::Exhausted`].
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<LlmResponse, CapabilityError>>>,
    seen: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    /// Answer with each string in turn.
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(answers.into_iter().map(|a| Ok(LlmResponse::text(a))))
    }

    /// Replay explicit successes and failures.
    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Result<LlmResponse, CapabilityError>>,
    {
        Self {
            responses: Mutex::new(results.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Queue one more answer.
    pub fn then(self, answer: impl Into<String>) -> Self {
        self.push(Ok(LlmResponse::text(answer)));
        self
    }

    /// Queue a transport failure.
    pub fn then_transport_failure(self, message: impl Into<String>) -> Self {
        self.push(Err(CapabilityError::Transport {
            capability: "ScriptedLlm",
            message: message.into(),
        }));
        self
    }

    fn push(&self, item: Result<LlmResponse, CapabilityError>) {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(item);
    }

    /// Number of answers still queued.
    pub fn remaining(&self) -> usize {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Capability for ScriptedLlm {
    fn capability_name(&self) -> &'static str {
        "ScriptedLlm"
    }
}

impl Handles<LlmRequest> for ScriptedLlm {
    fn handle(&self, req: LlmRequest) -> Result<LlmResponse, CapabilityError> {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(req);
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or(Err(CapabilityError::Exhausted {
                capability: "ScriptedLlm",
            }))
    }
}

// ============================================================================
// Tests
// ============================================================================
