//! Query formalization: elicit, validate, accept or retry.
//!
//! ```text
//!            ┌────────────────────────────────────────┐
//!            ▼                                        │
//!       Eliciting ──► Validating ──► Accepted         │
//!            │             │                          │
//!            └─────────────┴──────► Retrying ─────────┘
//! ```
//!
//! Every attempt starts from a fresh conversation. A candidate that fails
//! to parse, fails to build, or contains a cycle is discarded whole and the
//! next attempt begins after an exponential backoff. When the policy's
//! attempts are spent the builder returns [`ElicitationError::Exhausted`].

use std::fmt;
use std::time::Duration;

use causalq_core::{parse_response, CausalGraph};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::elicit::{ElicitedAnswers, Elicitor};
use crate::error::ElicitationError;
use crate::hooks::{BuilderHook, NullHook};
use crate::millis;
use crate::prompt::{PromptConfig, PromptSet};
use crate::requests::Conversation;

// ============================================================================
// State
// ============================================================================

/// Where the builder is within one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuilderState {
    Eliciting,
    Validating,
    Accepted,
    Retrying,
}

impl fmt::Display for BuilderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuilderState::Eliciting => "eliciting",
            BuilderState::Validating => "validating",
            BuilderState::Accepted => "accepted",
            BuilderState::Retrying => "retrying",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: usize,
    #[serde(with = "millis")]
    pub initial_backoff: Duration,
    #[serde(with = "millis")]
    pub max_backoff: Duration,
    /// Retry after transport failures and timeouts, not only invalid graphs
    pub retry_transport_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(4),
            retry_transport_errors: true,
        }
    }
}

impl RetryPolicy {
    /// Retry immediately, up to `max_attempts` attempts.
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max: usize) -> Self {
        self.max_attempts = max;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_retry_transport_errors(mut self, retry: bool) -> Self {
        self.retry_transport_errors = retry;
        self
    }

    pub fn attempts(&self) -> usize {
        self.max_attempts.max(1)
    }

    /// Delay after failed attempt `attempt` (1-indexed): doubling from
    /// `initial_backoff`, capped at `max_backoff`.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Whether an attempt that failed with `error` may be followed by another.
    pub fn is_retryable(&self, error: &ElicitationError) -> bool {
        match error {
            ElicitationError::Invalid(_) => true,
            ElicitationError::Timeout { .. } => self.retry_transport_errors,
            ElicitationError::Failure(cap) => self.retry_transport_errors && cap.is_transport(),
            ElicitationError::Exhausted { .. } => false,
        }
    }
}

/// Graph builder settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuilderConfig {
    pub retry: RetryPolicy,
    pub prompts: PromptConfig,
}

impl BuilderConfig {
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptConfig) -> Self {
        self.prompts = prompts;
        self
    }
}

// ============================================================================
// Result
// ============================================================================

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Accepted,
    Rejected(ElicitationError),
}

/// One entry of the attempt trace.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub attempt: usize,
    pub outcome: AttemptOutcome,
}

/// An accepted graph and how it was reached.
#[derive(Debug, Clone)]
pub struct Formalized {
    pub graph: CausalGraph,
    /// Answers from the accepted attempt
    pub answers: ElicitedAnswers,
    /// Every attempt in order, the last one accepted
    pub attempts: Vec<AttemptRecord>,
}

impl Formalized {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// Errors of the rejected attempts.
    pub fn rejections(&self) -> impl Iterator<Item = &ElicitationError> {
        self.attempts.iter().filter_map(|r| match &r.outcome {
            AttemptOutcome::Rejected(err) => Some(err),
            AttemptOutcome::Accepted => None,
        })
    }
}

/// Parse, build and cycle-check one candidate.
pub fn validate(answers: &ElicitedAnswers) -> Result<CausalGraph, ElicitationError> {
    let spec = parse_response(&answers.to_bundle())?;
    let graph = CausalGraph::build(spec)?;
    graph.topological_order()?;
    Ok(graph)
}

// ============================================================================
// Graph Builder
// ============================================================================

/// Drives an [`Elicitor`] until it yields a valid acyclic graph.
pub struct GraphBuilder<E: Elicitor, H: BuilderHook = NullHook> {
    elicitor: E,
    hook: H,
    config: BuilderConfig,
}

impl<E: Elicitor> GraphBuilder<E> {
    /// Create a builder without hooks.
    pub fn new(elicitor: E, config: BuilderConfig) -> Self {
        Self {
            elicitor,
            hook: NullHook,
            config,
        }
    }

    pub fn with_defaults(elicitor: E) -> Self {
        Self::new(elicitor, BuilderConfig::default())
    }
}

impl<E: Elicitor, H: BuilderHook> GraphBuilder<E, H> {
    /// Replace the hook.
    pub fn with_hook<H2: BuilderHook>(self, hook: H2) -> GraphBuilder<E, H2> {
        GraphBuilder {
            elicitor: self.elicitor,
            hook,
            config: self.config,
        }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn elicitor(&self) -> &E {
        &self.elicitor
    }

    fn transition(&self, attempt: usize, from: &mut BuilderState, to: BuilderState) {
        debug!(attempt, from = %from, to = %to, "builder transition");
        self.hook.on_transition(attempt, *from, to);
        *from = to;
    }

    /// Formalize `query` into an accepted causal graph.
    pub async fn formalize(&self, query: &str) -> Result<Formalized, ElicitationError> {
        let prompts = PromptSet::new(query, &self.config.prompts);
        let policy = self.config.retry;
        let max_attempts = policy.attempts();
        let mut attempts = Vec::with_capacity(max_attempts);
        let mut last = None;
        let mut state = BuilderState::Eliciting;

        info!(query, max_attempts, "formalizing query");

        for attempt in 1..=max_attempts {
            if state != BuilderState::Eliciting {
                self.transition(attempt, &mut state, BuilderState::Eliciting);
            }
            self.hook.on_attempt_start(attempt, max_attempts);

            let conversation = Conversation::fresh(prompts.system());
            let result = match self.elicitor.elicit(conversation, &prompts).await {
                Ok(answers) => {
                    self.hook.on_elicited(attempt, &answers);
                    self.transition(attempt, &mut state, BuilderState::Validating);
                    validate(&answers).map(|graph| (graph, answers))
                }
                Err(err) => Err(err),
            };

            match result {
                Ok((graph, answers)) => {
                    self.transition(attempt, &mut state, BuilderState::Accepted);
                    self.hook.on_accepted(attempt, &graph);
                    attempts.push(AttemptRecord {
                        attempt,
                        outcome: AttemptOutcome::Accepted,
                    });
                    return Ok(Formalized {
                        graph,
                        answers,
                        attempts,
                    });
                }
                Err(err) => {
                    warn!(attempt, error = %err, "attempt rejected");
                    self.hook.on_rejected(attempt, &err);
                    attempts.push(AttemptRecord {
                        attempt,
                        outcome: AttemptOutcome::Rejected(err.clone()),
                    });
                    if !policy.is_retryable(&err) {
                        return Err(err);
                    }
                    last = Some(err);
                    if attempt < max_attempts {
                        self.transition(attempt, &mut state, BuilderState::Retrying);
                        let delay = policy.backoff(attempt);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        self.hook.on_exhausted(max_attempts);
        Err(ElicitationError::Exhausted {
            attempts: max_attempts,
            last: last.map(Box::new),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
