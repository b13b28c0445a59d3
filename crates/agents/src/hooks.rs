//! Graph builder hooks for observability.
//!
//! Hooks observe formalization without modifying the retry loop.
//!
//! ## Events
//!
//! - `on_attempt_start`: a fresh elicitation round begins
//! - `on_transition`: the builder moves between states
//! - `on_rejected`: an attempt's answers or elicitation failed
//! - `on_accepted`: an acyclic graph was built
//! - `on_exhausted`: the retry budget ran out
//!
//! ## Example
//!
//! ```ignore
//! struct CountRejections(AtomicUsize);
//!
//! impl BuilderHook for CountRejections {
//!     fn on_rejected(&self, _attempt: usize, _error: &ElicitationError) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use causalq_core::CausalGraph;
use tracing::{debug, info, warn};

use crate::builder::BuilderState;
use crate::elicit::ElicitedAnswers;
use crate::error::ElicitationError;

// ============================================================================
// Builder Hook Trait
// ============================================================================

/// Trait for observing graph builder events.
///
/// All methods have default no-op implementations, so you only need to
/// implement the events you care about. Attempts are 1-indexed.
pub trait BuilderHook: Send + Sync {
    /// Called before eliciting for an attempt.
    fn on_attempt_start(&self, _attempt: usize, _max_attempts: usize) {}

    /// Called on every state change.
    fn on_transition(&self, _attempt: usize, _from: BuilderState, _to: BuilderState) {}

    /// Called when the collaborator has answered every prompt.
    fn on_elicited(&self, _attempt: usize, _answers: &ElicitedAnswers) {}

    /// Called when an attempt fails elicitation or validation.
    fn on_rejected(&self, _attempt: usize, _error: &ElicitationError) {}

    /// Called once with the accepted graph.
    fn on_accepted(&self, _attempt: usize, _graph: &CausalGraph) {}

    /// Called when no attempt is left.
    fn on_exhausted(&self, _attempts: usize) {}
}

// ============================================================================
// Null Hook (Default)
// ============================================================================

/// A no-op hook implementation for when no observation is needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHook;

impl BuilderHook for NullHook {}

// ============================================================================
// Logging Hook
// ============================================================================

/// A hook that emits `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHook {
    /// Also log transitions and raw answers
    pub verbose: bool,
}

impl LoggingHook {
    /// Create a new logging hook.
    pub fn new() -> Self {
        Self { verbose: false }
    }

    /// Create a verbose logging hook.
    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

impl BuilderHook for LoggingHook {
    fn on_attempt_start(&self, attempt: usize, max_attempts: usize) {
        info!(attempt, max_attempts, "formalization attempt starting");
    }

    fn on_transition(&self, attempt: usize, from: BuilderState, to: BuilderState) {
        if self.verbose {
            debug!(attempt, %from, %to, "builder transition");
        }
    }

    fn on_elicited(&self, attempt: usize, answers: &ElicitedAnswers) {
        if self.verbose {
            let bundle = answers.to_bundle();
            debug!(
                attempt,
                treatment = %bundle.treatment,
                outcome = %bundle.outcome,
                covariates = %bundle.covariates,
                "answers received"
            );
        }
    }

    fn on_rejected(&self, attempt: usize, error: &ElicitationError) {
        warn!(attempt, error = %error, "candidate rejected");
    }

    fn on_accepted(&self, attempt: usize, graph: &CausalGraph) {
        info!(
            attempt,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "graph accepted"
        );
    }

    fn on_exhausted(&self, attempts: usize) {
        warn!(attempts, "formalization exhausted");
    }
}

// ============================================================================
// Composite Hook
// ============================================================================

/// A hook that delegates to multiple inner hooks.
pub struct CompositeHook {
    hooks: Vec<Box<dyn BuilderHook>>,
}

impl CompositeHook {
    /// Create a new composite hook.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Add a hook to the composite.
    pub fn with<H: BuilderHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl Default for CompositeHook {
    fn default() -> Self {
        Self::new()
    }
}

impl BuilderHook for CompositeHook {
    fn on_attempt_start(&self, attempt: usize, max_attempts: usize) {
        for hook in &self.hooks {
            hook.on_attempt_start(attempt, max_attempts);
        }
    }

    fn on_transition(&self, attempt: usize, from: BuilderState, to: BuilderState) {
        for hook in &self.hooks {
            hook.on_transition(attempt, from, to);
        }
    }

    fn on_elicited(&self, attempt: usize, answers: &ElicitedAnswers) {
        for hook in &self.hooks {
            hook.on_elicited(attempt, answers);
        }
    }

    fn on_rejected(&self, attempt: usize, error: &ElicitationError) {
        for hook in &self.hooks {
            hook.on_rejected(attempt, error);
        }
    }

    fn on_accepted(&self, attempt: usize, graph: &CausalGraph) {
        for hook in &self.hooks {
            hook.on_accepted(attempt, graph);
        }
    }

    fn on_exhausted(&self, attempts: usize) {
        for hook in &self.hooks {
            hook.on_exhausted(attempts);
        }
    }
}

impl<H: BuilderHook + ?Sized> BuilderHook for std::sync::Arc<H> {
    fn on_attempt_start(&self, attempt: usize, max_attempts: usize) {
        (**self).on_attempt_start(attempt, max_attempts);
    }

    fn on_transition(&self, attempt: usize, from: BuilderState, to: BuilderState) {
        (**self).on_transition(attempt, from, to);
    }

    fn on_elicited(&self, attempt: usize, answers: &ElicitedAnswers) {
        (**self).on_elicited(attempt, answers);
    }

    fn on_rejected(&self, attempt: usize, error: &ElicitationError) {
        (**self).on_rejected(attempt, error);
    }

    fn on_accepted(&self, attempt: usize, graph: &CausalGraph) {
        (**self).on_accepted(attempt, graph);
    }

    fn on_exhausted(&self, attempts: usize) {
        (**self).on_exhausted(attempts);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHook {
        rejected: AtomicUsize,
        accepted: AtomicUsize,
    }

    impl CountingHook {
        fn new() -> Self {
            Self {
                rejected: AtomicUsize::new(0),
                accepted: AtomicUsize::new(0),
            }
        }
    }

    impl BuilderHook for CountingHook {
        fn on_rejected(&self, _attempt: usize, _error: &ElicitationError) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
        }

        fn on_accepted(&self, _attempt: usize, _graph: &CausalGraph) {
            self.accepted.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn graph() -> CausalGraph {
        CausalGraph::build(causalq_core::GraphSpec::new("t", "y").with_edges([("t", "y")]))
            .unwrap()
    }

    #[test]
    fn test_null_hook_is_silent() {
        let hook = NullHook;
        hook.on_attempt_start(1, 3);
        hook.on_accepted(1, &graph());
    }

    #[test]
    fn test_composite_fans_out() {
        let counter = Arc::new(CountingHook::new());
        let hook = CompositeHook::new()
            .with(Arc::clone(&counter))
            .with(Arc::clone(&counter))
            .with(LoggingHook::verbose());
        assert_eq!(hook.len(), 3);

        let err = ElicitationError::Timeout {
            timeout: std::time::Duration::from_secs(1),
        };
        hook.on_rejected(1, &err);
        hook.on_accepted(2, &graph());
        hook.on_transition(2, BuilderState::Validating, BuilderState::Accepted);

        assert_eq!(counter.rejected.load(Ordering::SeqCst), 2);
        assert_eq!(counter.accepted.load(Ordering::SeqCst), 2);
    }
}
