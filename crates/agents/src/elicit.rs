//! Elicitation collaborators.
//!
//! An [`Elicitor`] takes a conversation and a [`PromptSet`] and returns one
//! raw answer per prompt key, together with the transcript it produced. It
//! never retries on its own; that is the builder's job.
//!
//! - [`LlmElicitor`]: asks any [`LlmClient`], one bounded call per prompt
//! - [`FixedElicitor`]: answers from a fixed [`ResponseBundle`]
//! - [`ScriptedElicitor`]: a different bundle (or failure) per call

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use causalq_core::parse::EDGE_ARROW;
use causalq_core::{Capability, CapabilityError, EdgePair, Handles, ResponseBundle, RoleSpec};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ElicitationError;
use crate::llm::LlmClient;
use crate::millis;
use crate::prompt::{PromptKey, PromptSet};
use crate::requests::{Conversation, LlmRequest, Message};

// ============================================================================
// Answers
// ============================================================================

/// Raw answers keyed by prompt, plus the transcript that produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElicitedAnswers {
    answers: BTreeMap<PromptKey, String>,
    transcript: Conversation,
}

impl ElicitedAnswers {
    pub fn new(answers: BTreeMap<PromptKey, String>, transcript: Conversation) -> Self {
        Self {
            answers,
            transcript,
        }
    }

    pub fn get(&self, key: PromptKey) -> Option<&str> {
        self.answers.get(&key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn transcript(&self) -> &Conversation {
        &self.transcript
    }

    /// Regroup the answers into the parser's input.
    ///
    /// Missing observed answers become empty strings, which the parser
    /// rejects. The unobserved section exists only if its variables were
    /// answered.
    pub fn to_bundle(&self) -> ResponseBundle {
        let text = |key| self.get(key).unwrap_or_default().to_string();
        let bundle = ResponseBundle::new(
            text(PromptKey::Treatment),
            text(PromptKey::Outcome),
            text(PromptKey::Covariates),
            text(PromptKey::Edges),
        );
        match self.get(PromptKey::UnobservedVars) {
            Some(vars) => bundle.with_unobserved(
                vars,
                self.get(PromptKey::UnobservedEdges).map(str::to_string),
            ),
            None => bundle,
        }
    }
}

/// The field of `bundle` that answers `key`. The query prompt has none.
fn bundle_answer(bundle: &ResponseBundle, key: PromptKey) -> Option<String> {
    match key {
        PromptKey::Query => None,
        PromptKey::Treatment => Some(bundle.treatment.clone()),
        PromptKey::Outcome => Some(bundle.outcome.clone()),
        PromptKey::Covariates => Some(bundle.covariates.clone()),
        PromptKey::Edges => Some(bundle.edges.clone()),
        PromptKey::UnobservedVars => bundle.unobserved.as_ref().map(|u| u.variables.clone()),
        PromptKey::UnobservedEdges => bundle.unobserved.as_ref().and_then(|u| u.edges.clone()),
    }
}

/// Walk `prompts` in order, answering from `bundle`.
fn answer_from_bundle(
    bundle: &ResponseBundle,
    conversation: Conversation,
    prompts: &PromptSet,
) -> ElicitedAnswers {
    let mut answers = BTreeMap::new();
    let mut transcript = conversation;
    for (key, prompt) in prompts.iter() {
        let Some(answer) = bundle_answer(bundle, key) else {
            continue;
        };
        transcript = transcript.with_exchange(prompt, answer.as_str());
        answers.insert(key, answer);
    }
    ElicitedAnswers::new(answers, transcript)
}

// ============================================================================
// Elicitor Trait
// ============================================================================

/// Something that answers a prompt set.
pub trait Elicitor: Send + Sync {
    /// Ask every prompt in order, threading `conversation` through the calls.
    fn elicit(
        &self,
        conversation: Conversation,
        prompts: &PromptSet,
    ) -> impl Future<Output = Result<ElicitedAnswers, ElicitationError>> + Send;
}

// ============================================================================
// LLM Elicitor
// ============================================================================

/// Sampling and deadline settings for each LLM call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElicitationConfig {
    /// Deadline for a single prompt's answer
    #[serde(with = "millis")]
    pub timeout: Duration,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for ElicitationConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_tokens: 256,
            temperature: 1.0,
            top_p: 0.001,
        }
    }
}

impl ElicitationConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }
}

/// Elicits answers from a language model.
///
/// Each prompt is one blocking capability call run on tokio's blocking pool
/// under [`ElicitationConfig::timeout`].
///
/// A timeout does not cancel a call that has already started: the blocking
/// task runs to completion detached from the elicitation, and whatever it
/// consumes from the client (a scripted answer, a rate-limit slot) is spent.
/// A call still queued for a blocking thread when the timeout fires is
/// skipped.
pub struct LlmElicitor<L: LlmClient> {
    llm: Arc<L>,
    config: ElicitationConfig,
}

impl<L: LlmClient> LlmElicitor<L> {
    pub fn new(llm: Arc<L>, config: ElicitationConfig) -> Self {
        Self { llm, config }
    }

    pub fn with_defaults(llm: Arc<L>) -> Self {
        Self::new(llm, ElicitationConfig::default())
    }

    pub fn config(&self) -> &ElicitationConfig {
        &self.config
    }

    async fn ask(&self, conversation: &Conversation) -> Result<String, ElicitationError> {
        let request = LlmRequest::new(conversation.messages().to_vec())
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature)
            .with_top_p(self.config.top_p);

        let llm = Arc::clone(&self.llm);
        let abandoned = Arc::new(AtomicBool::new(false));
        let skip = Arc::clone(&abandoned);
        let call = tokio::task::spawn_blocking(move || {
            if skip.load(Ordering::Acquire) {
                return Err(CapabilityError::HandlerFailed {
                    message: "abandoned after timeout".to_string(),
                });
            }
            llm.handle(request)
        });
        match tokio::time::timeout(self.config.timeout, call).await {
            Err(_) => {
                abandoned.store(true, Ordering::Release);
                warn!(
                    capability = self.llm.capability_name(),
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "llm call timed out"
                );
                Err(ElicitationError::Timeout {
                    timeout: self.config.timeout,
                })
            }
            Ok(Err(join)) => Err(ElicitationError::Failure(CapabilityError::HandlerFailed {
                message: join.to_string(),
            })),
            Ok(Ok(response)) => Ok(response?.content),
        }
    }
}

impl<L: LlmClient> Elicitor for LlmElicitor<L> {
    async fn elicit(
        &self,
        conversation: Conversation,
        prompts: &PromptSet,
    ) -> Result<ElicitedAnswers, ElicitationError> {
        let mut answers = BTreeMap::new();
        let mut transcript = conversation;
        for (key, prompt) in prompts.iter() {
            let asked = transcript.with(Message::user(prompt));
            let answer = self.ask(&asked).await?;
            debug!(
                capability = self.llm.capability_name(),
                prompt = %key,
                answer = %answer,
                "elicited answer"
            );
            transcript = asked.with(Message::assistant(answer.as_str()));
            answers.insert(key, answer);
        }
        Ok(ElicitedAnswers::new(answers, transcript))
    }
}

// ============================================================================
// Fixed Elicitor
// ============================================================================

/// Answers every prompt set with the same bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedElicitor {
    bundle: ResponseBundle,
}

impl FixedElicitor {
    pub fn new(bundle: ResponseBundle) -> Self {
        Self { bundle }
    }

    /// Answers describing the graph a [`RoleSpec`] expands to.
    pub fn from_roles(roles: &RoleSpec) -> Self {
        let spec = roles.to_graph_spec();
        let covariates = spec
            .other_vars
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self::new(ResponseBundle::new(
            spec.treatment.as_str(),
            spec.outcome.as_str(),
            covariates,
            edge_lines(&spec.edges),
        ))
    }

    /// Stress and sleep, mediated by cortisol, confounded by exercise, with
    /// fatigue as a collider.
    pub fn stress_sleep() -> Self {
        Self::from_roles(&RoleSpec::stress_sleep())
    }

    pub fn bundle(&self) -> &ResponseBundle {
        &self.bundle
    }
}

/// Render edges in the grammar the parser accepts.
pub fn edge_lines(edges: &[EdgePair]) -> String {
    edges
        .iter()
        .map(|(a, b)| format!("{} {} {}", a, EDGE_ARROW, b))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Elicitor for FixedElicitor {
    async fn elicit(
        &self,
        conversation: Conversation,
        prompts: &PromptSet,
    ) -> Result<ElicitedAnswers, ElicitationError> {
        Ok(answer_from_bundle(&self.bundle, conversation, prompts))
    }
}

// ============================================================================
// Scripted Elicitor
// ============================================================================

/// Returns one queued round per call, then fails with
/// [`CapabilityError::Exhausted`].
#[derive(Debug, Default)]
pub struct ScriptedElicitor {
    rounds: Mutex<VecDeque<Result<ResponseBundle, ElicitationError>>>,
    calls: AtomicUsize,
}

impl ScriptedElicitor {
    pub fn new(bundles: impl IntoIterator<Item = ResponseBundle>) -> Self {
        Self::from_results(bundles.into_iter().map(Ok))
    }

    pub fn from_results(
        rounds: impl IntoIterator<Item = Result<ResponseBundle, ElicitationError>>,
    ) -> Self {
        Self {
            rounds: Mutex::new(rounds.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times `elicit` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_round(&self) -> Result<ResponseBundle, ElicitationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rounds
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or(Err(ElicitationError::Failure(CapabilityError::Exhausted {
                capability: "ScriptedElicitor",
            })))
    }
}

impl Elicitor for ScriptedElicitor {
    async fn elicit(
        &self,
        conversation: Conversation,
        prompts: &PromptSet,
    ) -> Result<ElicitedAnswers, ElicitationError> {
        let bundle = self.next_round()?;
        Ok(answer_from_bundle(&bundle, conversation, prompts))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;
    use crate::prompt::PromptConfig;
    use crate::requests::Role;
    use causalq_core::{parse_response, CausalGraph};

    fn prompts(unobserved: bool) -> PromptSet {
        PromptSet::new(
            "Does stress affect sleep?",
            &PromptConfig::default().with_unobserved(unobserved),
        )
    }

    #[tokio::test]
    async fn test_llm_elicitor_threads_history() {
        let llm = Arc::new(ScriptedLlm::new([
            "yes",
            "stress",
            "sleep",
            "exercise",
            "stress -> sleep\nexercise -> stress",
        ]));
        let elicitor = LlmElicitor::with_defaults(Arc::clone(&llm));
        let answers = elicitor
            .elicit(Conversation::fresh("system"), &prompts(false))
            .await
            .unwrap();

        assert_eq!(answers.get(PromptKey::Treatment), Some("stress"));
        assert_eq!(answers.len(), 5);
        // system + 5 questions + 5 answers
        assert_eq!(answers.transcript().len(), 11);

        let seen = llm.requests();
        assert_eq!(seen.len(), 5);
        // Each call sees everything asked and answered before it.
        assert_eq!(seen[0].messages.len(), 2);
        assert_eq!(seen[4].messages.len(), 10);
        assert_eq!(seen[4].messages[2].role, Role::Assistant);
        assert_eq!(seen[4].messages[2].content, "yes");
    }

    #[tokio::test]
    async fn test_llm_failure_surfaces() {
        let llm = Arc::new(ScriptedLlm::new(["yes"]).then_transport_failure("reset"));
        let elicitor = LlmElicitor::with_defaults(llm);
        let err = elicitor
            .elicit(Conversation::new(), &prompts(false))
            .await
            .unwrap_err();
        match err {
            ElicitationError::Failure(cap) => assert!(cap.is_transport()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[derive(Default)]
    struct SlowLlm {
        finished: AtomicUsize,
    }

    impl Capability for SlowLlm {
        fn capability_name(&self) -> &'static str {
            "SlowLlm"
        }
    }

    impl Handles<LlmRequest> for SlowLlm {
        fn handle(
            &self,
            _req: LlmRequest,
        ) -> Result<crate::requests::LlmResponse, CapabilityError> {
            std::thread::sleep(Duration::from_millis(200));
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(crate::requests::LlmResponse::text("late"))
        }
    }

    #[tokio::test]
    async fn test_timeout() {
        let config = ElicitationConfig::default().with_timeout(Duration::from_millis(10));
        let elicitor = LlmElicitor::new(Arc::new(SlowLlm::default()), config);
        let err = elicitor
            .elicit(Conversation::new(), &prompts(false))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ElicitationError::Timeout {
                timeout: Duration::from_millis(10)
            }
        );
    }

    #[tokio::test]
    async fn test_timed_out_call_still_runs_to_completion() {
        let llm = Arc::new(SlowLlm::default());
        let config = ElicitationConfig::default().with_timeout(Duration::from_millis(10));
        let elicitor = LlmElicitor::new(Arc::clone(&llm), config);
        let err = elicitor
            .elicit(Conversation::new(), &prompts(false))
            .await
            .unwrap_err();
        assert!(matches!(err, ElicitationError::Timeout { .. }));
        assert_eq!(llm.finished.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(500)).await;
        // Only the first prompt was sent, and it finished detached.
        assert_eq!(llm.finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_queued_call_is_skipped_after_timeout() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .max_blocking_threads(1)
            .build()
            .unwrap();
        let llm = Arc::new(ScriptedLlm::new(["yes"]));
        let config = ElicitationConfig::default().with_timeout(Duration::from_millis(10));
        let elicitor = LlmElicitor::new(Arc::clone(&llm), config);

        runtime.block_on(async {
            let busy = tokio::task::spawn_blocking(|| {
                std::thread::sleep(Duration::from_millis(200));
            });
            let err = elicitor
                .elicit(Conversation::new(), &prompts(false))
                .await
                .unwrap_err();
            assert!(matches!(err, ElicitationError::Timeout { .. }));
            busy.await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        assert_eq!(llm.remaining(), 1);
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_fixed_stress_sleep_parses() {
        let answers = FixedElicitor::stress_sleep()
            .elicit(Conversation::new(), &prompts(false))
            .await
            .unwrap();
        let spec = parse_response(&answers.to_bundle()).unwrap();
        let graph = CausalGraph::build(spec).unwrap();

        assert_eq!(graph.treatment().as_str(), "stress");
        assert_eq!(graph.outcome().as_str(), "sleep");
        assert!(graph.has_edge("stress", "cortisol_level"));
        assert!(graph.has_edge("exercise", "sleep"));
        assert!(graph.has_edge("sleep", "fatigue"));
        assert!(!graph.has_cycle());
        assert!(answers.get(PromptKey::Query).is_none());
    }

    #[tokio::test]
    async fn test_unobserved_round_trip_through_bundle() {
        let bundle = ResponseBundle::new("t", "y", "", "t -> y")
            .with_unobserved("u", Some("u -> t\nu -> y".to_string()));
        let answers = FixedElicitor::new(bundle.clone())
            .elicit(Conversation::new(), &prompts(true))
            .await
            .unwrap();
        assert_eq!(answers.to_bundle(), bundle);
    }

    #[tokio::test]
    async fn test_unobserved_dropped_when_not_asked() {
        let bundle = ResponseBundle::new("t", "y", "", "t -> y").with_unobserved("u", None);
        let answers = FixedElicitor::new(bundle)
            .elicit(Conversation::new(), &prompts(false))
            .await
            .unwrap();
        assert!(answers.to_bundle().unobserved.is_none());
    }

    #[tokio::test]
    async fn test_scripted_elicitor_sequence() {
        let first = ResponseBundle::new("a", "b", "", "a -> b");
        let second = ResponseBundle::new("c", "d", "", "c -> d");
        let elicitor = ScriptedElicitor::new([first.clone(), second.clone()]);

        let p = prompts(false);
        let got1 = elicitor.elicit(Conversation::new(), &p).await.unwrap();
        let got2 = elicitor.elicit(Conversation::new(), &p).await.unwrap();
        assert_eq!(got1.to_bundle(), first);
        assert_eq!(got2.to_bundle(), second);

        let err = elicitor.elicit(Conversation::new(), &p).await.unwrap_err();
        assert!(matches!(
            err,
            ElicitationError::Failure(CapabilityError::Exhausted { .. })
        ));
        assert_eq!(elicitor.calls(), 3);
    }
}
