//! # Agents - From Question to Causal Graph
//!
//! Elicits a causal model for a natural-language question from a language
//! model (or a scripted stand-in), validates it, and hands the accepted
//! graph to identification and estimation.
//!
//! ## Quick Start
//!
//! ```rust
//! use causalq_agents::{FixedElicitor, PipelineConfig, QueryPipeline};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let pipeline = QueryPipeline::new(FixedElicitor::stress_sleep(), PipelineConfig::default());
//! let outcome = pipeline.run("Does stress affect sleep?").await.unwrap();
//!
//! println!("{}", outcome.formalized.graph.to_dot());
//! println!("effect: {:?}", outcome.effect());
//! # });
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        causalq-agents                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  requests.rs   Message, Conversation, LlmRequest (impl Request) │
//! │  llm.rs        LlmClient, ScriptedLlm (impl Handles<LlmRequest>)│
//! │  prompt.rs     PromptKey, PromptSet, PromptConfig               │
//! │  elicit.rs     Elicitor, LlmElicitor, Fixed/ScriptedElicitor    │
//! │  hooks.rs      BuilderHook, LoggingHook, CompositeHook          │
//! │  builder.rs    GraphBuilder retry loop, RetryPolicy             │
//! │  pipeline.rs   QueryPipeline, PipelineConfig                    │
//! └───────────────┬───────────────────────────────┬─────────────────┘
//!                 │ uses                          │ uses
//!                 ▼                               ▼
//! ┌───────────────────────────────┐ ┌───────────────────────────────┐
//! │ causalq-core                  │ │ causalq-prob                  │
//! │ parse, CausalGraph, Handles<R>│ │ identification, estimation    │
//! └───────────────────────────────┘ └───────────────────────────────┘
//! ```

pub mod builder;
pub mod elicit;
mod error;
pub mod hooks;
pub mod llm;
mod millis;
pub mod pipeline;
pub mod prompt;
pub mod requests;

pub use builder::{
    validate, AttemptOutcome, AttemptRecord, BuilderConfig, BuilderState, Formalized,
    GraphBuilder, RetryPolicy,
};
pub use elicit::{
    ElicitationConfig, ElicitedAnswers, Elicitor, FixedElicitor, LlmElicitor, ScriptedElicitor,
};
pub use error::{ElicitationError, PipelineError};
pub use hooks::{BuilderHook, CompositeHook, LoggingHook, NullHook};
pub use llm::{LlmClient, ScriptedLlm};
pub use pipeline::{PipelineConfig, QueryOutcome, QueryPipeline};
pub use prompt::{PromptConfig, PromptKey, PromptSet, PromptStyle};
pub use requests::{Conversation, LlmRequest, LlmResponse, Message, Role};
