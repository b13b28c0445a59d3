//! End to end: question in, effect estimates out.
//!
//! ```text
//! query ──GraphBuilder──► Formalized ──infer_causal_effect──► CausalEffect
//! ```
//!
//! [`PipelineConfig`] collects every tunable in one serde-loadable struct so
//! a run can be configured from a JSON file. Missing fields take defaults.

use std::sync::Arc;

use causalq_core::Dataset;
use causalq_prob::{infer_causal_effect, CausalEffect, EstimationConfig, IdentificationConfig};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::builder::{BuilderConfig, Formalized, GraphBuilder, RetryPolicy};
use crate::elicit::{ElicitationConfig, Elicitor, LlmElicitor};
use crate::error::PipelineError;
use crate::hooks::{BuilderHook, NullHook};
use crate::llm::LlmClient;
use crate::prompt::PromptConfig;

// ============================================================================
// Configuration
// ============================================================================

/// Every setting of a query run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub retry: RetryPolicy,
    pub elicitation: ElicitationConfig,
    pub prompts: PromptConfig,
    pub identification: IdentificationConfig,
    pub estimation: EstimationConfig,
}

impl PipelineConfig {
    /// Read a configuration from JSON.
    pub fn from_json(text: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_elicitation(mut self, elicitation: ElicitationConfig) -> Self {
        self.elicitation = elicitation;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptConfig) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_identification(mut self, identification: IdentificationConfig) -> Self {
        self.identification = identification;
        self
    }

    pub fn with_estimation(mut self, estimation: EstimationConfig) -> Self {
        self.estimation = estimation;
        self
    }

    pub fn builder_config(&self) -> BuilderConfig {
        BuilderConfig::default()
            .with_retry(self.retry)
            .with_prompts(self.prompts)
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// The formalized graph and its estimated effect.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub query: String,
    pub formalized: Formalized,
    pub effect: CausalEffect,
}

impl QueryOutcome {
    /// The headline estimate.
    pub fn effect(&self) -> Option<f64> {
        self.effect.effect()
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Formalizes a query, then identifies and estimates its effect.
pub struct QueryPipeline<E: Elicitor, H: BuilderHook = NullHook> {
    builder: GraphBuilder<E, H>,
    config: PipelineConfig,
    data: Option<Dataset>,
}

impl<E: Elicitor> QueryPipeline<E> {
    pub fn new(elicitor: E, config: PipelineConfig) -> Self {
        Self {
            builder: GraphBuilder::new(elicitor, config.builder_config()),
            config,
            data: None,
        }
    }
}

impl<L: LlmClient> QueryPipeline<LlmElicitor<L>> {
    /// A pipeline that elicits from `llm` with `config.elicitation`.
    pub fn with_llm(llm: Arc<L>, config: PipelineConfig) -> Self {
        let elicitor = LlmElicitor::new(llm, config.elicitation);
        Self::new(elicitor, config)
    }
}

impl<E: Elicitor, H: BuilderHook> QueryPipeline<E, H> {
    /// Observe the formalization loop.
    pub fn with_hook<H2: BuilderHook>(self, hook: H2) -> QueryPipeline<E, H2> {
        QueryPipeline {
            builder: self.builder.with_hook(hook),
            config: self.config,
            data: self.data,
        }
    }

    /// Estimate on `data` instead of synthesizing it from the graph.
    pub fn with_data(mut self, data: Dataset) -> Self {
        self.data = Some(data);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn builder(&self) -> &GraphBuilder<E, H> {
        &self.builder
    }

    /// Run a query to completion.
    pub async fn run(&self, query: &str) -> Result<QueryOutcome, PipelineError> {
        let formalized = self.builder.formalize(query).await?;
        let effect = infer_causal_effect(
            &formalized.graph,
            self.data.as_ref(),
            &self.config.identification,
            &self.config.estimation,
        )?;
        info!(
            query,
            path = %effect.identification.kind(),
            effect = ?effect.effect(),
            "query answered"
        );
        Ok(QueryOutcome {
            query: query.to_string(),
            formalized,
            effect,
        })
    }
}
