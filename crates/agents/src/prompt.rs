//! The fixed question sequence asked of the elicitation collaborator.
//!
//! One prompt per [`PromptKey`], asked in declaration order within a single
//! conversation. The answer to [`PromptKey::Query`] is kept in the transcript
//! but never parsed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one question in the elicitation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKey {
    Query,
    Treatment,
    Outcome,
    Covariates,
    Edges,
    UnobservedVars,
    UnobservedEdges,
}

impl PromptKey {
    /// Keys asked for every query.
    pub const OBSERVED: [PromptKey; 5] = [
        PromptKey::Query,
        PromptKey::Treatment,
        PromptKey::Outcome,
        PromptKey::Covariates,
        PromptKey::Edges,
    ];

    /// Keys asked only when unobserved variables are requested.
    pub const UNOBSERVED: [PromptKey; 2] = [PromptKey::UnobservedVars, PromptKey::UnobservedEdges];

    pub fn name(&self) -> &'static str {
        match self {
            PromptKey::Query => "query",
            PromptKey::Treatment => "treatment",
            PromptKey::Outcome => "outcome",
            PromptKey::Covariates => "covariates",
            PromptKey::Edges => "edges",
            PromptKey::UnobservedVars => "unobserved_vars",
            PromptKey::UnobservedEdges => "unobserved_edges",
        }
    }
}

impl fmt::Display for PromptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How much the covariate and unobserved prompts ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStyle {
    /// A handful of covariates and a single unobserved confounder.
    #[default]
    Compact,
    /// As many covariates as the model warrants.
    Comprehensive,
}

/// Prompt selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub style: PromptStyle,
    /// Also ask for unobserved variables and their edges
    pub include_unobserved: bool,
}

impl PromptConfig {
    pub fn with_style(mut self, style: PromptStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_unobserved(mut self, include: bool) -> Self {
        self.include_unobserved = include;
        self
    }
}

const SYSTEM_PROMPT: &str = "You help build a causal graph for a question. \
Answers are parsed by a program, so reply with names only: no explanations, \
no numbering, no trailing periods.";

/// The system prompt and keyed questions for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    query: String,
    prompts: Vec<(PromptKey, String)>,
}

impl PromptSet {
    pub fn new(query: impl Into<String>, config: &PromptConfig) -> Self {
        let query = query.into();
        let compact = config.style == PromptStyle::Compact;

        let mut prompts = vec![
            (
                PromptKey::Query,
                format!("The question of interest is: {}", query.trim_end_matches('?')),
            ),
            (
                PromptKey::Treatment,
                "What is the treatment variable?".to_string(),
            ),
            (
                PromptKey::Outcome,
                "What is the outcome variable?".to_string(),
            ),
            (
                PromptKey::Covariates,
                if compact {
                    "Name 5 other variables this model should account for, separated by commas."
                } else {
                    "List every other variable of interest, including confounders, mediators \
                     and colliders, separated by commas."
                }
                .to_string(),
            ),
            (
                PromptKey::Edges,
                "List the edges between these variables, one per line, as `a -> b`. \
                 The edges must not form a cycle."
                    .to_string(),
            ),
        ];

        if config.include_unobserved {
            prompts.push((
                PromptKey::UnobservedVars,
                if compact {
                    "Name one unobserved variable of this model. It must be a confounder."
                } else {
                    "Which unobserved variables, especially confounders, could affect this \
                     model? Separate them by commas."
                }
                .to_string(),
            ));
            prompts.push((
                PromptKey::UnobservedEdges,
                "List the edges involving the unobserved variables, one per line, as `a -> b`."
                    .to_string(),
            ));
        }

        Self { query, prompts }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn system(&self) -> &str {
        SYSTEM_PROMPT
    }

    /// Prompts in asking order.
    pub fn iter(&self) -> impl Iterator<Item = (PromptKey, &str)> {
        self.prompts.iter().map(|(k, p)| (*k, p.as_str()))
    }

    pub fn get(&self, key: PromptKey) -> Option<&str> {
        self.iter().find(|(k, _)| *k == key).map(|(_, p)| p)
    }

    pub fn keys(&self) -> Vec<PromptKey> {
        self.prompts.iter().map(|(k, _)| *k).collect()
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observed_only_by_default() {
        let set = PromptSet::new("Does stress affect sleep?", &PromptConfig::default());
        assert_eq!(set.keys(), PromptKey::OBSERVED.to_vec());
        assert!(set.get(PromptKey::UnobservedVars).is_none());
        assert!(set.get(PromptKey::Query).unwrap().ends_with("affect sleep"));
    }

    #[test]
    fn test_unobserved_prompts_appended() {
        let config = PromptConfig::default().with_unobserved(true);
        let set = PromptSet::new("q", &config);
        assert_eq!(set.len(), 7);
        assert_eq!(&set.keys()[5..], &PromptKey::UNOBSERVED);
    }

    #[test]
    fn test_styles_differ() {
        let compact = PromptSet::new("q", &PromptConfig::default());
        let full = PromptSet::new(
            "q",
            &PromptConfig::default().with_style(PromptStyle::Comprehensive),
        );
        assert_ne!(
            compact.get(PromptKey::Covariates),
            full.get(PromptKey::Covariates)
        );
        assert_eq!(compact.get(PromptKey::Edges), full.get(PromptKey::Edges));
    }

    #[test]
    fn test_config_from_json() {
        let config: PromptConfig =
            serde_json::from_str(r#"{"style": "comprehensive", "include_unobserved": true}"#)
                .unwrap();
        assert_eq!(config.style, PromptStyle::Comprehensive);
        assert!(config.include_unobserved);
        assert_eq!(PromptKey::UnobservedEdges.to_string(), "unobserved_edges");
    }
}
