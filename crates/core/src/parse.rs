//! Text response parsing.
//!
//! The elicitation step hands back free text. This module is the boundary
//! where that text becomes typed graph-construction input, under a strict
//! grammar:
//!
//! ```text
//! variable-list := name ("," name)*
//! edge-list     := (edge-line "\n")*
//! edge-line     := name "->" name          (blank lines are ignored)
//! ```
//!
//! An edge line that does not match is a [`CoreError::MalformedEdgeLine`] and
//! aborts the whole parse. The unobserved section is an explicit optional
//! ([`UnobservedResponse`]) rather than something inferred from how many
//! answers came back.

use crate::error::CoreError;
use crate::graph::{EdgePair, GraphSpec, UnobservedSpec};
use crate::variable::Variable;
use tracing::{debug, warn};

/// Arrow marker separating source and target on an edge line.
pub const EDGE_ARROW: &str = "->";

/// Raw answers for the unobserved part of a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnobservedResponse {
    /// Comma-separated unobserved variable names
    pub variables: String,
    /// Edge lines involving the unobserved variables, if any were given
    pub edges: Option<String>,
}

/// The raw text fields produced by one elicitation round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseBundle {
    /// Treatment variable name
    pub treatment: String,
    /// Outcome variable name
    pub outcome: String,
    /// Comma-separated covariate names
    pub covariates: String,
    /// Newline-separated `a -> b` lines
    pub edges: String,
    /// Optional unobserved-variable section
    pub unobserved: Option<UnobservedResponse>,
}

impl ResponseBundle {
    /// Create a bundle with only the observed fields.
    pub fn new(
        treatment: impl Into<String>,
        outcome: impl Into<String>,
        covariates: impl Into<String>,
        edges: impl Into<String>,
    ) -> Self {
        Self {
            treatment: treatment.into(),
            outcome: outcome.into(),
            covariates: covariates.into(),
            edges: edges.into(),
            unobserved: None,
        }
    }

    /// Attach an unobserved section.
    pub fn with_unobserved(
        mut self,
        variables: impl Into<String>,
        edges: Option<String>,
    ) -> Self {
        self.unobserved = Some(UnobservedResponse {
            variables: variables.into(),
            edges,
        });
        self
    }
}

/// Split a comma-separated list into canonical variables, skipping blanks.
pub fn parse_variable_list(text: &str) -> Vec<Variable> {
    text.split(',')
        .map(Variable::new)
        .filter(|v| !v.is_empty())
        .collect()
}

/// Parse a single `source -> target` line.
pub fn parse_edge_line(line: &str) -> Result<EdgePair, CoreError> {
    let malformed = |reason: &str| CoreError::MalformedEdgeLine {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = line.split(EDGE_ARROW).collect();
    if parts.len() != 2 {
        return Err(malformed(&format!(
            "expected exactly one '{}', found {}",
            EDGE_ARROW,
            parts.len() - 1
        )));
    }

    let source = Variable::new(parts[0]);
    let target = Variable::new(parts[1]);
    if source.is_empty() || target.is_empty() {
        return Err(malformed("empty endpoint"));
    }
    if source == target {
        return Err(malformed("self-loop"));
    }
    Ok((source, target))
}

/// Parse newline-separated edge lines. Blank lines are skipped.
pub fn parse_edge_list(text: &str) -> Result<Vec<EdgePair>, CoreError> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_edge_line)
        .collect()
}

fn required(value: &str, field: &'static str) -> Result<Variable, CoreError> {
    let var = Variable::new(value);
    if var.is_empty() {
        return Err(CoreError::MissingField { field });
    }
    Ok(var)
}

/// Turn a response bundle into a [`GraphSpec`].
///
/// Fails on a blank treatment/outcome or any malformed observed edge line.
/// A malformed unobserved edge list only drops those edges: the unobserved
/// variables are kept with `edges = None`.
pub fn parse_response(bundle: &ResponseBundle) -> Result<GraphSpec, CoreError> {
    let treatment = required(&bundle.treatment, "treatment")?;
    let outcome = required(&bundle.outcome, "outcome")?;
    let other_vars = parse_variable_list(&bundle.covariates);
    let edges = parse_edge_list(&bundle.edges)?;

    let unobserved = bundle.unobserved.as_ref().map(|section| {
        let variables = parse_variable_list(&section.variables);
        let edges = match section.edges.as_deref() {
            None => {
                debug!("no edges declared for unobserved variables");
                None
            }
            Some(text) => match parse_edge_list(text) {
                Ok(edges) => Some(edges),
                Err(err) => {
                    warn!(error = %err, "dropping unparsable unobserved edge list");
                    None
                }
            },
        };
        UnobservedSpec { variables, edges }
    });

    Ok(GraphSpec {
        treatment,
        outcome,
        other_vars,
        edges,
        unobserved,
    })
}
