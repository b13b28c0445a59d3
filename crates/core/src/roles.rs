//! # Role-Based Scenarios
//!
//! A [`RoleSpec`] names variables by the role they play around a
//! treatment/outcome pair and expands into the canonical graph:
//!
//! ```text
//!   C ──► T ──► M ──► Y ◄── C
//!         │           │
//!         └──► K ◄────┘
//! ```
//!
//! [`RoleSpec::generate`] draws data from a fixed linear model over that
//! graph with a known average treatment effect of [`ROLE_MODEL_ATE`], which
//! makes it a ground truth for the estimators.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::CoreError;
use crate::graph::{EdgePair, GraphSpec};
use crate::variable::Variable;

/// Average effect of the treatment on the outcome in [`RoleSpec::generate`].
pub const ROLE_MODEL_ATE: f64 = 4.0;

const TREATMENT_THRESHOLD: f64 = 1.0;

/// Variables grouped by causal role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub treatment: Variable,
    pub outcome: Variable,
    #[serde(default)]
    pub mediator: Option<Variable>,
    #[serde(default)]
    pub confounders: Vec<Variable>,
    #[serde(default)]
    pub colliders: Vec<Variable>,
}

impl RoleSpec {
    pub fn new(treatment: impl Into<Variable>, outcome: impl Into<Variable>) -> Self {
        Self {
            treatment: treatment.into(),
            outcome: outcome.into(),
            mediator: None,
            confounders: Vec::new(),
            colliders: Vec::new(),
        }
    }

    pub fn with_mediator(mut self, mediator: impl Into<Variable>) -> Self {
        self.mediator = Some(mediator.into());
        self
    }

    pub fn with_confounder(mut self, confounder: impl Into<Variable>) -> Self {
        self.confounders.push(confounder.into());
        self
    }

    pub fn with_collider(mut self, collider: impl Into<Variable>) -> Self {
        self.colliders.push(collider.into());
        self
    }

    /// Stress affecting sleep through cortisol, confounded by exercise,
    /// with fatigue as a collider.
    pub fn stress_sleep() -> Self {
        Self::new("stress", "sleep")
            .with_mediator("cortisol_level")
            .with_confounder("exercise")
            .with_collider("fatigue")
    }

    /// Expand into a graph spec.
    ///
    /// Without a mediator the treatment points at the outcome directly.
    pub fn to_graph_spec(&self) -> GraphSpec {
        let t = &self.treatment;
        let y = &self.outcome;
        let mut edges: Vec<EdgePair> = Vec::new();

        match &self.mediator {
            Some(m) => {
                edges.push((t.clone(), m.clone()));
                edges.push((m.clone(), y.clone()));
            }
            None => edges.push((t.clone(), y.clone())),
        }
        for c in &self.confounders {
            edges.push((c.clone(), t.clone()));
            edges.push((c.clone(), y.clone()));
        }
        for k in &self.colliders {
            edges.push((t.clone(), k.clone()));
            edges.push((y.clone(), k.clone()));
        }

        let other_vars = self
            .mediator
            .iter()
            .chain(&self.confounders)
            .chain(&self.colliders)
            .cloned()
            .collect();

        GraphSpec {
            treatment: t.clone(),
            outcome: y.clone(),
            other_vars,
            edges,
            unobserved: None,
        }
    }

    /// Draw `n` seeded rows from the role model.
    ///
    /// ```text
    /// C ~ N(0, 2)
    /// T = 1[ΣC + N(0, 2) > 1]
    /// M = 2T + N(0, 1)
    /// Y = 2M + ΣC + N(0, 1)        (4T + ΣC + N(0, 1) without a mediator)
    /// K = Y + 5T + N(0, 1)
    /// ```
    pub fn generate(&self, n: usize, seed: u64) -> Result<Dataset, CoreError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut noise = |scale: f64| -> Vec<f64> {
            (0..n)
                .map(|_| scale * rng.sample::<f64, _>(StandardNormal))
                .collect()
        };

        let confounders: Vec<Vec<f64>> = self.confounders.iter().map(|_| noise(2.0)).collect();
        let confounding: Vec<f64> = (0..n)
            .map(|i| confounders.iter().map(|c| c[i]).sum())
            .collect();

        let treatment: Vec<f64> = noise(2.0)
            .into_iter()
            .zip(&confounding)
            .map(|(e, c)| if c + e > TREATMENT_THRESHOLD { 1.0 } else { 0.0 })
            .collect();

        let mediator: Option<Vec<f64>> = self.mediator.as_ref().map(|_| {
            noise(1.0)
                .into_iter()
                .zip(&treatment)
                .map(|(e, t)| 2.0 * t + e)
                .collect()
        });

        let direct: Vec<f64> = match &mediator {
            Some(m) => m.iter().map(|v| 2.0 * v).collect(),
            None => treatment.iter().map(|t| ROLE_MODEL_ATE * t).collect(),
        };
        let outcome: Vec<f64> = noise(1.0)
            .into_iter()
            .zip(direct.iter().zip(&confounding))
            .map(|(e, (d, c))| d + c + e)
            .collect();

        let colliders: Vec<Vec<f64>> = self
            .colliders
            .iter()
            .map(|_| {
                noise(1.0)
                    .into_iter()
                    .zip(outcome.iter().zip(&treatment))
                    .map(|(e, (y, t))| y + 5.0 * t + e)
                    .collect()
            })
            .collect();

        let mut data = Dataset::new();
        data.push_column(self.treatment.clone(), treatment)?;
        data.push_column(self.outcome.clone(), outcome)?;
        if let (Some(name), Some(values)) = (&self.mediator, mediator) {
            data.push_column(name.clone(), values)?;
        }
        for (name, values) in self.confounders.iter().zip(confounders) {
            data.push_column(name.clone(), values)?;
        }
        for (name, values) in self.colliders.iter().zip(colliders) {
            data.push_column(name.clone(), values)?;
        }
        Ok(data)
    }
}
