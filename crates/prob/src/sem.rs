//! Linear Gaussian structural equation models on an ADMG.
//!
//! ```text
//! X = B X + ε,    ε ~ N(0, Ω)
//! ```
//!
//! `B[i, j] ≠ 0` only for a directed arc `j → i`; `Ω[i, j] ≠ 0` off the
//! diagonal only for a bidirected arc `i ↔ j`. Parameters are fitted by
//! residual iterative conditional fitting (RICF): each vertex in turn is
//! regressed on its parents and on pseudo-variables built from its spouses'
//! residuals, holding everything else fixed.

use causalq_core::{Dataset, Variable};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::admg::Admg;
use crate::error::EstimatorError;
use crate::regression::ols;

/// Default number of RICF sweeps.
pub const RICF_MAX_ITER: usize = 100;

const RICF_TOL: f64 = 1e-6;

/// A fitted linear Gaussian SEM.
#[derive(Debug, Clone)]
pub struct LinearGaussianSem {
    vertices: Vec<Variable>,
    beta: DMatrix<f64>,
    omega: DMatrix<f64>,
    iterations: usize,
}

impl LinearGaussianSem {
    /// Fit the model for `graph` on `data`.
    ///
    /// Data are centered per column first. Every vertex needs a column.
    pub fn fit(graph: &Admg, data: &Dataset) -> Result<Self, EstimatorError> {
        let d = graph.len();
        let n = data.n_rows();
        if n <= d {
            return Err(EstimatorError::InsufficientData { needed: d, got: n });
        }

        let mut x = DMatrix::zeros(n, d);
        for (j, v) in graph.vertices().iter().enumerate() {
            let col = data
                .column(v.as_str())
                .ok_or_else(|| EstimatorError::MissingColumn {
                    name: v.to_string(),
                })?;
            let mean = col.iter().sum::<f64>() / n as f64;
            for (i, &value) in col.iter().enumerate() {
                x[(i, j)] = value - mean;
            }
        }

        let mut beta = DMatrix::zeros(d, d);
        let mut omega = DMatrix::zeros(d, d);
        for j in 0..d {
            omega[(j, j)] = x.column(j).norm_squared() / n as f64;
        }

        for iter in 0..RICF_MAX_ITER {
            let mut change: f64 = 0.0;
            for i in 0..d {
                change = change.max(ricf_step(graph, &x, &mut beta, &mut omega, i)?);
            }
            if change < RICF_TOL {
                debug!(iterations = iter + 1, "RICF converged");
                return Ok(Self {
                    vertices: graph.vertices().to_vec(),
                    beta,
                    omega,
                    iterations: iter + 1,
                });
            }
        }
        warn!(iterations = RICF_MAX_ITER, "RICF stopped before converging");
        Err(EstimatorError::DidNotConverge {
            iterations: RICF_MAX_ITER,
        })
    }

    /// Directed edge coefficients, `B[child, parent]`.
    pub fn beta(&self) -> &DMatrix<f64> {
        &self.beta
    }

    /// Error covariance.
    pub fn omega(&self) -> &DMatrix<f64> {
        &self.omega
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Total effect of `treatment` on `outcome`: `(I − B)⁻¹[outcome, treatment]`.
    pub fn total_effect(
        &self,
        treatment: &Variable,
        outcome: &Variable,
    ) -> Result<f64, EstimatorError> {
        let pos = |v: &Variable| {
            self.vertices
                .iter()
                .position(|x| x == v)
                .ok_or_else(|| EstimatorError::MissingColumn {
                    name: v.to_string(),
                })
        };
        let (t, y) = (pos(treatment)?, pos(outcome)?);
        let d = self.vertices.len();
        let inverse = (DMatrix::identity(d, d) - &self.beta)
            .try_inverse()
            .ok_or(EstimatorError::Singular {
                context: "total effect",
            })?;
        Ok(inverse[(y, t)])
    }
}

/// One RICF update of vertex `i`. Returns the largest parameter change.
fn ricf_step(
    graph: &Admg,
    x: &DMatrix<f64>,
    beta: &mut DMatrix<f64>,
    omega: &mut DMatrix<f64>,
    i: usize,
) -> Result<f64, EstimatorError> {
    let n = x.nrows();
    let d = x.ncols();
    let parents: Vec<usize> = graph.directed().parents(i).iter().copied().collect();
    let spouses: Vec<usize> = graph.spouses(i).iter().copied().collect();

    // ε = X − X Bᵀ
    let residuals = x - x * beta.transpose();

    let others: Vec<usize> = (0..d).filter(|&j| j != i).collect();
    let pseudo = if spouses.is_empty() {
        None
    } else {
        let omega_rest = omega.select_rows(&others).select_columns(&others);
        let inv = omega_rest
            .try_inverse()
            .ok_or(EstimatorError::Singular { context: "RICF" })?;
        Some((residuals.select_columns(&others) * &inv, inv))
    };

    let k = parents.len() + spouses.len();
    let y: DVector<f64> = x.column(i).into_owned();
    let mut change: f64 = 0.0;

    let resid_var = if k == 0 {
        y.norm_squared() / n as f64
    } else {
        let mut design = DMatrix::zeros(n, k);
        for (c, &p) in parents.iter().enumerate() {
            design.set_column(c, &x.column(p));
        }
        if let Some((z, _)) = &pseudo {
            for (c, s) in spouses.iter().enumerate() {
                let at = others.iter().position(|o| o == s).unwrap_or(0);
                design.set_column(parents.len() + c, &z.column(at));
            }
        }
        let coef = ols(&design, &y)?;
        for (c, &p) in parents.iter().enumerate() {
            change = change.max((beta[(i, p)] - coef[c]).abs());
            beta[(i, p)] = coef[c];
        }
        for (c, &s) in spouses.iter().enumerate() {
            let value = coef[parents.len() + c];
            change = change.max((omega[(i, s)] - value).abs());
            omega[(i, s)] = value;
            omega[(s, i)] = value;
        }
        (y - design * coef).norm_squared() / n as f64
    };

    // Ω_ii = residual variance + ω_{i,-i} Ω_{-i,-i}⁻¹ ω_{-i,i}
    let mut diag = resid_var;
    if let Some((_, inv)) = &pseudo {
        let w = DVector::from_iterator(others.len(), others.iter().map(|&o| omega[(i, o)]));
        diag += (w.transpose() * inv * &w)[(0, 0)];
    }
    change = change.max((omega[(i, i)] - diag).abs());
    omega[(i, i)] = diag;
    Ok(change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use causalq_core::RoleSpec;

    #[test]
    fn test_chain_total_effect_is_product() {
        let data = RoleSpec::new("t", "y")
            .with_mediator("m")
            .generate(3000, 5)
            .unwrap();
        let g = Admg::from_arcs(&["t", "m", "y"], &[("t", "m"), ("m", "y")], &[]).unwrap();
        let sem = LinearGaussianSem::fit(&g, &data).unwrap();
        let effect = sem
            .total_effect(&Variable::new("t"), &Variable::new("y"))
            .unwrap();
        assert!((effect - 4.0).abs() < 0.3, "effect {}", effect);
        assert!((sem.beta()[(1, 0)] - 2.0).abs() < 0.2);
    }

    #[test]
    fn test_bidirected_only_gives_zero_effect() {
        let data = RoleSpec::new("t", "y").generate(500, 3).unwrap();
        let g = Admg::from_arcs(&["t", "y"], &[], &[("t", "y")]).unwrap();
        let sem = LinearGaussianSem::fit(&g, &data).unwrap();
        let effect = sem
            .total_effect(&Variable::new("t"), &Variable::new("y"))
            .unwrap();
        assert_eq!(effect, 0.0);
        assert!(sem.omega()[(0, 1)].abs() > 0.0);
        assert!(effect.is_finite());
    }

    #[test]
    fn test_missing_column() {
        let data = Dataset::from_columns([("t", vec![0.0; 10])]).unwrap();
        let g = Admg::from_arcs(&["t", "y"], &[("t", "y")], &[]).unwrap();
        assert!(matches!(
            LinearGaussianSem::fit(&g, &data),
            Err(EstimatorError::MissingColumn { .. })
        ));
    }
}
