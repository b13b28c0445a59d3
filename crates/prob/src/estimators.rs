//! Point estimators for the average treatment effect.
//!
//! Each estimator takes an identified adjustment artifact (a covariate set,
//! a mediator set, an instrument set) and the data, and returns one number:
//!
//! | Criterion | Estimator |
//! |-----------|-----------|
//! | Backdoor  | `Y ~ T + Z` regression, or Hajek propensity weighting |
//! | Frontdoor | two-stage regression `Σ_m a_m · b_m` |
//! | IV        | two-stage least squares |
//! | Algebraic | augmented inverse propensity weighting |
//!
//! Method names are the strings accepted in configuration; an unknown name
//! is an [`EstimatorError::UnsupportedMethod`].

use causalq_core::{Dataset, Variable};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EstimatorError;
use crate::regression::{column, design, logistic, ols, predict_proba};

/// Propensity scores are clipped into this interval before weighting.
pub const PROPENSITY_CLIP: (f64, f64) = (0.01, 0.99);

// ============================================================================
// Method names
// ============================================================================

/// Estimators available for a backdoor adjustment set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackdoorMethod {
    LinearRegression,
    PropensityScoreWeighting,
}

/// Estimators available for a frontdoor set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrontdoorMethod {
    TwoStageRegression,
}

/// Estimators available for an algebraically identified effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgebraicMethod {
    Aipw,
}

macro_rules! method_names {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn name(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = EstimatorError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($name => Ok($ty::$variant),)+
                    other => Err(EstimatorError::UnsupportedMethod {
                        method: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

method_names!(BackdoorMethod {
    LinearRegression => "linear_regression",
    PropensityScoreWeighting => "propensity_score_weighting",
});
method_names!(FrontdoorMethod {
    TwoStageRegression => "two_stage_regression",
});
method_names!(AlgebraicMethod { Aipw => "aipw" });

// ============================================================================
// Estimators
// ============================================================================

fn binary_treatment(data: &Dataset, treatment: &Variable) -> Result<DVector<f64>, EstimatorError> {
    let t = column(data, treatment.as_str())?;
    if t.iter().any(|&v| v != 0.0 && v != 1.0) {
        return Err(EstimatorError::NonBinaryTreatment {
            name: treatment.to_string(),
        });
    }
    Ok(t)
}

fn propensity(
    data: &Dataset,
    treatment: &Variable,
    covariates: &[Variable],
) -> Result<(DVector<f64>, DVector<f64>), EstimatorError> {
    let t = binary_treatment(data, treatment)?;
    let refs: Vec<&Variable> = covariates.iter().collect();
    let x = design(data, &refs, true)?;
    let beta = logistic(&x, &t)?;
    let (lo, hi) = PROPENSITY_CLIP;
    let e = predict_proba(&x, &beta).map(|p| p.clamp(lo, hi));
    Ok((t, e))
}

/// Backdoor adjustment with the configured method.
pub fn backdoor(
    method: BackdoorMethod,
    data: &Dataset,
    treatment: &Variable,
    outcome: &Variable,
    adjustment: &[Variable],
) -> Result<f64, EstimatorError> {
    match method {
        BackdoorMethod::LinearRegression => {
            backdoor_regression(data, treatment, outcome, adjustment)
        }
        BackdoorMethod::PropensityScoreWeighting => {
            backdoor_weighting(data, treatment, outcome, adjustment)
        }
    }
}

/// Coefficient of the treatment in `Y ~ 1 + T + Z`.
pub fn backdoor_regression(
    data: &Dataset,
    treatment: &Variable,
    outcome: &Variable,
    adjustment: &[Variable],
) -> Result<f64, EstimatorError> {
    let cols: Vec<&Variable> = std::iter::once(treatment).chain(adjustment).collect();
    let x = design(data, &cols, true)?;
    let y = column(data, outcome.as_str())?;
    Ok(ols(&x, &y)?[1])
}

/// Hajek-normalized inverse propensity weighting.
pub fn backdoor_weighting(
    data: &Dataset,
    treatment: &Variable,
    outcome: &Variable,
    adjustment: &[Variable],
) -> Result<f64, EstimatorError> {
    let (t, e) = propensity(data, treatment, adjustment)?;
    let y = column(data, outcome.as_str())?;

    let (mut treated, mut treated_w, mut control, mut control_w) = (0.0, 0.0, 0.0, 0.0);
    for i in 0..y.len() {
        if t[i] == 1.0 {
            treated += y[i] / e[i];
            treated_w += 1.0 / e[i];
        } else {
            control += y[i] / (1.0 - e[i]);
            control_w += 1.0 / (1.0 - e[i]);
        }
    }
    if treated_w == 0.0 || control_w == 0.0 {
        return Err(EstimatorError::NotEstimable {
            criterion: "backdoor",
            reason: "one treatment arm is empty".into(),
        });
    }
    Ok(treated / treated_w - control / control_w)
}

/// Frontdoor two-stage regression.
///
/// Stage one fits `M_j ~ 1 + T` for every mediator, stage two fits
/// `Y ~ 1 + M + T`. The effect is `Σ_j a_j · b_j`.
pub fn frontdoor(
    method: FrontdoorMethod,
    data: &Dataset,
    treatment: &Variable,
    outcome: &Variable,
    mediators: &[Variable],
) -> Result<f64, EstimatorError> {
    let FrontdoorMethod::TwoStageRegression = method;
    if mediators.is_empty() {
        return Err(EstimatorError::NotEstimable {
            criterion: "frontdoor",
            reason: "empty frontdoor set".into(),
        });
    }

    let x_t = design(data, &[treatment], true)?;
    let mut first_stage = Vec::with_capacity(mediators.len());
    for m in mediators {
        let m_col = column(data, m.as_str())?;
        first_stage.push(ols(&x_t, &m_col)?[1]);
    }

    let cols: Vec<&Variable> = mediators.iter().chain(std::iter::once(treatment)).collect();
    let x = design(data, &cols, true)?;
    let y = column(data, outcome.as_str())?;
    let second_stage = ols(&x, &y)?;

    Ok(first_stage
        .iter()
        .enumerate()
        .map(|(j, a)| a * second_stage[j + 1])
        .sum())
}

/// Two-stage least squares with the given instruments.
pub fn instrumental_variable(
    data: &Dataset,
    treatment: &Variable,
    outcome: &Variable,
    instruments: &[Variable],
) -> Result<f64, EstimatorError> {
    if instruments.is_empty() {
        return Err(EstimatorError::NotEstimable {
            criterion: "iv",
            reason: "no instruments".into(),
        });
    }
    let refs: Vec<&Variable> = instruments.iter().collect();
    let z = design(data, &refs, true)?;
    let t = column(data, treatment.as_str())?;
    let t_hat = &z * ols(&z, &t)?;

    let mut x = nalgebra::DMatrix::from_element(t_hat.len(), 2, 1.0);
    x.set_column(1, &t_hat);
    let y = column(data, outcome.as_str())?;
    Ok(ols(&x, &y)?[1])
}

/// Augmented inverse propensity weighting.
///
/// Propensity `e(Z)` from a logistic fit, outcome model `Y ~ 1 + T + Z`:
///
/// ```text
/// ψ = mean( μ₁ − μ₀ + T(Y − μ₁)/e − (1 − T)(Y − μ₀)/(1 − e) )
/// ```
pub fn aipw(
    method: AlgebraicMethod,
    data: &Dataset,
    treatment: &Variable,
    outcome: &Variable,
    covariates: &[Variable],
) -> Result<f64, EstimatorError> {
    let AlgebraicMethod::Aipw = method;
    let (t, e) = propensity(data, treatment, covariates)?;
    let y = column(data, outcome.as_str())?;

    let cols: Vec<&Variable> = std::iter::once(treatment).chain(covariates).collect();
    let mut x = design(data, &cols, true)?;
    let beta = ols(&x, &y)?;

    x.column_mut(1).fill(1.0);
    let mu1 = &x * &beta;
    x.column_mut(1).fill(0.0);
    let mu0 = &x * &beta;

    let n = y.len() as f64;
    let psi: f64 = (0..y.len())
        .map(|i| {
            mu1[i] - mu0[i] + t[i] * (y[i] - mu1[i]) / e[i]
                - (1.0 - t[i]) * (y[i] - mu0[i]) / (1.0 - e[i])
        })
        .sum();
    Ok(psi / n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use causalq_core::{RoleSpec, ROLE_MODEL_ATE};

    fn v(name: &str) -> Variable {
        Variable::new(name)
    }

    fn role_data() -> Dataset {
        RoleSpec::stress_sleep().generate(4000, 17).unwrap()
    }

    #[test]
    fn test_method_names() {
        assert_eq!(
            "propensity_score_weighting".parse::<BackdoorMethod>().unwrap(),
            BackdoorMethod::PropensityScoreWeighting
        );
        assert_eq!(FrontdoorMethod::TwoStageRegression.to_string(), "two_stage_regression");
        assert!(matches!(
            "magic".parse::<AlgebraicMethod>(),
            Err(EstimatorError::UnsupportedMethod { .. })
        ));
    }

    #[test]
    fn test_backdoor_regression_recovers_ate() {
        let est = backdoor_regression(&role_data(), &v("stress"), &v("sleep"), &[v("exercise")])
            .unwrap();
        assert!((est - ROLE_MODEL_ATE).abs() < 0.3, "estimate {}", est);
    }

    #[test]
    fn test_unadjusted_regression_is_biased() {
        let est = backdoor_regression(&role_data(), &v("stress"), &v("sleep"), &[]).unwrap();
        assert!((est - ROLE_MODEL_ATE).abs() > 0.5, "estimate {}", est);
    }

    #[test]
    fn test_backdoor_weighting_recovers_ate() {
        let est = backdoor_weighting(&role_data(), &v("stress"), &v("sleep"), &[v("exercise")])
            .unwrap();
        assert!((est - ROLE_MODEL_ATE).abs() < 0.75, "estimate {}", est);
    }

    #[test]
    fn test_frontdoor_recovers_ate() {
        let est = frontdoor(
            FrontdoorMethod::TwoStageRegression,
            &role_data(),
            &v("stress"),
            &v("sleep"),
            &[v("cortisol_level")],
        )
        .unwrap();
        assert!((est - ROLE_MODEL_ATE).abs() < 0.3, "estimate {}", est);
    }

    #[test]
    fn test_aipw_recovers_ate() {
        let est = aipw(
            AlgebraicMethod::Aipw,
            &role_data(),
            &v("stress"),
            &v("sleep"),
            &[v("exercise")],
        )
        .unwrap();
        assert!((est - ROLE_MODEL_ATE).abs() < 0.4, "estimate {}", est);
    }

    #[test]
    fn test_iv_without_instruments_not_estimable() {
        let err = instrumental_variable(&role_data(), &v("stress"), &v("sleep"), &[]).unwrap_err();
        assert!(matches!(err, EstimatorError::NotEstimable { .. }));
    }

    #[test]
    fn test_weighting_needs_binary_treatment() {
        let err = backdoor_weighting(&role_data(), &v("sleep"), &v("stress"), &[]).unwrap_err();
        assert!(matches!(err, EstimatorError::NonBinaryTreatment { .. }));
    }

    #[test]
    fn test_empty_frontdoor_not_estimable() {
        let err = frontdoor(
            FrontdoorMethod::TwoStageRegression,
            &role_data(),
            &v("stress"),
            &v("sleep"),
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, EstimatorError::NotEstimable { .. }));
    }
}
