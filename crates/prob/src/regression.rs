//! Least squares and logistic regression over dataset columns.
//!
//! Design matrices are assembled column by column from a [`Dataset`]. Both
//! fits solve their normal equations with a Cholesky factorization, so a
//! rank-deficient design surfaces as [`EstimatorError::Singular`].

use causalq_core::{Dataset, Variable};
use nalgebra::{DMatrix, DVector};
use tracing::trace;

use crate::error::EstimatorError;

/// Maximum Newton steps for [`logistic`].
pub const LOGISTIC_MAX_ITER: usize = 100;

const LOGISTIC_TOL: f64 = 1e-8;
const LOGISTIC_RIDGE: f64 = 1e-6;

/// Fetch one column as a vector.
pub fn column(data: &Dataset, name: &str) -> Result<DVector<f64>, EstimatorError> {
    data.column(name)
        .map(|values| DVector::from_column_slice(values))
        .ok_or_else(|| EstimatorError::MissingColumn {
            name: name.to_string(),
        })
}

/// Build `[1, cols...]` (or just `[cols...]` without an intercept).
pub fn design(
    data: &Dataset,
    cols: &[&Variable],
    intercept: bool,
) -> Result<DMatrix<f64>, EstimatorError> {
    let n = data.n_rows();
    let offset = usize::from(intercept);
    let mut x = DMatrix::from_element(n, cols.len() + offset, 1.0);
    for (j, name) in cols.iter().enumerate() {
        let values = data
            .column(name.as_str())
            .ok_or_else(|| EstimatorError::MissingColumn {
                name: name.to_string(),
            })?;
        for (i, &v) in values.iter().enumerate() {
            x[(i, j + offset)] = v;
        }
    }
    Ok(x)
}

fn check_rows(x: &DMatrix<f64>) -> Result<(), EstimatorError> {
    if x.nrows() <= x.ncols() {
        return Err(EstimatorError::InsufficientData {
            needed: x.ncols(),
            got: x.nrows(),
        });
    }
    Ok(())
}

/// Ordinary least squares coefficients of `y` on `x`.
pub fn ols(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>, EstimatorError> {
    check_rows(x)?;
    let xt = x.transpose();
    let xtx = &xt * x;
    let xty = &xt * y;
    let chol = xtx
        .cholesky()
        .ok_or(EstimatorError::Singular { context: "ols" })?;
    Ok(chol.solve(&xty))
}

/// Logistic regression coefficients of a 0/1 `y` on `x`, fitted by
/// iteratively reweighted least squares with a tiny ridge penalty.
pub fn logistic(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>, EstimatorError> {
    check_rows(x)?;
    let p = x.ncols();
    let mut beta = DVector::zeros(p);

    for iter in 0..LOGISTIC_MAX_ITER {
        let mu = predict_proba(x, &beta);
        let w = mu.map(|m| (m * (1.0 - m)).max(1e-10));

        // Hessian XᵀWX + ridge, gradient Xᵀ(y - μ) - ridge·β
        let mut hessian = DMatrix::zeros(p, p);
        for i in 0..x.nrows() {
            let row = x.row(i);
            hessian += row.transpose() * row * w[i];
        }
        for j in 0..p {
            hessian[(j, j)] += LOGISTIC_RIDGE;
        }
        let gradient = x.transpose() * (y - &mu) - &beta * LOGISTIC_RIDGE;

        let step = hessian
            .cholesky()
            .ok_or(EstimatorError::Singular {
                context: "logistic",
            })?
            .solve(&gradient);
        beta += &step;

        if step.amax() < LOGISTIC_TOL {
            trace!(iterations = iter + 1, "logistic regression converged");
            return Ok(beta);
        }
    }
    Err(EstimatorError::DidNotConverge {
        iterations: LOGISTIC_MAX_ITER,
    })
}

/// Fitted probabilities `σ(xβ)`.
pub fn predict_proba(x: &DMatrix<f64>, beta: &DVector<f64>) -> DVector<f64> {
    (x * beta).map(|z| 1.0 / (1.0 + (-z).exp()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ols_recovers_exact_line() {
        let data = Dataset::from_columns([
            ("x", vec![0.0, 1.0, 2.0, 3.0, 4.0]),
            ("y", vec![1.0, 3.0, 5.0, 7.0, 9.0]),
        ])
        .unwrap();
        let x = design(&data, &[&Variable::new("x")], true).unwrap();
        let y = column(&data, "y").unwrap();
        let beta = ols(&x, &y).unwrap();
        assert!((beta[0] - 1.0).abs() < 1e-9);
        assert!((beta[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_ols_collinear_is_singular() {
        let data = Dataset::from_columns([
            ("a", vec![1.0, 2.0, 3.0, 4.0]),
            ("b", vec![2.0, 4.0, 6.0, 8.0]),
            ("y", vec![0.0, 1.0, 0.0, 1.0]),
        ])
        .unwrap();
        let x = design(&data, &[&Variable::new("a"), &Variable::new("b")], true).unwrap();
        let y = column(&data, "y").unwrap();
        assert!(ols(&x, &y).is_err());
    }

    #[test]
    fn test_too_few_rows() {
        let data = Dataset::from_columns([("x", vec![0.0, 1.0]), ("y", vec![0.0, 1.0])]).unwrap();
        let x = design(&data, &[&Variable::new("x")], true).unwrap();
        let y = column(&data, "y").unwrap();
        assert!(matches!(
            ols(&x, &y),
            Err(EstimatorError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_logistic_balanced_intercept() {
        let y = DVector::from_vec(vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        let x = DMatrix::from_element(6, 1, 1.0);
        let beta = logistic(&x, &y).unwrap();
        assert!(beta[0].abs() < 1e-4);
        let p = predict_proba(&x, &beta);
        assert!((p[0] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_missing_column() {
        let data = Dataset::from_columns([("x", vec![0.0])]).unwrap();
        assert!(matches!(
            column(&data, "nope"),
            Err(EstimatorError::MissingColumn { .. })
        ));
    }
}
