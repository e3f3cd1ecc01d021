//! Dense linear algebra for the least-squares engines

use crate::error::{FeatswarmError, Result};
use ndarray::{Array1, Array2};

/// Relative pivot tolerance below which a Gram matrix is treated as singular
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Cholesky factor `L` of a symmetric positive-definite matrix `A = L Lᵀ`
#[derive(Debug, Clone)]
pub struct Cholesky {
    l: Array2<f64>,
}

impl Cholesky {
    /// Factor `a`.
    ///
    /// Fails when `a` is not square or when a pivot collapses relative to
    /// the matching diagonal entry, which is how a rank-deficient design
    /// shows up in `XᵀX`.
    pub fn factor(a: &Array2<f64>) -> Result<Self> {
        let n = a.nrows();
        if n != a.ncols() {
            return Err(FeatswarmError::ShapeError {
                expected: format!("square matrix, {} rows", n),
                actual: format!("{} columns", a.ncols()),
            });
        }

        let mut l = Array2::<f64>::zeros((n, n));

        for i in 0..n {
            for j in 0..=i {
                let mut sum = 0.0;
                for k in 0..j {
                    sum += l[[i, k]] * l[[j, k]];
                }

                if i == j {
                    let diag = a[[i, i]] - sum;
                    let scale = a[[i, i]].abs().max(f64::MIN_POSITIVE);
                    if !diag.is_finite() || diag <= PIVOT_TOLERANCE * scale {
                        return Err(FeatswarmError::ComputationError(format!(
                            "Design matrix is singular (pivot {} at column {})",
                            diag, i
                        )));
                    }
                    l[[i, j]] = diag.sqrt();
                } else {
                    l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
                }
            }
        }

        Ok(Self { l })
    }

    /// Solve `A x = b` by forward then backward substitution
    pub fn solve(&self, b: &Array1<f64>) -> Result<Array1<f64>> {
        let n = self.l.nrows();
        if b.len() != n {
            return Err(FeatswarmError::ShapeError {
                expected: format!("rhs length = {}", n),
                actual: format!("rhs length = {}", b.len()),
            });
        }

        // L y = b
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let mut sum = 0.0;
            for j in 0..i {
                sum += self.l[[i, j]] * y[j];
            }
            y[i] = (b[i] - sum) / self.l[[i, i]];
        }

        // Lᵀ x = y
        let mut x = Array1::zeros(n);
        for i in (0..n).rev() {
            let mut sum = 0.0;
            for j in (i + 1)..n {
                sum += self.l[[j, i]] * x[j];
            }
            x[i] = (y[i] - sum) / self.l[[i, i]];
        }

        Ok(x)
    }
}

/// Least-squares solver for a fixed design `X`, reusable across responses
#[derive(Debug, Clone)]
pub struct LeastSquares {
    xt: Array2<f64>,
    gram: Cholesky,
}

impl LeastSquares {
    /// Factor `XᵀX` once
    pub fn new(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() < x.ncols() {
            return Err(FeatswarmError::ComputationError(format!(
                "{} rows cannot identify {} coefficients",
                x.nrows(),
                x.ncols()
            )));
        }
        let xt = x.t().to_owned();
        let gram = Cholesky::factor(&xt.dot(x))?;
        Ok(Self { xt, gram })
    }

    /// Coefficients minimising `‖y − Xβ‖²`
    pub fn solve(&self, y: &Array1<f64>) -> Result<Array1<f64>> {
        if y.len() != self.xt.ncols() {
            return Err(FeatswarmError::ShapeError {
                expected: format!("y length = {}", self.xt.ncols()),
                actual: format!("y length = {}", y.len()),
            });
        }
        self.gram.solve(&self.xt.dot(y))
    }
}
