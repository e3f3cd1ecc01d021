//! Linear regression backend

use super::design::DesignEncoder;
use super::linalg::LeastSquares;
use super::{FittedModel, ModelBackend, ModelKind, ModelSpec};
use crate::dataset::Dataset;
use crate::error::{FeatswarmError, Result};
use ndarray::Array1;

/// Ordinary least squares with an intercept
#[derive(Debug, Clone, Default)]
pub struct LinearBackend;

impl LinearBackend {
    /// Create a new linear backend
    pub fn new() -> Self {
        Self
    }
}

/// Fitted OLS model
#[derive(Debug, Clone)]
pub struct LinearFit {
    encoder: DesignEncoder,
    /// Intercept first, then one coefficient per design column
    pub coefficients: Array1<f64>,
}

impl LinearFit {
    /// Fit OLS on the given rows
    pub fn fit(spec: &ModelSpec, data: &Dataset, rows: &[usize]) -> Result<Self> {
        let encoder = DesignEncoder::for_regression(data, &spec.predictors, rows)?;
        let x = encoder.transform(data, rows)?;
        let y = data.numeric_rows(&spec.response, rows)?;

        if y.iter().any(|v| !v.is_finite()) {
            return Err(FeatswarmError::ComputationError(format!(
                "Non-finite values in response '{}'",
                spec.response
            )));
        }

        let coefficients = LeastSquares::new(&x)?.solve(&y)?;

        Ok(Self {
            encoder,
            coefficients,
        })
    }

    /// Intercept term
    pub fn intercept(&self) -> f64 {
        self.coefficients[0]
    }
}

impl FittedModel for LinearFit {
    fn predict(&self, data: &Dataset, rows: &[usize]) -> Result<Array1<f64>> {
        let x = self.encoder.transform(data, rows)?;
        Ok(x.dot(&self.coefficients))
    }
}

impl ModelBackend for LinearBackend {
    fn kind(&self) -> ModelKind {
        ModelKind::Linear
    }

    fn fit_model(&self, spec: &ModelSpec, data: &Dataset, rows: &[usize]) -> Result<Box<dyn FittedModel>> {
        Ok(Box::new(LinearFit::fit(spec, data, rows)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;
    use crate::training::FitResult;

    fn linear_data() -> Dataset {
        let x1: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let x2: Vec<f64> = (0..20).map(|i| ((i * 7) % 5) as f64).collect();
        let y: Vec<f64> = x1.iter().zip(&x2).map(|(a, b)| 2.0 + 3.0 * a - 1.5 * b).collect();
        Dataset::new(vec![
            Column::numeric("y", y),
            Column::numeric("x1", x1.clone()),
            Column::numeric("x2", x2),
            Column::numeric("x1_copy", x1),
        ])
        .unwrap()
    }

    #[test]
    fn test_recovers_coefficients() {
        let data = linear_data();
        let rows: Vec<usize> = (0..20).collect();
        let spec = ModelSpec::new("y", vec!["x1".to_string(), "x2".to_string()]);
        let fit = LinearFit::fit(&spec, &data, &rows).unwrap();

        assert!((fit.intercept() - 2.0).abs() < 1e-8);
        assert!((fit.coefficients[1] - 3.0).abs() < 1e-8);
        assert!((fit.coefficients[2] + 1.5).abs() < 1e-8);
    }

    #[test]
    fn test_collinear_predictors_fail() {
        let data = linear_data();
        let rows: Vec<usize> = (0..20).collect();
        let spec = ModelSpec::new("y", vec!["x1".to_string(), "x1_copy".to_string()]);
        let backend = LinearBackend::new();

        let fit = backend.fit(&spec, &data, &rows);
        assert!(fit.is_failed());
        assert!(backend.predict(&fit, &data, &rows).is_err());
    }

    #[test]
    fn test_predict_held_out_rows() {
        let data = linear_data();
        let train: Vec<usize> = (0..15).collect();
        let test: Vec<usize> = (15..20).collect();
        let spec = ModelSpec::new("y", vec!["x1".to_string(), "x2".to_string()]);
        let backend = LinearBackend::new();

        let fit = backend.fit(&spec, &data, &train);
        assert!(matches!(fit, FitResult::Fitted(_)));
        let pred = backend.predict(&fit, &data, &test).unwrap();
        let truth = data.numeric_rows("y", &test).unwrap();
        for (p, t) in pred.iter().zip(truth.iter()) {
            assert!((p - t).abs() < 1e-8);
        }
    }
}
