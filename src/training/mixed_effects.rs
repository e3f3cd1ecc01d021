//! Random-intercept linear mixed model
//!
//! `y = Xβ + u[g] + ε` with `u[g] ~ N(0, τ²)` and `ε ~ N(0, σ²)`.
//! Variance components are estimated by EM. Each iteration computes the
//! posterior mean and variance of every group intercept, refits β on the
//! response with those intercepts removed, then updates τ² and σ².

use super::config::MixedEffectsConfig;
use super::design::DesignEncoder;
use super::linalg::LeastSquares;
use super::{FittedModel, ModelBackend, ModelKind, ModelSpec};
use crate::dataset::Dataset;
use crate::error::{FeatswarmError, Result};
use ndarray::Array1;
use std::collections::HashMap;

/// Mixed-effects backend
#[derive(Debug, Clone, Default)]
pub struct MixedEffectsBackend {
    config: MixedEffectsConfig,
}

impl MixedEffectsBackend {
    /// Create a backend with the given EM settings
    pub fn new(config: MixedEffectsConfig) -> Self {
        Self { config }
    }
}

/// Fitted random-intercept model
#[derive(Debug, Clone)]
pub struct MixedEffectsFit {
    encoder: DesignEncoder,
    group: String,
    /// Fixed effects, intercept first
    pub fixed_effects: Array1<f64>,
    /// Predicted random intercept per group code seen in training
    random_effects: HashMap<u32, f64>,
    /// Between-group variance τ²
    pub group_variance: f64,
    /// Residual variance σ²
    pub residual_variance: f64,
    /// EM iterations used
    pub n_iter: usize,
}

struct GroupStats {
    /// Dense group index per training row
    member: Vec<usize>,
    /// Group code per dense index
    codes: Vec<u32>,
    sizes: Vec<f64>,
}

impl GroupStats {
    fn new(all_codes: &[u32], rows: &[usize]) -> Self {
        let mut dense: HashMap<u32, usize> = HashMap::new();
        let mut codes = Vec::new();
        let mut sizes = Vec::new();
        let mut member = Vec::with_capacity(rows.len());

        for &r in rows {
            let code = all_codes[r];
            let idx = *dense.entry(code).or_insert_with(|| {
                codes.push(code);
                sizes.push(0.0);
                codes.len() - 1
            });
            sizes[idx] += 1.0;
            member.push(idx);
        }

        Self {
            member,
            codes,
            sizes,
        }
    }

    fn n_groups(&self) -> usize {
        self.codes.len()
    }

    /// Per-group sums of the residuals
    fn residual_sums(&self, resid: &Array1<f64>) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_groups()];
        for (i, &g) in self.member.iter().enumerate() {
            sums[g] += resid[i];
        }
        sums
    }

    /// Posterior means and variances of the group intercepts given
    /// the residuals `y − Xβ`
    fn posterior(&self, resid: &Array1<f64>, tau2: f64, sigma2: f64) -> (Vec<f64>, Vec<f64>) {
        let sums = self.residual_sums(resid);

        let mut means = Vec::with_capacity(self.n_groups());
        let mut vars = Vec::with_capacity(self.n_groups());
        for (g, &n) in self.sizes.iter().enumerate() {
            let shrink = tau2 / (tau2 + sigma2 / n);
            means.push(shrink * sums[g] / n);
            vars.push(shrink * sigma2 / n);
        }
        (means, vars)
    }
}

impl MixedEffectsFit {
    /// Fit by EM on the given rows
    pub fn fit(
        spec: &ModelSpec,
        data: &Dataset,
        rows: &[usize],
        config: &MixedEffectsConfig,
    ) -> Result<Self> {
        let group = spec.group.as_ref().ok_or_else(|| {
            FeatswarmError::ConfigError("Mixed-effects model requires a grouping variable".to_string())
        })?;

        let encoder = DesignEncoder::for_regression(data, &spec.predictors, rows)?;
        let x = encoder.transform(data, rows)?;
        let y = data.numeric_rows(&spec.response, rows)?;
        if y.iter().any(|v| !v.is_finite()) {
            return Err(FeatswarmError::ComputationError(format!(
                "Non-finite values in response '{}'",
                spec.response
            )));
        }

        let groups = GroupStats::new(&data.group_codes(group)?, rows);
        let n = rows.len() as f64;
        let ls = LeastSquares::new(&x)?;

        let y_mean = y.sum() / n;
        let y_var = y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / n;
        let floor = (1e-12 * y_var).max(1e-300);

        // Start from OLS: σ² from the residuals, τ² from the spread of
        // per-group residual means
        let mut beta = ls.solve(&y)?;
        let resid = &y - &x.dot(&beta);
        let mut sigma2 = (resid.iter().map(|r| r * r).sum::<f64>() / n).max(floor);
        let sums = groups.residual_sums(&resid);

        // Likelihood slope in τ² at τ² = 0 has the sign of
        // Σ (S_g² − n_g σ²). Not positive means the maximum sits on the
        // boundary and the fit is the OLS one.
        let slope: f64 = sums
            .iter()
            .zip(&groups.sizes)
            .map(|(s, n_g)| s * s - n_g * sigma2)
            .sum();
        if slope <= 0.0 {
            return Ok(Self {
                encoder,
                group: group.clone(),
                fixed_effects: beta,
                random_effects: groups.codes.iter().map(|&c| (c, 0.0)).collect(),
                group_variance: 0.0,
                residual_variance: sigma2,
                n_iter: 0,
            });
        }

        let mut tau2 = (sums
            .iter()
            .zip(&groups.sizes)
            .map(|(s, n_g)| (s / n_g).powi(2))
            .sum::<f64>()
            / groups.n_groups() as f64)
            .max(1e-3 * sigma2);

        for iter in 1..=config.max_iter {
            let resid = &y - &x.dot(&beta);
            let (u, v) = groups.posterior(&resid, tau2, sigma2);

            let adjusted: Array1<f64> = y
                .iter()
                .zip(&groups.member)
                .map(|(yi, &g)| yi - u[g])
                .collect();
            let beta_new = ls.solve(&adjusted)?;

            let tau2_new = u
                .iter()
                .zip(&v)
                .map(|(m, s)| m * m + s)
                .sum::<f64>()
                / groups.n_groups() as f64;

            let fitted = x.dot(&beta_new);
            let mut ss = 0.0;
            for (i, &g) in groups.member.iter().enumerate() {
                let e = y[i] - fitted[i] - u[g];
                ss += e * e + v[g];
            }
            let sigma2_new = (ss / n).max(floor);

            if !tau2_new.is_finite() || !sigma2_new.is_finite() || beta_new.iter().any(|b| !b.is_finite()) {
                return Err(FeatswarmError::ComputationError(
                    "Mixed model diverged".to_string(),
                ));
            }

            let scale = beta.iter().fold(0.0f64, |m, b| m.max(b.abs()));
            let beta_change = beta_new
                .iter()
                .zip(beta.iter())
                .fold(0.0f64, |m, (a, b)| m.max((a - b).abs()));
            let total = sigma2 + tau2;
            let converged = (beta_change <= config.tol * (1.0 + scale)
                && (tau2_new - tau2).abs() <= config.tol * total
                && (sigma2_new - sigma2).abs() <= config.tol * total)
                || tau2_new < 1e-8 * sigma2_new;

            beta = beta_new;
            tau2 = tau2_new;
            sigma2 = sigma2_new;

            if converged {
                let resid = &y - &x.dot(&beta);
                let (u, _) = groups.posterior(&resid, tau2, sigma2);
                let random_effects = groups.codes.iter().copied().zip(u).collect();

                return Ok(Self {
                    encoder,
                    group: group.clone(),
                    fixed_effects: beta,
                    random_effects,
                    group_variance: tau2,
                    residual_variance: sigma2,
                    n_iter: iter,
                });
            }
        }

        Err(FeatswarmError::ConvergenceError {
            iterations: config.max_iter,
        })
    }

    /// Predicted random intercept for a group code, if it was seen in training
    pub fn random_effect(&self, code: u32) -> Option<f64> {
        self.random_effects.get(&code).copied()
    }
}

impl FittedModel for MixedEffectsFit {
    /// Fixed-effect prediction plus the group's intercept; groups absent
    /// from training contribute nothing
    fn predict(&self, data: &Dataset, rows: &[usize]) -> Result<Array1<f64>> {
        let x = self.encoder.transform(data, rows)?;
        let codes = data.group_codes(&self.group)?;
        let mut pred = x.dot(&self.fixed_effects);
        for (i, &r) in rows.iter().enumerate() {
            pred[i] += self.random_effect(codes[r]).unwrap_or(0.0);
        }
        Ok(pred)
    }
}

impl ModelBackend for MixedEffectsBackend {
    fn kind(&self) -> ModelKind {
        ModelKind::MixedEffects
    }

    fn fit_model(&self, spec: &ModelSpec, data: &Dataset, rows: &[usize]) -> Result<Box<dyn FittedModel>> {
        Ok(Box::new(MixedEffectsFit::fit(spec, data, rows, &self.config)?))
    }
}
