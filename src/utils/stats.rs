//! Small descriptive statistics shared by the evaluator and the warm start

use ndarray::ArrayView1;

/// Arithmetic mean, `None` for an empty view
pub fn mean(values: ArrayView1<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.sum() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator)
///
/// Returns `None` for fewer than two values.
pub fn sample_std(values: ArrayView1<f64>) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|&v| (v - m).powi(2)).sum();
    Some((ss / (n - 1) as f64).sqrt())
}

/// Pearson correlation coefficient
///
/// Returns `None` when the lengths differ, fewer than two values are
/// given, or either side has zero variance.
pub fn pearson(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Option<f64> {
    let n = x.len();
    if n != y.len() || n < 2 {
        return None;
    }

    let mx = mean(x)?;
    let my = mean(y)?;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (&a, &b) in x.iter().zip(y.iter()) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let denom = (sxx * syy).sqrt();
    if denom <= f64::EPSILON || !denom.is_finite() {
        return None;
    }
    let r = sxy / denom;
    r.is_finite().then_some(r)
}

/// Mean absolute error between two equally long views
pub fn mean_absolute_error(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Option<f64> {
    if y_true.len() != y_pred.len() || y_true.is_empty() {
        return None;
    }
    let total: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(a, b)| (a - b).abs())
        .sum();
    Some(total / y_true.len() as f64)
}
