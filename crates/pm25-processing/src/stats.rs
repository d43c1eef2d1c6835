//! Descriptive statistics over plain `f64` slices.
//!
//! Quantiles use linear interpolation between closest ranks, the same
//! convention as numpy's default `percentile`. Inputs never need to be
//! pre-sorted.

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with `ddof` degrees of freedom removed.
///
/// Returns `None` when fewer than `ddof + 1` values are available.
pub fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    if values.len() <= ddof {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - ddof) as f64).sqrt())
}

/// Sample standard deviation (n - 1).
pub fn sample_std(values: &[f64]) -> Option<f64> {
    std_dev(values, 1)
}

/// Population standard deviation (n).
pub fn population_std(values: &[f64]) -> Option<f64> {
    std_dev(values, 0)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// The `q`-th quantile (0.0 - 1.0).
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    quantile_sorted(&sorted(values), q)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// First quartile, median and third quartile in one sort.
pub fn quartiles(values: &[f64]) -> Option<(f64, f64, f64)> {
    let sorted = sorted(values);
    Some((
        quantile_sorted(&sorted, 0.25)?,
        quantile_sorted(&sorted, 0.5)?,
        quantile_sorted(&sorted, 0.75)?,
    ))
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().min_by(|a, b| a.total_cmp(b))
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().max_by(|a, b| a.total_cmp(b))
}

/// Ordinary least squares fit `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    /// Fit `ys` on `xs`. Needs two points with distinct `x`.
    pub fn fit(xs: &[f64], ys: &[f64]) -> Option<Self> {
        if xs.len() != ys.len() || xs.len() < 2 {
            return None;
        }
        let mx = mean(xs)?;
        let my = mean(ys)?;
        let sxx: f64 = xs.iter().map(|x| (x - mx).powi(2)).sum();
        if sxx == 0.0 {
            return None;
        }
        let sxy: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum();
        let slope = sxy / sxx;
        Some(Self {
            slope,
            intercept: my - slope * mx,
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    pub fn residuals(&self, xs: &[f64], ys: &[f64]) -> Vec<f64> {
        xs.iter().zip(ys).map(|(x, y)| y - self.predict(*x)).collect()
    }

    /// Coefficient of determination of the fit over `(xs, ys)`.
    ///
    /// `None` when `ys` has no variance.
    pub fn r_squared(&self, xs: &[f64], ys: &[f64]) -> Option<f64> {
        let my = mean(ys)?;
        let ss_tot: f64 = ys.iter().map(|y| (y - my).powi(2)).sum();
        if ss_tot <= f64::EPSILON * my.abs().max(1.0) {
            return None;
        }
        let ss_res: f64 = self.residuals(xs, ys).iter().map(|r| r * r).sum();
        Some(1.0 - ss_res / ss_tot)
    }
}

/// R² adjusted for one predictor over `n` points. Needs `n >= 3`.
pub fn adjusted_r_squared(r_squared: f64, n: usize) -> Option<f64> {
    if n < 3 {
        return None;
    }
    let n = n as f64;
    Some(1.0 - (1.0 - r_squared) * (n - 1.0) / (n - 2.0))
}

/// Residual standard error of a simple regression (n - 2 degrees of freedom).
pub fn residual_std(residuals: &[f64]) -> Option<f64> {
    if residuals.len() < 3 {
        return None;
    }
    let ss: f64 = residuals.iter().map(|r| r * r).sum();
    Some((ss / (residuals.len() - 2) as f64).sqrt())
}
