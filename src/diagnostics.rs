// src/diagnostics.rs

//! Numerical checks recorded alongside every fit.

use crate::config::Solver;
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Facts about how a fit was computed and how well its guarantees hold numerically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FitDiagnostics {
    /// Solver that produced the eigenpairs.
    pub solver_used: Option<Solver>,
    /// Set when the primary solver failed and the SVD fallback was used: the original failure.
    pub fallback: Option<String>,
    /// Negative eigenvalues within tolerance that were clamped to zero.
    pub clamped_eigenvalues: usize,
    /// Negative eigenvalues beyond tolerance (clamped as well, but suspicious).
    pub flagged_negative_eigenvalues: Vec<f64>,
    /// max |VᵗV - I|
    pub orthogonality_error: f64,
    /// max |Zc - S Vᵗ|
    pub reconstruction_error: f64,
    /// |Σ r_k - 1|
    pub variance_ratio_error: f64,
    /// |trace(C) - Σ λ_k|
    pub trace_error: f64,
    pub elapsed: Duration,
}

impl FitDiagnostics {
    /// True when nothing was flagged and no fallback was needed.
    pub fn is_clean(&self) -> bool {
        self.fallback.is_none() && self.flagged_negative_eigenvalues.is_empty()
    }
}

/// Largest absolute deviation of `VᵗV` from the identity.
pub fn orthogonality_error(components: ArrayView2<'_, f64>) -> f64 {
    let gram = components.t().dot(&components);
    let k = gram.nrows();
    let identity = Array2::<f64>::eye(k);
    max_abs_diff(gram.view(), identity.view())
}

/// Largest absolute entry of `centered - scores · Vᵗ`.
pub fn reconstruction_error(
    centered: ArrayView2<'_, f64>,
    scores: ArrayView2<'_, f64>,
    components: ArrayView2<'_, f64>,
) -> f64 {
    let rebuilt = scores.dot(&components.t());
    max_abs_diff(centered, rebuilt.view())
}

pub fn max_abs_diff(a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .fold(0.0f64, |acc, (x, y)| acc.max((x - y).abs()))
}

/// Pearson correlation of two equally long series. Zero if either has no spread.
pub fn pearson_correlation(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    let n = a.len();
    if n == 0 || n != b.len() {
        return 0.0;
    }
    let mean_a = a.sum() / n as f64;
    let mean_b = b.sum() / n as f64;
    let (cov, var_a, var_b) = a
        .iter()
        .zip(b.iter())
        .fold((0.0, 0.0, 0.0), |(c, va, vb), (&x, &y)| {
            let dx = x - mean_a;
            let dy = y - mean_b;
            (c + dx * dy, va + dx * dx, vb + dy * dy)
        });
    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}
