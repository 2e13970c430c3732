// src/engine.rs

//! Principal component analysis of a (standardized) observation matrix.
//!
//! The engine decomposes the covariance matrix of its input, orders the eigenpairs by
//! descending eigenvalue, fixes each eigenvector's sign, and derives scores, explained
//! variance ratios and the correlation of every score column with every input variable.

use crate::config::{Ddof, PcaConfig, SignConvention, Solver, SolverFallback};
use crate::dataset::Observations;
use crate::diagnostics::{orthogonality_error, pearson_correlation, reconstruction_error, FitDiagnostics};
use crate::error::{PcaError, Result};
use crate::linalg_backends::{LinAlgBackendProvider, SymmetricEigenSolver, ThinSvdSolver};
use crate::standardize::{check_degenerate, column_statistics};
use log::{debug, info, warn};
use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Magnitudes closer than this are treated as equal when choosing the sign pivot.
const SIGN_TIE_TOLERANCE: f64 = 1e-12;

/// Flips `vector` in place so that the entry chosen by `convention` is positive.
pub fn normalize_sign(vector: &mut Array1<f64>, convention: SignConvention) {
    let pivot = match convention {
        SignConvention::LargestMagnitudePositive => {
            let max_abs = vector.iter().fold(0.0f64, |m, x| m.max(x.abs()));
            vector.iter().position(|x| x.abs() >= max_abs - SIGN_TIE_TOLERANCE)
        }
        SignConvention::FirstNonZeroPositive => vector.iter().position(|x| x.abs() > SIGN_TIE_TOLERANCE),
    };
    if let Some(i) = pivot {
        if vector[i] < 0.0 {
            vector.mapv_inplace(|x| -x);
        }
    }
}

/// Result of one PCA run. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaFit {
    variables: Vec<String>,
    sample_ids: Vec<String>,
    ddof: Ddof,
    /// Column means of the engine input (zero up to rounding for standardized input).
    means: Array1<f64>,
    /// p x p covariance matrix of the input columns.
    covariance: Array2<f64>,
    /// Sum of all eigenvalues (the trace of the covariance), before any truncation.
    total_variance: f64,
    /// λ_1 ≥ λ_2 ≥ … , clamped to be non-negative.
    eigenvalues: Array1<f64>,
    /// Columns are the unit-norm, sign-fixed eigenvectors (variables x components).
    components: Array2<f64>,
    /// Samples x components.
    scores: Array2<f64>,
    explained_variance_ratio: Array1<f64>,
    cumulative_variance_ratio: Array1<f64>,
    /// Pearson correlation of variable j (row) with score column k (column).
    score_correlations: Array2<f64>,
    diagnostics: FitDiagnostics,
}

impl PcaFit {
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn ddof(&self) -> Ddof {
        self.ddof
    }

    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    pub fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }

    pub fn total_variance(&self) -> f64 {
        self.total_variance
    }

    pub fn eigenvalues(&self) -> &Array1<f64> {
        &self.eigenvalues
    }

    /// Eigenvectors as columns; entry (j, k) is the loading of variable j on component k.
    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn component(&self, k: usize) -> Option<ArrayView1<'_, f64>> {
        (k < self.n_components()).then(|| self.components.column(k))
    }

    pub fn scores(&self) -> &Array2<f64> {
        &self.scores
    }

    pub fn explained_variance_ratio(&self) -> &Array1<f64> {
        &self.explained_variance_ratio
    }

    pub fn cumulative_variance_ratio(&self) -> &Array1<f64> {
        &self.cumulative_variance_ratio
    }

    pub fn score_correlations(&self) -> &Array2<f64> {
        &self.score_correlations
    }

    pub fn diagnostics(&self) -> &FitDiagnostics {
        &self.diagnostics
    }

    pub fn n_components(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Keeps the first `k` components. Ratios stay relative to the total variance of the
    /// full fit, so the cumulative ratio of a truncated fit is below one.
    pub fn truncate(&self, k: usize) -> Result<PcaFit> {
        if k == 0 || k > self.n_components() {
            return Err(PcaError::UnknownSelection(format!(
                "cannot keep {} of {} components",
                k,
                self.n_components()
            )));
        }
        Ok(PcaFit {
            variables: self.variables.clone(),
            sample_ids: self.sample_ids.clone(),
            ddof: self.ddof,
            means: self.means.clone(),
            covariance: self.covariance.clone(),
            total_variance: self.total_variance,
            eigenvalues: self.eigenvalues.slice(s![..k]).to_owned(),
            components: self.components.slice(s![.., ..k]).to_owned(),
            scores: self.scores.slice(s![.., ..k]).to_owned(),
            explained_variance_ratio: self.explained_variance_ratio.slice(s![..k]).to_owned(),
            cumulative_variance_ratio: self.cumulative_variance_ratio.slice(s![..k]).to_owned(),
            score_correlations: self.score_correlations.slice(s![.., ..k]).to_owned(),
            diagnostics: self.diagnostics.clone(),
        })
    }
}

/// Computes PCA fits according to a `PcaConfig`.
#[derive(Debug, Clone)]
pub struct PcaEngine<B = LinAlgBackendProvider> {
    config: PcaConfig,
    backend: B,
}

impl Default for PcaEngine {
    fn default() -> Self {
        Self::new(PcaConfig::default())
    }
}

impl PcaEngine {
    pub fn new(config: PcaConfig) -> Self {
        Self {
            config,
            backend: LinAlgBackendProvider,
        }
    }
}

impl<B: SymmetricEigenSolver + ThinSvdSolver> PcaEngine<B> {
    /// Uses a caller-supplied decomposition backend.
    pub fn with_backend(config: PcaConfig, backend: B) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &PcaConfig {
        &self.config
    }

    /// Fits the PCA to `z` (n samples x p variables), normally the standardizer's output.
    ///
    /// The covariance is taken over column-centred data with divisor `n - ddof`. When `z`
    /// is already standardized the centring is a no-op, so the scores reconstruct `z`.
    ///
    /// # Errors
    /// - `InsufficientSamples` when `n <= p`; the covariance would be rank-deficient.
    /// - `DegenerateColumn` for a zero-variance column.
    /// - `NonConvergence` when the solver fails and no fallback is configured.
    /// - `SchemaMismatch` for an input without variables or with non-finite values.
    pub fn fit(&self, z: &Observations) -> Result<PcaFit> {
        let n_samples = z.n_samples();
        let n_features = z.n_variables();
        let start_time = Instant::now();

        info!(
            "Starting PCA on {} samples x {} variables (solver={:?}, ddof={}).",
            n_samples,
            n_features,
            self.config.solver,
            self.config.ddof.value()
        );

        if n_features == 0 {
            return Err(PcaError::SchemaMismatch {
                context: "engine input".into(),
                message: "observations have no variables".into(),
            });
        }
        if n_samples <= n_features {
            return Err(PcaError::InsufficientSamples { n_samples, n_features });
        }
        z.check_finite("engine input")?;

        let stats = column_statistics(z.values(), self.config.ddof);
        check_degenerate(&stats, z.variables(), self.config.degenerate_tolerance)?;

        let means: Array1<f64> = stats.iter().map(|s| s.mean).collect();
        let mut centered = z.values().to_owned();
        centered -= &means;

        let divisor = self.config.ddof.divisor(n_samples);
        let mut covariance = centered.t().dot(&centered);
        covariance /= divisor;

        let mut diagnostics = FitDiagnostics::default();
        let (raw_eigenvalues, raw_eigenvectors) =
            self.decompose(&centered, &covariance, divisor, &mut diagnostics)?;

        let eigenvalues = self.clamp_eigenvalues(raw_eigenvalues, &mut diagnostics);

        // Stable sort keeps solver order among equal eigenvalues.
        let mut order: Vec<usize> = (0..eigenvalues.len()).collect();
        order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));

        let sorted_eigenvalues: Array1<f64> = order.iter().map(|&i| eigenvalues[i]).collect();
        let mut components = Array2::<f64>::zeros((n_features, order.len()));
        for (k, &i) in order.iter().enumerate() {
            let mut eig_vec = raw_eigenvectors.column(i).to_owned();
            let norm = eig_vec.dot(&eig_vec).sqrt();
            if norm > 0.0 {
                eig_vec.mapv_inplace(|x| x / norm);
            }
            normalize_sign(&mut eig_vec, self.config.sign_convention);
            components.column_mut(k).assign(&eig_vec);
        }

        let scores = centered.dot(&components);

        let total_variance = sorted_eigenvalues.sum();
        let explained_variance_ratio = sorted_eigenvalues.mapv(|v| v / total_variance);
        let mut cumulative_variance_ratio = explained_variance_ratio.clone();
        for k in 1..cumulative_variance_ratio.len() {
            cumulative_variance_ratio[k] += cumulative_variance_ratio[k - 1];
        }

        let zero_threshold = self.zero_eigenvalue_threshold(&sorted_eigenvalues);
        let mut score_correlations = Array2::<f64>::zeros((n_features, sorted_eigenvalues.len()));
        for (k, score_column) in scores.axis_iter(Axis(1)).enumerate() {
            if sorted_eigenvalues[k] <= zero_threshold {
                debug!("PC{} has no variance; its correlations are reported as 0.", k + 1);
                continue;
            }
            for (j, variable_column) in z.values().axis_iter(Axis(1)).enumerate() {
                score_correlations[[j, k]] = pearson_correlation(variable_column, score_column);
            }
        }

        diagnostics.orthogonality_error = orthogonality_error(components.view());
        diagnostics.reconstruction_error =
            reconstruction_error(centered.view(), scores.view(), components.view());
        diagnostics.variance_ratio_error = (explained_variance_ratio.sum() - 1.0).abs();
        diagnostics.trace_error = (covariance.diag().sum() - total_variance).abs();
        diagnostics.elapsed = start_time.elapsed();

        debug!(
            "PCA diagnostics: orthogonality={:.3e}, reconstruction={:.3e}, ratio_sum={:.3e}, trace={:.3e}, clamped={}",
            diagnostics.orthogonality_error,
            diagnostics.reconstruction_error,
            diagnostics.variance_ratio_error,
            diagnostics.trace_error,
            diagnostics.clamped_eigenvalues
        );
        info!(
            "PCA completed in {:?}. PC1 explains {:.2}% of {:.4} total variance.",
            diagnostics.elapsed,
            explained_variance_ratio[0] * 100.0,
            total_variance
        );

        Ok(PcaFit {
            variables: z.variables().to_vec(),
            sample_ids: z.sample_ids().to_vec(),
            ddof: self.config.ddof,
            means,
            covariance,
            total_variance,
            eigenvalues: sorted_eigenvalues,
            components,
            scores,
            explained_variance_ratio,
            cumulative_variance_ratio,
            score_correlations,
            diagnostics,
        })
    }

    /// Runs the configured solver, falling back to SVD only when asked to.
    fn decompose(
        &self,
        centered: &Array2<f64>,
        covariance: &Array2<f64>,
        divisor: f64,
        diagnostics: &mut FitDiagnostics,
    ) -> Result<(Array1<f64>, Array2<f64>)> {
        match self.config.solver {
            Solver::CovarianceEigh => match self.eigh_covariance(covariance) {
                Ok(pairs) => {
                    diagnostics.solver_used = Some(Solver::CovarianceEigh);
                    Ok(pairs)
                }
                Err(err) => match self.config.fallback {
                    SolverFallback::None => Err(err),
                    SolverFallback::Svd => {
                        warn!("Covariance eigendecomposition failed ({}); falling back to SVD of the centred data.", err);
                        diagnostics.fallback = Some(err.to_string());
                        diagnostics.solver_used = Some(Solver::Svd);
                        self.svd_centered(centered, divisor)
                    }
                },
            },
            Solver::Svd => {
                diagnostics.solver_used = Some(Solver::Svd);
                self.svd_centered(centered, divisor)
            }
        }
    }

    fn eigh_covariance(&self, covariance: &Array2<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
        let out = self
            .backend
            .eigh_upper(covariance)
            .map_err(|e| PcaError::NonConvergence {
                shape: covariance.dim(),
                message: format!("covariance eigendecomposition failed: {}", e),
            })?;
        if out.eigenvalues.iter().any(|v| !v.is_finite()) || out.eigenvectors.iter().any(|v| !v.is_finite()) {
            return Err(PcaError::NonConvergence {
                shape: covariance.dim(),
                message: "covariance eigendecomposition returned non-finite values".into(),
            });
        }
        Ok((out.eigenvalues, out.eigenvectors))
    }

    /// Eigenpairs of the covariance from the thin SVD of the centred data:
    /// λ_k = σ_k² / (n - ddof), v_k = k-th right singular vector.
    fn svd_centered(&self, centered: &Array2<f64>, divisor: f64) -> Result<(Array1<f64>, Array2<f64>)> {
        let p = centered.ncols();
        let out = self
            .backend
            .svd_vt(centered.clone())
            .map_err(|e| PcaError::NonConvergence {
                shape: centered.dim(),
                message: format!("SVD of centred data failed: {}", e),
            })?;
        if out.singular_values.len() != p || out.vt.dim() != (p, p) {
            return Err(PcaError::NonConvergence {
                shape: centered.dim(),
                message: format!(
                    "SVD returned {} singular values and a {:?} Vt for {} variables",
                    out.singular_values.len(),
                    out.vt.dim(),
                    p
                ),
            });
        }
        if out.singular_values.iter().any(|v| !v.is_finite()) {
            return Err(PcaError::NonConvergence {
                shape: centered.dim(),
                message: "SVD returned non-finite singular values".into(),
            });
        }
        let eigenvalues = out.singular_values.mapv(|sv| sv * sv / divisor);
        Ok((eigenvalues, out.vt.reversed_axes()))
    }

    fn zero_eigenvalue_threshold(&self, eigenvalues: &Array1<f64>) -> f64 {
        let largest = eigenvalues.iter().cloned().fold(0.0f64, f64::max);
        self.config.eigenvalue_tolerance * largest.max(1.0)
    }

    /// Negative eigenvalues become zero. Those beyond tolerance are flagged, not hidden.
    fn clamp_eigenvalues(&self, mut eigenvalues: Array1<f64>, diagnostics: &mut FitDiagnostics) -> Array1<f64> {
        let threshold = self.zero_eigenvalue_threshold(&eigenvalues);
        for value in eigenvalues.iter_mut() {
            if *value < 0.0 {
                if -*value > threshold {
                    warn!(
                        "Eigenvalue {:.6e} is negative beyond tolerance {:.3e}; clamping to 0.",
                        *value, threshold
                    );
                    diagnostics.flagged_negative_eigenvalues.push(*value);
                } else {
                    diagnostics.clamped_eigenvalues += 1;
                }
                *value = 0.0;
            }
        }
        eigenvalues
    }
}
