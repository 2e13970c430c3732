// src/standardize.rs

//! Column-wise centring and scaling of the observation matrix.

use crate::config::{Ddof, PcaConfig, Scaling};
use crate::dataset::Observations;
use crate::error::{PcaError, Result};
use log::{info, trace};
use ndarray::{Array1, ArrayView2, Axis, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Mean and standard deviation of one column.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColumnStats {
    pub mean: f64,
    pub std_dev: f64,
    /// Largest absolute value in the column; sets the scale of the degeneracy test.
    pub max_abs: f64,
}

/// Per-column statistics. Columns are reduced independently (in parallel), so the result
/// does not depend on the thread count.
pub fn column_statistics(values: ArrayView2<'_, f64>, ddof: Ddof) -> Vec<ColumnStats> {
    let n = values.nrows();
    let divisor = if n > ddof.value() { ddof.divisor(n) } else { f64::NAN };
    values
        .axis_iter(Axis(1))
        .into_par_iter()
        .map(|column| {
            let mean = column.sum() / n as f64;
            let sum_sq: f64 = column.iter().map(|&x| (x - mean) * (x - mean)).sum();
            let max_abs = column.iter().fold(0.0f64, |acc, &x| acc.max(x.abs()));
            ColumnStats {
                mean,
                std_dev: (sum_sq / divisor).sqrt(),
                max_abs,
            }
        })
        .collect()
}

/// Returns the first column whose spread is zero relative to its magnitude. The test is
/// scale-free, so a column of tiny but varying values passes and an all-zero column fails.
pub(crate) fn check_degenerate(
    stats: &[ColumnStats],
    variables: &[String],
    tolerance: f64,
) -> Result<()> {
    for (index, s) in stats.iter().enumerate() {
        trace!("column '{}': mean={:.6e} sd={:.6e}", variables[index], s.mean, s.std_dev);
        let threshold = tolerance * s.max_abs;
        if !(s.std_dev > threshold) {
            return Err(PcaError::DegenerateColumn {
                column: variables[index].clone(),
                index,
            });
        }
    }
    Ok(())
}

/// Output of the standardizer, keeping what is needed to apply the same transform later.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Standardized {
    /// The transformed matrix Z, with the input's labels.
    pub observations: Observations,
    pub means: Array1<f64>,
    /// Divisors applied to each centred column (all ones for `Scaling::CenterOnly`).
    pub scales: Array1<f64>,
    pub ddof: Ddof,
    pub scaling: Scaling,
}

/// Rescales each column to zero mean and (optionally) unit variance.
#[derive(Clone, Copy, Debug)]
pub struct Standardizer {
    ddof: Ddof,
    scaling: Scaling,
    degenerate_tolerance: f64,
}

impl Default for Standardizer {
    fn default() -> Self {
        Self::from_config(&PcaConfig::default())
    }
}

impl Standardizer {
    pub fn new(ddof: Ddof, scaling: Scaling) -> Self {
        Self {
            ddof,
            scaling,
            degenerate_tolerance: PcaConfig::default().degenerate_tolerance,
        }
    }

    pub fn from_config(config: &PcaConfig) -> Self {
        Self {
            ddof: config.ddof,
            scaling: config.scaling,
            degenerate_tolerance: config.degenerate_tolerance,
        }
    }

    pub fn with_degenerate_tolerance(mut self, tolerance: f64) -> Self {
        self.degenerate_tolerance = tolerance;
        self
    }

    pub fn ddof(&self) -> Ddof {
        self.ddof
    }

    /// Centres (and scales) every column of `x`.
    ///
    /// # Errors
    /// - `InsufficientSamples` if there are fewer than two samples, or no more samples than
    ///   the ddof correction.
    /// - `DegenerateColumn` for the first column with zero variance.
    pub fn fit_transform(&self, x: &Observations) -> Result<Standardized> {
        let n_samples = x.n_samples();
        let n_features = x.n_variables();
        if n_samples < 2 || n_samples <= self.ddof.value() {
            return Err(PcaError::InsufficientSamples { n_samples, n_features });
        }
        if n_features == 0 {
            return Err(PcaError::SchemaMismatch {
                context: "standardizer".into(),
                message: "observations have no variables".into(),
            });
        }

        x.check_finite("standardizer input")?;
        let stats = column_statistics(x.values(), self.ddof);
        check_degenerate(&stats, x.variables(), self.degenerate_tolerance)?;

        let means: Array1<f64> = stats.iter().map(|s| s.mean).collect();
        let scales: Array1<f64> = match self.scaling {
            Scaling::Standardize => stats.iter().map(|s| s.std_dev).collect(),
            Scaling::CenterOnly => Array1::ones(n_features),
        };

        let mut z = x.values().to_owned();
        for mut row in z.axis_iter_mut(Axis(0)) {
            Zip::from(&mut row)
                .and(&means)
                .and(&scales)
                .for_each(|v, &m, &s| *v = (*v - m) / s);
        }

        info!(
            "Standardized {} samples x {} variables ({:?}, ddof={}).",
            n_samples,
            n_features,
            self.scaling,
            self.ddof.value()
        );

        Ok(Standardized {
            observations: x.with_values(z),
            means,
            scales,
            ddof: self.ddof,
            scaling: self.scaling,
        })
    }
}
