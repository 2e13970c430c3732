// src/config.rs

//! Run configuration. Passed explicitly to every stage; nothing here is global.

use crate::error::{PcaError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Degrees-of-freedom correction used for every variance in a run.
///
/// The same divisor `n - ddof` is used by the standardizer and by the covariance
/// matrix, so a standardized column has unit variance under the covariance the engine
/// decomposes, and the eigenvalues of standardized data sum to the number of variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ddof {
    /// Divide by `n`.
    Population,
    /// Divide by `n - 1`.
    Sample,
}

impl Ddof {
    pub fn value(self) -> usize {
        match self {
            Ddof::Population => 0,
            Ddof::Sample => 1,
        }
    }

    /// Divisor for a variance over `n` observations.
    pub fn divisor(self, n: usize) -> f64 {
        (n - self.value()) as f64
    }
}

impl Default for Ddof {
    fn default() -> Self {
        Ddof::Sample
    }
}

/// What the standardizer does to each column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scaling {
    /// Centre and divide by the standard deviation (correlation-matrix PCA).
    #[default]
    Standardize,
    /// Centre only (covariance-matrix PCA in the original units).
    CenterOnly,
}

/// Decomposition used by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Solver {
    /// Symmetric eigendecomposition of the p x p covariance matrix.
    #[default]
    CovarianceEigh,
    /// Thin SVD of the centred n x p data matrix.
    Svd,
}

/// What to do when the primary solver fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SolverFallback {
    /// Report `NonConvergence`.
    #[default]
    None,
    /// Retry once with the SVD solver and record the fallback in the diagnostics.
    Svd,
}

/// Rule that fixes the otherwise arbitrary sign of each eigenvector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SignConvention {
    /// The entry of largest magnitude is positive. Among entries whose magnitudes agree to
    /// within 1e-12, the first one decides.
    #[default]
    LargestMagnitudePositive,
    /// The first entry that is not (numerically) zero is positive.
    FirstNonZeroPositive,
}

/// How the loader recognises element (concentration) columns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementSelector {
    /// Columns whose header has at most this many characters, e.g. `Fe`, `K`, `Zr`.
    MaxNameLength(usize),
    /// Exactly these columns, in this order.
    Named(Vec<String>),
}

impl Default for ElementSelector {
    fn default() -> Self {
        ElementSelector::MaxNameLength(2)
    }
}

impl ElementSelector {
    pub fn matches(&self, header: &str) -> bool {
        match self {
            ElementSelector::MaxNameLength(max_len) => {
                let trimmed = header.trim();
                !trimmed.is_empty() && trimmed.chars().count() <= *max_len
            }
            ElementSelector::Named(names) => names.iter().any(|n| n == header),
        }
    }
}

/// Options for reading and joining the measurement and metadata tables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// Column shared by both tables.
    pub join_key: String,
    /// Field delimiter, e.g. `b','` or `b'\t'`.
    pub delimiter: u8,
    pub element_selector: ElementSelector,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        LoaderOptions {
            join_key: "Sample".to_string(),
            delimiter: b',',
            element_selector: ElementSelector::default(),
        }
    }
}

/// Parameters of one pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcaConfig {
    pub ddof: Ddof,
    pub scaling: Scaling,
    pub solver: Solver,
    pub fallback: SolverFallback,
    pub sign_convention: SignConvention,
    /// Negative eigenvalues with magnitude up to `eigenvalue_tolerance * max(1, λ_max)` are
    /// treated as rounding noise. Larger ones are still clamped to zero but flagged.
    pub eigenvalue_tolerance: f64,
    /// Columns whose standard deviation is at or below this fraction of the column's
    /// largest magnitude are degenerate.
    pub degenerate_tolerance: f64,
    pub loader: LoaderOptions,
}

impl Default for PcaConfig {
    fn default() -> Self {
        PcaConfig {
            ddof: Ddof::default(),
            scaling: Scaling::default(),
            solver: Solver::default(),
            fallback: SolverFallback::default(),
            sign_convention: SignConvention::default(),
            eigenvalue_tolerance: 1e-10,
            degenerate_tolerance: 1e-12,
            loader: LoaderOptions::default(),
        }
    }
}

impl PcaConfig {
    /// Parses a configuration from JSON. Absent fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PcaConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.eigenvalue_tolerance.is_finite() && self.eigenvalue_tolerance >= 0.0) {
            return Err(PcaError::InvalidConfig(format!(
                "eigenvalue_tolerance must be a non-negative finite number, got {}",
                self.eigenvalue_tolerance
            )));
        }
        if !(self.degenerate_tolerance.is_finite() && self.degenerate_tolerance >= 0.0) {
            return Err(PcaError::InvalidConfig(format!(
                "degenerate_tolerance must be a non-negative finite number, got {}",
                self.degenerate_tolerance
            )));
        }
        if self.loader.join_key.trim().is_empty() {
            return Err(PcaError::InvalidConfig("join_key must not be empty".into()));
        }
        if let ElementSelector::MaxNameLength(0) = self.loader.element_selector {
            return Err(PcaError::InvalidConfig(
                "element_selector max_name_length must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PcaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ddof, Ddof::Sample);
        assert_eq!(config.sign_convention, SignConvention::LargestMagnitudePositive);
        assert_eq!(config.loader.element_selector, ElementSelector::MaxNameLength(2));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = PcaConfig::from_json_str(
            r#"{ "ddof": "population", "solver": "svd", "loader": { "join_key": "ID" } }"#,
        )
        .unwrap();
        assert_eq!(config.ddof, Ddof::Population);
        assert_eq!(config.solver, Solver::Svd);
        assert_eq!(config.loader.join_key, "ID");
        assert_eq!(config.loader.delimiter, b',');
        assert_eq!(config.scaling, Scaling::Standardize);
    }

    #[test]
    fn named_element_selector_from_json() {
        let config = PcaConfig::from_json_str(
            r#"{ "loader": { "element_selector": { "named": ["Fe", "Ca", "Sr"] } } }"#,
        )
        .unwrap();
        assert!(config.loader.element_selector.matches("Sr"));
        assert!(!config.loader.element_selector.matches("Zr"));
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        let err = PcaConfig::from_json_str(r#"{ "eigenvalue_tolerance": -1.0 }"#).unwrap_err();
        assert!(matches!(err, PcaError::InvalidConfig(_)));
    }

    #[test]
    fn element_selector_uses_name_length() {
        let selector = ElementSelector::default();
        assert!(selector.matches("Fe"));
        assert!(selector.matches("K"));
        assert!(!selector.matches("Sample"));
        assert!(!selector.matches(""));
    }

    #[test]
    fn ddof_divisors() {
        assert_eq!(Ddof::Sample.divisor(25), 24.0);
        assert_eq!(Ddof::Population.divisor(25), 25.0);
    }
}
