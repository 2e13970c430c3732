// src/interpret.rs

//! Labeled, read-only views of a fit for reporting and rendering.

use crate::engine::PcaFit;
use crate::error::{PcaError, Result};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// `PC1`, `PC2`, ...
pub fn component_label(k: usize) -> String {
    format!("PC{}", k + 1)
}

/// Index of a `PCk` label (1-based in the label, 0-based in the result).
pub fn component_index(label: &str) -> Option<usize> {
    label
        .strip_prefix("PC")
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|&n| n >= 1)
        .map(|n| n - 1)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceRow {
    pub component: String,
    pub eigenvalue: f64,
    pub ratio: f64,
    pub cumulative: f64,
}

/// component → explained variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceTable {
    pub rows: Vec<VarianceRow>,
}

impl VarianceTable {
    /// Smallest number of leading components whose cumulative ratio reaches `threshold`.
    pub fn components_for_variance(&self, threshold: f64) -> Option<usize> {
        self.rows
            .iter()
            .position(|r| r.cumulative + 1e-12 >= threshold)
            .map(|k| k + 1)
    }
}

/// A labeled matrix: `rows` x `columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledTable {
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    pub values: Array2<f64>,
}

impl LabeledTable {
    pub fn get(&self, row: &str, column: &str) -> Result<f64> {
        let i = self
            .row_labels
            .iter()
            .position(|r| r == row)
            .ok_or_else(|| PcaError::UnknownSelection(format!("row '{}'", row)))?;
        let j = self
            .column_labels
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| PcaError::UnknownSelection(format!("column '{}'", column)))?;
        Ok(self.values[[i, j]])
    }

    pub fn row(&self, label: &str) -> Result<ArrayView1<'_, f64>> {
        let i = self
            .row_labels
            .iter()
            .position(|r| r == label)
            .ok_or_else(|| PcaError::UnknownSelection(format!("row '{}'", label)))?;
        Ok(self.values.row(i))
    }

    pub fn column(&self, label: &str) -> Result<ArrayView1<'_, f64>> {
        let j = self
            .column_labels
            .iter()
            .position(|c| c == label)
            .ok_or_else(|| PcaError::UnknownSelection(format!("column '{}'", label)))?;
        Ok(self.values.column(j))
    }
}

/// One variable's share of a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub variable: String,
    pub loading: f64,
    /// loading² x 100; sums to 100 over the variables of a component.
    pub percent: f64,
}

/// The interpretation tables of a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub variance: VarianceTable,
    /// component x variable
    pub loadings: LabeledTable,
    /// variable x component
    pub correlations: LabeledTable,
    /// sample x component
    pub scores: LabeledTable,
}

impl Interpretation {
    pub fn from_fit(fit: &PcaFit) -> Self {
        let labels: Vec<String> = (0..fit.n_components()).map(component_label).collect();

        let rows = labels
            .iter()
            .enumerate()
            .map(|(k, label)| VarianceRow {
                component: label.clone(),
                eigenvalue: fit.eigenvalues()[k],
                ratio: fit.explained_variance_ratio()[k],
                cumulative: fit.cumulative_variance_ratio()[k],
            })
            .collect();

        Self {
            variance: VarianceTable { rows },
            loadings: LabeledTable {
                row_labels: labels.clone(),
                column_labels: fit.variables().to_vec(),
                values: fit.components().t().to_owned(),
            },
            correlations: LabeledTable {
                row_labels: fit.variables().to_vec(),
                column_labels: labels.clone(),
                values: fit.score_correlations().clone(),
            },
            scores: LabeledTable {
                row_labels: fit.sample_ids().to_vec(),
                column_labels: labels,
                values: fit.scores().clone(),
            },
        }
    }

    /// Variables ranked by their contribution to `component`, largest first.
    pub fn contributions(&self, component: &str) -> Result<Vec<Contribution>> {
        let loadings = self
            .loadings
            .row(component)
            .map_err(|_| PcaError::UnknownSelection(format!("component '{}'", component)))?;
        let mut out: Vec<Contribution> = self
            .loadings
            .column_labels
            .iter()
            .zip(loadings.iter())
            .map(|(variable, &loading)| Contribution {
                variable: variable.clone(),
                loading,
                percent: loading * loading * 100.0,
            })
            .collect();
        out.sort_by(|a, b| b.percent.total_cmp(&a.percent));
        Ok(out)
    }
}
