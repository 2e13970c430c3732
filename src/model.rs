// src/model.rs

//! A fitted projection that can be applied to new samples and persisted to disk.

use crate::dataset::Observations;
use crate::engine::PcaFit;
use crate::error::{PcaError, Result};
use crate::standardize::Standardized;
use ndarray::{Array1, Array2, Axis, Zip};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Everything needed to project raw observations onto fitted principal components.
///
/// A raw sample `x` maps to `((x - mean) / scale) · components`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PcaModel {
    variables: Vec<String>,
    /// Shape: (n_variables)
    mean: Array1<f64>,
    /// Strictly positive. Shape: (n_variables)
    scale: Array1<f64>,
    /// Shape: (n_variables, k_components)
    components: Array2<f64>,
    /// Shape: (k_components)
    eigenvalues: Array1<f64>,
}

impl PcaModel {
    /// Builds a model from explicit parts, validating their dimensions.
    pub fn new(
        variables: Vec<String>,
        mean: Array1<f64>,
        scale: Array1<f64>,
        components: Array2<f64>,
        eigenvalues: Array1<f64>,
    ) -> Result<Self> {
        let model = Self {
            variables,
            mean,
            scale,
            components,
            eigenvalues,
        };
        model.validate()?;
        Ok(model)
    }

    /// Model for data already in the engine's input space (only the engine's centring applies).
    pub fn from_fit(fit: &PcaFit) -> Result<Self> {
        Self::new(
            fit.variables().to_vec(),
            fit.means().clone(),
            Array1::ones(fit.variables().len()),
            fit.components().clone(),
            fit.eigenvalues().clone(),
        )
    }

    /// Model for raw data: composes the standardizer's transform with the engine's centring.
    ///
    /// With z = (x - μ_s) / σ_s and the engine centring z by μ_e, the combined map is
    /// (x - (μ_s + σ_s μ_e)) / σ_s.
    pub fn from_standardized_fit(standardized: &Standardized, fit: &PcaFit) -> Result<Self> {
        if standardized.observations.variables() != fit.variables() {
            return Err(PcaError::InvalidModel(
                "standardizer and fit were computed over different variables".into(),
            ));
        }
        let mean = &standardized.means + &(&standardized.scales * fit.means());
        Self::new(
            fit.variables().to_vec(),
            mean,
            standardized.scales.clone(),
            fit.components().clone(),
            fit.eigenvalues().clone(),
        )
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn eigenvalues(&self) -> &Array1<f64> {
        &self.eigenvalues
    }

    /// Projects new observations onto the fitted components.
    ///
    /// Columns are matched by variable name, so their order in `x` does not matter.
    ///
    /// # Errors
    /// `SchemaMismatch` if a model variable is missing from `x` or `x` holds non-finite values.
    pub fn transform(&self, x: &Observations) -> Result<Array2<f64>> {
        let aligned = x.select_variables(&self.variables).map_err(|e| PcaError::SchemaMismatch {
            context: "transform input".into(),
            message: e.to_string(),
        })?;
        aligned.check_finite("transform input")?;

        let k_components = self.components.ncols();
        if aligned.n_samples() == 0 {
            return Ok(Array2::zeros((0, k_components)));
        }

        let mut values = aligned.into_values();
        for mut row in values.axis_iter_mut(Axis(0)) {
            Zip::from(&mut row)
                .and(&self.mean)
                .and(&self.scale)
                .for_each(|v, &m, &s| *v = (*v - m) / s);
        }
        Ok(values.dot(&self.components))
    }

    /// Saves the model with bincode.
    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())?;
        Ok(())
    }

    /// Loads a model written by `save_model` and checks it is internally consistent.
    pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let model: PcaModel = bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        let d = self.variables.len();
        if self.mean.len() != d || self.scale.len() != d || self.components.nrows() != d {
            return Err(PcaError::InvalidModel(format!(
                "inconsistent feature dimensions: variables={}, mean={}, scale={}, components={}",
                d,
                self.mean.len(),
                self.scale.len(),
                self.components.nrows()
            )));
        }
        if self.eigenvalues.len() != self.components.ncols() {
            return Err(PcaError::InvalidModel(format!(
                "{} eigenvalues for {} components",
                self.eigenvalues.len(),
                self.components.ncols()
            )));
        }
        if self.scale.iter().any(|&v| !v.is_finite() || v <= 0.0) {
            return Err(PcaError::InvalidModel(
                "scale vector must contain only positive, finite values".into(),
            ));
        }
        if self.eigenvalues.iter().any(|&v| !v.is_finite() || v < 0.0) {
            return Err(PcaError::InvalidModel(
                "eigenvalues must be non-negative and finite".into(),
            ));
        }
        if self.mean.iter().chain(self.components.iter()).any(|v| !v.is_finite()) {
            return Err(PcaError::InvalidModel("mean or components contain non-finite values".into()));
        }
        Ok(())
    }
}
