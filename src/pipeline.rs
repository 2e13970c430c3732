// src/pipeline.rs

//! One pass through the stages: standardize, decompose, interpret.

use crate::config::PcaConfig;
use crate::dataset::{Dataset, Observations};
use crate::engine::{PcaEngine, PcaFit};
use crate::error::Result;
use crate::interpret::Interpretation;
use crate::model::PcaModel;
use crate::standardize::{Standardized, Standardizer};
use log::info;
use std::path::Path;
use std::time::Instant;

/// Everything produced by a run. Display payloads are derived from this without refitting.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub standardized: Standardized,
    pub fit: PcaFit,
    pub interpretation: Interpretation,
    /// Projects raw observations of the same elements onto the fitted components.
    pub model: PcaModel,
}

/// Runs the standardizer, the engine and the interpretation layer over `observations`.
pub fn run_pipeline(observations: &Observations, config: &PcaConfig) -> Result<PipelineOutput> {
    config.validate()?;
    let start_time = Instant::now();

    let standardized = Standardizer::from_config(config).fit_transform(observations)?;
    let fit = PcaEngine::new(config.clone()).fit(&standardized.observations)?;
    let interpretation = Interpretation::from_fit(&fit);
    let model = PcaModel::from_standardized_fit(&standardized, &fit)?;

    info!(
        "Pipeline finished in {:?}: {} components over {} samples.",
        start_time.elapsed(),
        fit.n_components(),
        observations.n_samples()
    );

    Ok(PipelineOutput {
        standardized,
        fit,
        interpretation,
        model,
    })
}

/// Loads and joins both tables, then runs the pipeline over the joined observations.
pub fn run_from_paths<P: AsRef<Path>, Q: AsRef<Path>>(
    measurements_path: P,
    metadata_path: Q,
    config: &PcaConfig,
) -> Result<(Dataset, PipelineOutput)> {
    config.validate()?;
    let start_time = Instant::now();
    let dataset = Dataset::from_paths(measurements_path, metadata_path, &config.loader)?;
    info!(
        "Loaded {} samples x {} elements in {:?}.",
        dataset.observations.n_samples(),
        dataset.observations.n_variables(),
        start_time.elapsed()
    );
    let output = run_pipeline(&dataset.observations, config)?;
    Ok((dataset, output))
}
