// Principal component analysis (PCA) of XRF geochemistry data

#![doc = include_str!("../README.md")]

pub mod config;
pub mod dataset;
pub mod diagnostics;
pub mod display;
pub mod engine;
pub mod error;
pub mod export;
pub mod interpret;
pub mod linalg_backends;
pub mod model;
pub mod pipeline;
pub mod standardize;

pub use config::{Ddof, ElementSelector, LoaderOptions, PcaConfig, Scaling, SignConvention, Solver, SolverFallback};
pub use dataset::{Dataset, Metadata, Observations, RawTable};
pub use diagnostics::FitDiagnostics;
pub use engine::{PcaEngine, PcaFit};
pub use error::{PcaError, Result};
pub use interpret::{Contribution, Interpretation, LabeledTable, VarianceRow, VarianceTable};
pub use model::PcaModel;
pub use pipeline::{run_from_paths, run_pipeline, PipelineOutput};
pub use standardize::{Standardized, Standardizer};
