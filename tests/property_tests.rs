// Invariants of a fit checked over seeded random datasets of several shapes.

use approx::assert_abs_diff_eq;
use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use xrf_pca::diagnostics::orthogonality_error;
use xrf_pca::{run_pipeline, Ddof, Observations, PcaConfig};

fn random_concentrations(n_samples: usize, n_features: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let base = Array2::random_using((n_samples, 1), Uniform::new(100., 1000.), &mut rng);
    let noise = Array2::random_using((n_samples, n_features), Uniform::new(0., 300.), &mut rng);
    &noise + &base
}

#[test]
fn fit_invariants_hold_across_shapes_and_seeds() {
    let shapes = [(12, 3), (30, 8), (100, 15), (16, 15)];
    for (seed, &(n, p)) in shapes.iter().enumerate() {
        for ddof in [Ddof::Sample, Ddof::Population] {
            let config = PcaConfig {
                ddof,
                ..PcaConfig::default()
            };
            let x = Observations::from_array(random_concentrations(n, p, seed as u64));
            let output = run_pipeline(&x, &config).unwrap();
            let fit = &output.fit;
            let context = format!("{}x{} ddof={:?}", n, p, ddof);

            assert!(orthogonality_error(fit.components().view()) < 1e-8, "{}", context);
            for k in 1..p {
                assert!(fit.eigenvalues()[k - 1] >= fit.eigenvalues()[k], "{}", context);
            }
            assert_abs_diff_eq!(fit.explained_variance_ratio().sum(), 1.0, epsilon = 1e-6);
            assert_abs_diff_eq!(fit.total_variance(), p as f64, epsilon = 1e-8);
            assert!(fit.diagnostics().reconstruction_error < 1e-6, "{}", context);

            let rebuilt = fit.scores().dot(&fit.components().t());
            for (a, b) in rebuilt.iter().zip(output.standardized.observations.values().iter()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
            }

            for c in fit.score_correlations().iter() {
                assert!(c.abs() <= 1.0 + 1e-12, "{}", context);
            }
        }
    }
}

#[test]
fn model_projection_of_training_data_matches_scores() {
    for seed in 0..4u64 {
        let x = Observations::from_array(random_concentrations(40, 6, 100 + seed));
        let output = run_pipeline(&x, &PcaConfig::default()).unwrap();
        let projected = output.model.transform(&x).unwrap();
        for (a, b) in projected.iter().zip(output.fit.scores().iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
    }
}
