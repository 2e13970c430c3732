use ndarray::Array2;
use xrf_pca::display::variance_bars;
use xrf_pca::{run_pipeline, Observations, PcaConfig};

const X1: [f64; 25] = [
    3., 4., 6., 6., 6., 7., 7., 8., 9., 9., 9., 10., 11., 12., 12., 13., 13., 13., 13., 14., 15., 17., 17., 18., 20.,
];
const X2: [f64; 25] = [
    2., 10., 5., 8., 10., 2., 13., 9., 5., 8., 14., 7., 12., 10., 11., 6., 14., 15., 17., 7., 13., 13., 17., 19., 20.,
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let values = Array2::from_shape_fn((X1.len(), 2), |(i, j)| if j == 0 { X1[i] } else { X2[i] });
    let x = Observations::from_array(values);
    let output = run_pipeline(&x, &PcaConfig::default())?;

    println!("component  eigenvalue  ratio    cumulative");
    for row in &output.interpretation.variance.rows {
        println!(
            "{:<9}  {:>10.4}  {:>6.2}%  {:>6.2}%",
            row.component,
            row.eigenvalue,
            row.ratio * 100.0,
            row.cumulative * 100.0
        );
    }

    println!("\nloadings (component x variable):");
    let loadings = &output.interpretation.loadings;
    for (label, row) in loadings.row_labels.iter().zip(loadings.values.rows()) {
        println!("{:<5} {:?}", label, row.to_vec());
    }

    println!("\ncontributions to PC1:");
    for c in output.interpretation.contributions("PC1")? {
        println!("{:<4} {:>6.2}%", c.variable, c.percent);
    }

    println!("\nscree payload: {}", serde_json::to_string(&variance_bars(&output.interpretation.variance))?);
    println!("diagnostics: {:?}", output.fit.diagnostics());
    Ok(())
}
