// src/display.rs

//! Plot payloads derived from precomputed outputs.
//!
//! Each function maps a selection onto data that a renderer can draw. Nothing here refits
//! the PCA, and every payload serializes with serde.

use crate::dataset::{Dataset, Metadata};
use crate::error::{PcaError, Result};
use crate::interpret::{Interpretation, LabeledTable, VarianceTable};
use serde::Serialize;

/// Min, quartiles and max of a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FiveNumberSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl FiveNumberSummary {
    /// Quartiles interpolate linearly between order statistics. `None` for no values.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Some(Self {
            min: sorted[0],
            q1: quantile_sorted(&sorted, 0.25),
            median: quantile_sorted(&sorted, 0.5),
            q3: quantile_sorted(&sorted, 0.75),
            max: sorted[sorted.len() - 1],
        })
    }
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxGroup {
    /// Metadata value of the group, or the element name when ungrouped.
    pub label: String,
    pub n: usize,
    pub summary: FiveNumberSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxPlot {
    pub element: String,
    pub group_by: Option<String>,
    pub groups: Vec<BoxGroup>,
}

/// Distribution of one element's concentrations, optionally split by a metadata column.
/// Groups keep the order in which their values first appear.
pub fn box_plot(dataset: &Dataset, element: &str, group_by: Option<&str>) -> Result<BoxPlot> {
    let values = dataset
        .observations
        .column(element)
        .map_err(|_| PcaError::UnknownSelection(format!("element '{}'", element)))?;

    let mut grouped: Vec<(String, Vec<f64>)> = Vec::new();
    match group_by {
        None => grouped.push((element.to_string(), values.to_vec())),
        Some(column) => {
            let labels = aligned_metadata_column(&dataset.metadata, column, values.len())?;
            for (label, &v) in labels.into_iter().zip(values.iter()) {
                match grouped.iter().position(|(l, _)| l == label) {
                    Some(g) => grouped[g].1.push(v),
                    None => grouped.push((label.to_string(), vec![v])),
                }
            }
        }
    }

    let groups = grouped
        .into_iter()
        .filter_map(|(label, vs)| {
            FiveNumberSummary::from_values(&vs).map(|summary| BoxGroup {
                label,
                n: vs.len(),
                summary,
            })
        })
        .collect();

    Ok(BoxPlot {
        element: element.to_string(),
        group_by: group_by.map(str::to_string),
        groups,
    })
}

/// Inclusive bounds on one component axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisRange {
    pub component: String,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub sample: String,
    pub coordinates: Vec<f64>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreScatter {
    pub axes: Vec<String>,
    pub color_by: Option<String>,
    pub points: Vec<ScatterPoint>,
}

/// Sample scores on two or three components.
///
/// `color_by` names a metadata column whose rows line up with the score rows. With a
/// `range`, only samples whose score on that component lies in `[min, max]` are kept.
pub fn score_scatter(
    scores: &LabeledTable,
    axes: &[&str],
    metadata: &Metadata,
    color_by: Option<&str>,
    range: Option<&AxisRange>,
) -> Result<ScoreScatter> {
    if !(2..=3).contains(&axes.len()) {
        return Err(PcaError::UnknownSelection(format!(
            "a score plot needs 2 or 3 axes, got {}",
            axes.len()
        )));
    }
    let columns = axes
        .iter()
        .map(|a| {
            scores
                .column(a)
                .map_err(|_| PcaError::UnknownSelection(format!("component '{}'", a)))
        })
        .collect::<Result<Vec<_>>>()?;

    let n_samples = scores.row_labels.len();
    let colors = match color_by {
        Some(column) => Some(aligned_metadata_column(metadata, column, n_samples)?),
        None => None,
    };
    let filter = match range {
        Some(r) => Some((
            scores
                .column(&r.component)
                .map_err(|_| PcaError::UnknownSelection(format!("component '{}'", r.component)))?,
            r.min,
            r.max,
        )),
        None => None,
    };

    let points = (0..n_samples)
        .filter(|&i| match &filter {
            Some((values, min, max)) => values[i] >= *min && values[i] <= *max,
            None => true,
        })
        .map(|i| ScatterPoint {
            sample: scores.row_labels[i].clone(),
            coordinates: columns.iter().map(|c| c[i]).collect(),
            color: colors.as_ref().map(|c| c[i].to_string()),
        })
        .collect();

    Ok(ScoreScatter {
        axes: axes.iter().map(|a| a.to_string()).collect(),
        color_by: color_by.map(str::to_string),
        points,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadingBars {
    pub component: String,
    /// Contribution percent per variable, largest first.
    pub bars: Vec<Bar>,
}

pub fn loading_bars(interpretation: &Interpretation, component: &str) -> Result<LoadingBars> {
    let bars = interpretation
        .contributions(component)?
        .into_iter()
        .map(|c| Bar {
            label: c.variable,
            value: c.percent,
        })
        .collect();
    Ok(LoadingBars {
        component: component.to_string(),
        bars,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarianceBars {
    /// Explained variance percent per component.
    pub bars: Vec<Bar>,
    /// Cumulative percent, for the line drawn over the bars.
    pub cumulative: Vec<Bar>,
}

pub fn variance_bars(variance: &VarianceTable) -> VarianceBars {
    let bar = |label: &str, value: f64| Bar {
        label: label.to_string(),
        value: value * 100.0,
    };
    VarianceBars {
        bars: variance.rows.iter().map(|r| bar(&r.component, r.ratio)).collect(),
        cumulative: variance.rows.iter().map(|r| bar(&r.component, r.cumulative)).collect(),
    }
}

fn aligned_metadata_column<'a>(metadata: &'a Metadata, column: &str, n_samples: usize) -> Result<Vec<&'a str>> {
    let values = metadata.column(column)?;
    if values.len() != n_samples {
        return Err(PcaError::SchemaMismatch {
            context: "metadata".into(),
            message: format!("{} metadata rows for {} samples", values.len(), n_samples),
        });
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Observations;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn dataset() -> Dataset {
        Dataset {
            observations: Observations::new(
                vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
                vec!["Fe".into(), "Ca".into()],
                array![[1., 10.], [2., 20.], [3., 30.], [4., 40.], [10., 50.]],
            )
            .unwrap(),
            metadata: Metadata::new(
                vec!["Rock".into()],
                vec![
                    vec!["basalt".into()],
                    vec!["granite".into()],
                    vec!["basalt".into()],
                    vec!["granite".into()],
                    vec!["basalt".into()],
                ],
            )
            .unwrap(),
        }
    }

    #[test]
    fn five_number_summary_interpolates() {
        let s = FiveNumberSummary::from_values(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(s.min, 1.0);
        assert_abs_diff_eq!(s.q1, 1.75, epsilon = 1e-12);
        assert_abs_diff_eq!(s.median, 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(s.q3, 3.25, epsilon = 1e-12);
        assert_eq!(s.max, 4.0);
        assert!(FiveNumberSummary::from_values(&[]).is_none());
    }

    #[test]
    fn box_plot_groups_in_first_seen_order() {
        let plot = box_plot(&dataset(), "Fe", Some("Rock")).unwrap();
        let labels: Vec<&str> = plot.groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, ["basalt", "granite"]);
        assert_eq!(plot.groups[0].n, 3);
        assert_eq!(plot.groups[0].summary.median, 3.0);
        assert_eq!(plot.groups[1].summary.max, 4.0);
    }

    #[test]
    fn box_plot_ungrouped_has_one_group() {
        let plot = box_plot(&dataset(), "Ca", None).unwrap();
        assert_eq!(plot.groups.len(), 1);
        assert_eq!(plot.groups[0].summary.median, 30.0);
    }

    #[test]
    fn unknown_selections_are_rejected() {
        let ds = dataset();
        assert!(matches!(box_plot(&ds, "Zr", None), Err(PcaError::UnknownSelection(_))));
        assert!(matches!(box_plot(&ds, "Fe", Some("Site")), Err(PcaError::UnknownSelection(_))));
    }

    #[test]
    fn scatter_filters_by_range_and_colors_by_metadata() {
        let scores = LabeledTable {
            row_labels: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
            column_labels: vec!["PC1".into(), "PC2".into()],
            values: array![[-2., 0.1], [-1., 0.2], [0., 0.3], [1., 0.4], [2., 0.5]],
        };
        let range = AxisRange {
            component: "PC1".into(),
            min: -1.0,
            max: 1.0,
        };
        let scatter = score_scatter(&scores, &["PC1", "PC2"], &dataset().metadata, Some("Rock"), Some(&range)).unwrap();
        let samples: Vec<&str> = scatter.points.iter().map(|p| p.sample.as_str()).collect();
        assert_eq!(samples, ["b", "c", "d"]);
        assert_eq!(scatter.points[1].coordinates, vec![0.0, 0.3]);
        assert_eq!(scatter.points[0].color.as_deref(), Some("granite"));

        assert!(matches!(
            score_scatter(&scores, &["PC1"], &dataset().metadata, None, None),
            Err(PcaError::UnknownSelection(_))
        ));
        assert!(matches!(
            score_scatter(&scores, &["PC1", "PC3"], &dataset().metadata, None, None),
            Err(PcaError::UnknownSelection(_))
        ));
    }
}
