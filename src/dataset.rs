// src/dataset.rs

//! Loading and joining of the elemental measurement table and the sample metadata table.

use crate::config::{ElementSelector, LoaderOptions};
use crate::error::{PcaError, Result};
use log::{debug, info, warn};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// A delimited text table read verbatim: a header row plus string cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Reads a table with a header row. Cells are trimmed.
pub fn read_table<R: Read>(reader: R, delimiter: u8) -> Result<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.is_empty() {
        return Err(PcaError::SchemaMismatch {
            context: "table header".into(),
            message: "table has no columns".into(),
        });
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }
    Ok(RawTable { headers, rows })
}

pub fn read_table_from_path<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<RawTable> {
    let file = File::open(path.as_ref())?;
    read_table(file, delimiter)
}

/// Numeric observations: `n_samples x n_variables`, with sample and variable labels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observations {
    sample_ids: Vec<String>,
    variables: Vec<String>,
    values: Array2<f64>,
}

impl Observations {
    /// Builds a labeled matrix, checking that the labels match its shape.
    pub fn new(sample_ids: Vec<String>, variables: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if sample_ids.len() != values.nrows() || variables.len() != values.ncols() {
            return Err(PcaError::SchemaMismatch {
                context: "observations".into(),
                message: format!(
                    "{} sample ids and {} variable names for a {}x{} matrix",
                    sample_ids.len(),
                    variables.len(),
                    values.nrows(),
                    values.ncols()
                ),
            });
        }
        Ok(Self { sample_ids, variables, values })
    }

    /// Unlabeled data: variables are named `x1..xp`, samples `0..n-1`.
    pub fn from_array(values: Array2<f64>) -> Self {
        let sample_ids = (0..values.nrows()).map(|i| i.to_string()).collect();
        let variables = (1..=values.ncols()).map(|j| format!("x{}", j)).collect();
        Self { sample_ids, variables, values }
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    pub fn n_samples(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_variables(&self) -> usize {
        self.values.ncols()
    }

    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v == name)
    }

    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        let j = self
            .variable_index(name)
            .ok_or_else(|| PcaError::UnknownSelection(format!("variable '{}'", name)))?;
        Ok(self.values.column(j))
    }

    /// Restricts the observations to the named variables, in the given order.
    pub fn select_variables<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let indices = names
            .iter()
            .map(|n| {
                self.variable_index(n.as_ref())
                    .ok_or_else(|| PcaError::UnknownSelection(format!("variable '{}'", n.as_ref())))
            })
            .collect::<Result<Vec<usize>>>()?;
        Ok(Self {
            sample_ids: self.sample_ids.clone(),
            variables: names.iter().map(|n| n.as_ref().to_string()).collect(),
            values: self.values.select(Axis(1), &indices),
        })
    }

    /// Rejects NaN and infinite entries, naming the first offending cell.
    pub fn check_finite(&self, context: &str) -> Result<()> {
        for ((i, j), v) in self.values.indexed_iter() {
            if !v.is_finite() {
                return Err(PcaError::SchemaMismatch {
                    context: context.to_string(),
                    message: format!(
                        "non-finite value {} in column '{}' for sample '{}'",
                        v, self.variables[j], self.sample_ids[i]
                    ),
                });
            }
        }
        Ok(())
    }

    /// Same labels, new values of the same shape.
    pub(crate) fn with_values(&self, values: Array2<f64>) -> Self {
        debug_assert_eq!(values.dim(), self.values.dim());
        Self {
            sample_ids: self.sample_ids.clone(),
            variables: self.variables.clone(),
            values,
        }
    }
}

/// Per-sample attributes (rock type, site, depth, ...) aligned with the observation rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Metadata {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Metadata {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some(bad) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(PcaError::SchemaMismatch {
                context: "metadata".into(),
                message: format!("row {} has {} cells for {} columns", bad, rows[bad].len(), columns.len()),
            });
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_samples(&self) -> usize {
        self.rows.len()
    }

    /// Values of one column, one per sample.
    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let j = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| PcaError::UnknownSelection(format!("metadata column '{}'", name)))?;
        Ok(self.rows.iter().map(|r| r[j].as_str()).collect())
    }
}

/// Joined dataset: element concentrations plus the metadata of the same samples.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub observations: Observations,
    pub metadata: Metadata,
}

impl Dataset {
    /// Reads both tables from disk and joins them.
    pub fn from_paths<P: AsRef<Path>, Q: AsRef<Path>>(
        measurements_path: P,
        metadata_path: Q,
        options: &LoaderOptions,
    ) -> Result<Self> {
        let measurements = read_table_from_path(measurements_path, options.delimiter)?;
        let metadata = read_table_from_path(metadata_path, options.delimiter)?;
        Self::join(&measurements, &metadata, options)
    }

    /// Inner join of the measurement and metadata tables on `options.join_key`.
    ///
    /// Element columns are the measurement columns accepted by `options.element_selector`
    /// (never the key). A `Named` selector fixes their order and fails on a name the table
    /// lacks. The measurement table's row order is kept. Measurement columns that
    /// are not elements are carried into the metadata unless the metadata table already has a
    /// column of that name.
    pub fn join(measurements: &RawTable, metadata: &RawTable, options: &LoaderOptions) -> Result<Self> {
        let key = options.join_key.as_str();
        let m_key = measurements.column_index(key).ok_or_else(|| PcaError::SchemaMismatch {
            context: "measurement table".into(),
            message: format!("join key '{}' not found in columns {:?}", key, measurements.headers),
        })?;
        let md_key = metadata.column_index(key).ok_or_else(|| PcaError::SchemaMismatch {
            context: "metadata table".into(),
            message: format!("join key '{}' not found in columns {:?}", key, metadata.headers),
        })?;

        let element_cols = select_element_columns(measurements, m_key, &options.element_selector)?;
        if element_cols.is_empty() {
            return Err(PcaError::SchemaMismatch {
                context: "measurement table".into(),
                message: format!("no element columns selected by {:?}", options.element_selector),
            });
        }
        debug!(
            "Selected {} element columns: {:?}",
            element_cols.len(),
            element_cols.iter().map(|&j| &measurements.headers[j]).collect::<Vec<_>>()
        );

        let mut metadata_rows_by_key: HashMap<&str, usize> = HashMap::with_capacity(metadata.rows.len());
        for (i, row) in metadata.rows.iter().enumerate() {
            if metadata_rows_by_key.insert(row[md_key].as_str(), i).is_some() {
                return Err(PcaError::SchemaMismatch {
                    context: "metadata table".into(),
                    message: format!("duplicate key '{}' in column '{}'", row[md_key], key),
                });
            }
        }

        let metadata_cols: Vec<usize> = (0..metadata.headers.len()).filter(|&j| j != md_key).collect();
        let carried_cols: Vec<usize> = (0..measurements.headers.len())
            .filter(|&j| {
                j != m_key
                    && !element_cols.contains(&j)
                    && metadata.column_index(&measurements.headers[j]).is_none()
            })
            .collect();

        let mut seen_keys: HashSet<&str> = HashSet::with_capacity(measurements.rows.len());
        let mut sample_ids = Vec::new();
        let mut flat_values = Vec::new();
        let mut joined_meta_rows = Vec::new();
        let mut unmatched = 0usize;

        for row in &measurements.rows {
            let sample = row[m_key].as_str();
            if !seen_keys.insert(sample) {
                return Err(PcaError::SchemaMismatch {
                    context: "measurement table".into(),
                    message: format!("duplicate key '{}' in column '{}'", sample, key),
                });
            }
            let Some(&meta_idx) = metadata_rows_by_key.get(sample) else {
                unmatched += 1;
                continue;
            };

            for &j in &element_cols {
                flat_values.push(parse_cell(&row[j], &measurements.headers[j], sample)?);
            }

            let meta_row = &metadata.rows[meta_idx];
            let mut joined: Vec<String> = metadata_cols.iter().map(|&j| meta_row[j].clone()).collect();
            joined.extend(carried_cols.iter().map(|&j| row[j].clone()));
            joined_meta_rows.push(joined);
            sample_ids.push(sample.to_string());
        }

        let metadata_only = metadata_rows_by_key.len() - sample_ids.len();
        if unmatched > 0 || metadata_only > 0 {
            warn!(
                "Join on '{}' dropped {} measurement rows without metadata and {} metadata rows without measurements.",
                key, unmatched, metadata_only
            );
        }
        if sample_ids.is_empty() {
            return Err(PcaError::SchemaMismatch {
                context: "join".into(),
                message: format!("no sample keys in column '{}' are shared by both tables", key),
            });
        }

        let n_samples = sample_ids.len();
        let variables: Vec<String> = element_cols.iter().map(|&j| measurements.headers[j].clone()).collect();
        let values = Array2::from_shape_vec((n_samples, variables.len()), flat_values).map_err(|e| {
            PcaError::SchemaMismatch {
                context: "join".into(),
                message: format!("could not assemble observation matrix: {}", e),
            }
        })?;

        let mut meta_columns: Vec<String> = metadata_cols.iter().map(|&j| metadata.headers[j].clone()).collect();
        meta_columns.extend(carried_cols.iter().map(|&j| measurements.headers[j].clone()));

        info!(
            "Joined dataset on '{}': {} samples, {} elements, {} metadata columns.",
            key,
            n_samples,
            variables.len(),
            meta_columns.len()
        );

        Ok(Self {
            observations: Observations::new(sample_ids, variables, values)?,
            metadata: Metadata::new(meta_columns, joined_meta_rows)?,
        })
    }
}

/// Indices of the element columns, in selection order. Named columns must exist, must not be
/// the join key, and every selected header must be unique in the table.
fn select_element_columns(measurements: &RawTable, key_col: usize, selector: &ElementSelector) -> Result<Vec<usize>> {
    let schema_error = |message: String| PcaError::SchemaMismatch {
        context: "measurement table".into(),
        message,
    };

    let element_cols: Vec<usize> = match selector {
        ElementSelector::Named(names) => names
            .iter()
            .map(|name| match measurements.column_index(name) {
                Some(j) if j == key_col => Err(schema_error(format!(
                    "element column '{}' is the join key",
                    name
                ))),
                Some(j) => Ok(j),
                None => Err(schema_error(format!(
                    "element column '{}' not found in columns {:?}",
                    name, measurements.headers
                ))),
            })
            .collect::<Result<_>>()?,
        ElementSelector::MaxNameLength(_) => measurements
            .headers
            .iter()
            .enumerate()
            .filter(|(j, h)| *j != key_col && selector.matches(h))
            .map(|(j, _)| j)
            .collect(),
    };

    let mut seen: HashSet<&str> = HashSet::with_capacity(element_cols.len());
    for &j in &element_cols {
        let header = measurements.headers[j].as_str();
        let occurrences = measurements.headers.iter().filter(|h| *h == header).count();
        if occurrences > 1 || !seen.insert(header) {
            return Err(schema_error(format!("duplicate element column '{}'", header)));
        }
    }
    Ok(element_cols)
}

fn parse_cell(cell: &str, column: &str, sample: &str) -> Result<f64> {
    if cell.is_empty() {
        return Err(PcaError::MissingValue {
            column: column.to_string(),
            sample: sample.to_string(),
        });
    }
    let value: f64 = cell.parse().map_err(|_| PcaError::SchemaMismatch {
        context: format!("column '{}'", column),
        message: format!("value '{}' for sample '{}' is not numeric", cell, sample),
    })?;
    if !value.is_finite() {
        return Err(PcaError::SchemaMismatch {
            context: format!("column '{}'", column),
            message: format!("value '{}' for sample '{}' is not finite", cell, sample),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const MEASUREMENTS: &str = "\
Sample,Fe,Ca,Sr,Notes
A1,41000,12000,310,fresh
A2,39500,15500,290,weathered
B1,52000,8000,150,fresh
C9,47000,9100,200,orphan
";

    const METADATA: &str = "\
Sample,Formation,Depth
B1,Upper,12.5
A1,Lower,3.0
A2,Lower,4.1
";

    fn tables() -> (RawTable, RawTable) {
        (
            read_table(MEASUREMENTS.as_bytes(), b',').unwrap(),
            read_table(METADATA.as_bytes(), b',').unwrap(),
        )
    }

    #[test]
    fn join_keeps_measurement_order_and_drops_unmatched() {
        let (m, md) = tables();
        let ds = Dataset::join(&m, &md, &LoaderOptions::default()).unwrap();
        assert_eq!(ds.observations.sample_ids(), &["A1", "A2", "B1"]);
        assert_eq!(ds.observations.variables(), &["Fe", "Ca", "Sr"]);
        assert_eq!(
            ds.observations.values(),
            array![[41000., 12000., 310.], [39500., 15500., 290.], [52000., 8000., 150.]]
        );
        assert_eq!(ds.metadata.columns(), &["Formation", "Depth", "Notes"]);
        assert_eq!(ds.metadata.column("Formation").unwrap(), vec!["Lower", "Lower", "Upper"]);
        assert_eq!(ds.metadata.column("Notes").unwrap(), vec!["fresh", "weathered", "fresh"]);
    }

    #[test]
    fn missing_join_key_is_schema_mismatch() {
        let (m, md) = tables();
        let options = LoaderOptions {
            join_key: "SampleID".into(),
            ..LoaderOptions::default()
        };
        let err = Dataset::join(&m, &md, &options).unwrap_err();
        match err {
            PcaError::SchemaMismatch { context, message } => {
                assert_eq!(context, "measurement table");
                assert!(message.contains("SampleID"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_metadata_key_is_rejected() {
        let (m, _) = tables();
        let md = read_table("Sample,Formation\nA1,Lower\nA1,Upper\n".as_bytes(), b',').unwrap();
        let err = Dataset::join(&m, &md, &LoaderOptions::default()).unwrap_err();
        assert!(matches!(err, PcaError::SchemaMismatch { .. }));
    }

    #[test]
    fn empty_cell_is_missing_value() {
        let m = read_table("Sample,Fe,Ca\nA1,100,\nA2,120,30\n".as_bytes(), b',').unwrap();
        let md = read_table("Sample,Site\nA1,x\nA2,y\n".as_bytes(), b',').unwrap();
        let err = Dataset::join(&m, &md, &LoaderOptions::default()).unwrap_err();
        match err {
            PcaError::MissingValue { column, sample } => {
                assert_eq!(column, "Ca");
                assert_eq!(sample, "A1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_numeric_cell_is_type_mismatch() {
        let m = read_table("Sample,Fe\nA1,<LOD\n".as_bytes(), b',').unwrap();
        let md = read_table("Sample,Site\nA1,x\n".as_bytes(), b',').unwrap();
        let err = Dataset::join(&m, &md, &LoaderOptions::default()).unwrap_err();
        assert!(matches!(err, PcaError::SchemaMismatch { .. }));
    }

    #[test]
    fn short_join_key_is_not_an_element() {
        let m = read_table("ID\tFe\tMn\n1\t10\t2\n2\t11\t3\n".as_bytes(), b'\t').unwrap();
        let md = read_table("ID\tSite\n1\tx\n2\ty\n".as_bytes(), b'\t').unwrap();
        let options = LoaderOptions {
            join_key: "ID".into(),
            delimiter: b'\t',
            element_selector: ElementSelector::MaxNameLength(2),
        };
        let ds = Dataset::join(&m, &md, &options).unwrap();
        assert_eq!(ds.observations.variables(), &["Fe", "Mn"]);
    }

    #[test]
    fn named_selector_keeps_requested_order() {
        let (m, md) = tables();
        let options = LoaderOptions {
            element_selector: ElementSelector::Named(vec!["Sr".into(), "Fe".into()]),
            ..LoaderOptions::default()
        };
        let ds = Dataset::join(&m, &md, &options).unwrap();
        assert_eq!(ds.observations.variables(), &["Sr", "Fe"]);
        assert_eq!(ds.observations.column("Sr").unwrap(), array![310., 290., 150.]);
        assert_eq!(ds.metadata.columns(), &["Formation", "Depth", "Ca", "Notes"]);
    }

    #[test]
    fn named_selector_rejects_absent_column() {
        let (m, md) = tables();
        let options = LoaderOptions {
            element_selector: ElementSelector::Named(vec!["Sr".into(), "Fe".into(), "Zr".into()]),
            ..LoaderOptions::default()
        };
        match Dataset::join(&m, &md, &options).unwrap_err() {
            PcaError::SchemaMismatch { message, .. } => assert!(message.contains("'Zr'")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn named_selector_rejects_join_key() {
        let (m, md) = tables();
        let options = LoaderOptions {
            element_selector: ElementSelector::Named(vec!["Fe".into(), "Sample".into()]),
            ..LoaderOptions::default()
        };
        match Dataset::join(&m, &md, &options).unwrap_err() {
            PcaError::SchemaMismatch { message, .. } => assert!(message.contains("join key")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn repeated_element_header_is_rejected() {
        let m = read_table("Sample,Fe,Ca,Fe\nA1,1,2,3\nA2,4,5,6\n".as_bytes(), b',').unwrap();
        let md = read_table("Sample,Site\nA1,x\nA2,y\n".as_bytes(), b',').unwrap();
        match Dataset::join(&m, &md, &LoaderOptions::default()).unwrap_err() {
            PcaError::SchemaMismatch { message, .. } => assert!(message.contains("duplicate element column 'Fe'")),
            other => panic!("unexpected error: {other}"),
        }

        let options = LoaderOptions {
            element_selector: ElementSelector::Named(vec!["Ca".into(), "Ca".into()]),
            ..LoaderOptions::default()
        };
        assert!(matches!(
            Dataset::join(&m, &md, &options).unwrap_err(),
            PcaError::SchemaMismatch { .. }
        ));
    }

    #[test]
    fn duplicate_measurement_key_is_rejected() {
        let m = read_table("Sample,Fe\nA1,1\nA2,2\nA1,3\n".as_bytes(), b',').unwrap();
        let md = read_table("Sample,Site\nA1,x\nA2,y\n".as_bytes(), b',').unwrap();
        match Dataset::join(&m, &md, &LoaderOptions::default()).unwrap_err() {
            PcaError::SchemaMismatch { context, message } => {
                assert_eq!(context, "measurement table");
                assert!(message.contains("duplicate key 'A1'"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn join_without_shared_keys_fails() {
        let m = read_table("Sample,Fe\nA1,1\nA2,2\n".as_bytes(), b',').unwrap();
        let md = read_table("Sample,Site\nB1,x\nB2,y\n".as_bytes(), b',').unwrap();
        match Dataset::join(&m, &md, &LoaderOptions::default()).unwrap_err() {
            PcaError::SchemaMismatch { context, .. } => assert_eq!(context, "join"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn select_variables_reorders_and_rejects_unknown() {
        let obs = Observations::from_array(array![[1., 2., 3.], [4., 5., 6.]]);
        let sub = obs.select_variables(&["x3", "x1"]).unwrap();
        assert_eq!(sub.values(), array![[3., 1.], [6., 4.]]);
        assert!(matches!(
            obs.select_variables(&["Zr"]).unwrap_err(),
            PcaError::UnknownSelection(_)
        ));
    }

    #[test]
    fn observations_shape_is_checked() {
        let err = Observations::new(vec!["a".into()], vec!["Fe".into()], array![[1.0], [2.0]]).unwrap_err();
        assert!(matches!(err, PcaError::SchemaMismatch { .. }));
    }
}
