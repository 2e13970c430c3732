// src/export.rs

//! CSV export of the interpretation tables.

use crate::error::Result;
use crate::interpret::{LabeledTable, VarianceTable};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a labeled matrix with `corner` as the header of the row-label column.
pub fn write_table<W: Write>(table: &LabeledTable, corner: &str, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(table.column_labels.len() + 1);
    header.push(corner.to_string());
    header.extend(table.column_labels.iter().cloned());
    wtr.write_record(&header)?;

    for (label, row) in table.row_labels.iter().zip(table.values.rows()) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(label.clone());
        record.extend(row.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_variance_table<W: Write>(table: &VarianceTable, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in &table.rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_table_to_path<P: AsRef<Path>>(table: &LabeledTable, corner: &str, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_table(table, corner, file)
}

pub fn write_variance_table_to_path<P: AsRef<Path>>(table: &VarianceTable, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_variance_table(table, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpret::VarianceRow;
    use ndarray::array;

    #[test]
    fn labeled_table_csv_layout() {
        let table = LabeledTable {
            row_labels: vec!["s1".into(), "s2".into()],
            column_labels: vec!["PC1".into(), "PC2".into()],
            values: array![[1.5, -2.0], [0.25, 3.0]],
        };
        let mut out = Vec::new();
        write_table(&table, "Sample", &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Sample,PC1,PC2\ns1,1.5,-2\ns2,0.25,3\n");
    }

    #[test]
    fn variance_table_csv_has_headers() {
        let table = VarianceTable {
            rows: vec![VarianceRow {
                component: "PC1".into(),
                eigenvalue: 2.0,
                ratio: 1.0,
                cumulative: 1.0,
            }],
        };
        let mut out = Vec::new();
        write_variance_table(&table, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "component,eigenvalue,ratio,cumulative\nPC1,2.0,1.0,1.0\n"
        );
    }
}
