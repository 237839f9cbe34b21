//! Dense per-sample, per-label matrices.
//!
//! Classifier probabilities and source-tracking mixing proportions share the
//! same shape: one row per scored sample, one column per candidate label.

use crate::error::{MislabeledError, Result};
use nalgebra::DMatrix;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Slack allowed when checking that values lie in [0, 1].
const RANGE_TOLERANCE: f64 = 1e-9;

/// Samples × labels matrix of probabilities or proportions.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMatrix {
    values: DMatrix<f64>,
    sample_ids: Vec<String>,
    labels: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelMatrix {
    /// Create a matrix, validating shape, uniqueness and the [0, 1] range.
    pub fn new(values: DMatrix<f64>, sample_ids: Vec<String>, labels: Vec<String>) -> Result<Self> {
        if values.nrows() != sample_ids.len() {
            return Err(MislabeledError::DimensionMismatch {
                expected: values.nrows(),
                actual: sample_ids.len(),
            });
        }
        if values.ncols() != labels.len() {
            return Err(MislabeledError::DimensionMismatch {
                expected: values.ncols(),
                actual: labels.len(),
            });
        }

        let mut index = HashMap::with_capacity(sample_ids.len());
        for (i, sid) in sample_ids.iter().enumerate() {
            if index.insert(sid.clone(), i).is_some() {
                return Err(MislabeledError::SampleMismatch(format!(
                    "Duplicate sample ID '{}' in label matrix",
                    sid
                )));
            }
        }

        let mut seen = HashSet::with_capacity(labels.len());
        if let Some(dup) = labels.iter().find(|l| !seen.insert(l.as_str())) {
            return Err(MislabeledError::SampleMismatch(format!(
                "Duplicate label '{}' in label matrix",
                dup
            )));
        }

        for (row, sid) in sample_ids.iter().enumerate() {
            for (col, label) in labels.iter().enumerate() {
                let v = values[(row, col)];
                if !v.is_finite() || v < -RANGE_TOLERANCE || v > 1.0 + RANGE_TOLERANCE {
                    return Err(MislabeledError::InvalidValue {
                        value: v.to_string(),
                        sample: sid.clone(),
                        column: label.clone(),
                    });
                }
            }
        }

        Ok(Self {
            values,
            sample_ids,
            labels,
            index,
        })
    }

    /// Build from `(sample_id, row)` pairs in label order.
    pub fn from_rows<S: Into<String>>(
        labels: Vec<String>,
        rows: impl IntoIterator<Item = (S, Vec<f64>)>,
    ) -> Result<Self> {
        let mut sample_ids = Vec::new();
        let mut flat = Vec::new();
        for (sid, row) in rows {
            if row.len() != labels.len() {
                return Err(MislabeledError::DimensionMismatch {
                    expected: labels.len(),
                    actual: row.len(),
                });
            }
            sample_ids.push(sid.into());
            flat.extend(row);
        }
        let values = DMatrix::from_row_slice(sample_ids.len(), labels.len(), &flat);
        Self::new(values, sample_ids, labels)
    }

    /// Load a matrix with samples as rows and labels as columns.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (row_ids, col_ids, rows) = read_numeric_tsv(path.as_ref())?;
        Self::from_rows(col_ids, row_ids.into_iter().zip(rows))
    }

    /// Load a matrix stored with labels as rows and samples as columns.
    ///
    /// This is the orientation SourceTracker2 uses for mixing proportions.
    pub fn from_tsv_transposed<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_tsv(path)?.transpose())
    }

    /// Write the matrix with a `#SampleID` index header.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "#SampleID")?;
        for label in &self.labels {
            write!(writer, "\t{}", label)?;
        }
        writeln!(writer)?;

        for (row, sid) in self.sample_ids.iter().enumerate() {
            write!(writer, "{}", sid)?;
            for col in 0..self.labels.len() {
                write!(writer, "\t{}", self.values[(row, col)])?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Swap the roles of rows and columns.
    ///
    /// Rows and labels are both unique, so the result needs no revalidation.
    pub fn transpose(&self) -> Self {
        let values = self.values.transpose();
        let sample_ids = self.labels.clone();
        let index = sample_ids
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        Self {
            values,
            sample_ids,
            labels: self.sample_ids.clone(),
            index,
        }
    }

    /// Keep only the rows for the given samples (absent IDs are ignored).
    pub fn retain_samples<S: AsRef<str>>(&self, sample_ids: &[S]) -> Self {
        let mut seen = HashSet::new();
        let rows: Vec<usize> = sample_ids
            .iter()
            .filter_map(|s| self.row_index(s.as_ref()))
            .filter(|&r| seen.insert(r))
            .collect();
        let values = self.values.select_rows(rows.iter());
        let kept: Vec<String> = rows.iter().map(|&r| self.sample_ids[r].clone()).collect();
        let index = kept.iter().enumerate().map(|(i, s)| (s.clone(), i)).collect();
        Self {
            values,
            sample_ids: kept,
            labels: self.labels.clone(),
            index,
        }
    }

    /// Row identifiers.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Column labels, in matrix order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of rows.
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Underlying dense values.
    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    /// Row index of a sample.
    pub fn row_index(&self, sample_id: &str) -> Option<usize> {
        self.index.get(sample_id).copied()
    }

    /// Column index of a label.
    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Value for a sample and label, if both exist.
    pub fn get(&self, sample_id: &str, label: &str) -> Option<f64> {
        let row = self.row_index(sample_id)?;
        let col = self.label_index(label)?;
        Some(self.values[(row, col)])
    }

    /// Value at a row for a label, if the label exists.
    pub fn value_at(&self, row: usize, label: &str) -> Option<f64> {
        self.label_index(label).map(|col| self.values[(row, col)])
    }

    /// The label holding the largest value in a row.
    ///
    /// Ties resolve to the first maximum in column order.
    pub fn argmax(&self, row: usize) -> Option<&str> {
        let mut best: Option<(usize, f64)> = None;
        for col in 0..self.labels.len() {
            let v = self.values[(row, col)];
            match best {
                Some((_, b)) if v <= b => {}
                _ => best = Some((col, v)),
            }
        }
        best.map(|(col, _)| self.labels[col].as_str())
    }

    /// Sum of a row.
    pub fn row_sum(&self, row: usize) -> f64 {
        self.values.row(row).sum()
    }
}

type NumericTable = (Vec<String>, Vec<String>, Vec<Vec<f64>>);

/// Read a numeric TSV with an index column into (row ids, column ids, rows).
fn read_numeric_tsv(path: &Path) -> Result<NumericTable> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let header_line = lines
        .next()
        .ok_or_else(|| MislabeledError::EmptyData("Empty matrix file".to_string()))??;
    let header: Vec<&str> = header_line.split('\t').collect();
    if header.len() < 2 {
        return Err(MislabeledError::EmptyData(
            "Matrix must have at least one label column".to_string(),
        ));
    }
    let col_ids: Vec<String> = header[1..].iter().map(|s| s.trim().to_string()).collect();

    let mut row_ids = Vec::new();
    let mut rows = Vec::new();
    for line_result in lines {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let row_id = fields[0].trim().to_string();
        if fields.len() != col_ids.len() + 1 {
            return Err(MislabeledError::DimensionMismatch {
                expected: col_ids.len() + 1,
                actual: fields.len(),
            });
        }
        let mut row = Vec::with_capacity(col_ids.len());
        for (raw, col) in fields[1..].iter().zip(&col_ids) {
            let v: f64 = raw.trim().parse().map_err(|_| MislabeledError::InvalidValue {
                value: raw.to_string(),
                sample: row_id.clone(),
                column: col.clone(),
            })?;
            row.push(v);
        }
        row_ids.push(row_id);
        rows.push(row);
    }

    Ok((row_ids, col_ids, rows))
}
