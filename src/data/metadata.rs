//! Sample metadata handling.
//!
//! Metadata values are kept as categorical strings; the pipelines only ever
//! consume a single categorical column (the declared environment label).

use crate::error::{MislabeledError, Result};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Tokens treated as a missing value when loading.
const MISSING_TOKENS: [&str; 4] = ["", "NA", "na", "nan"];

/// Sample metadata containing categorical variables for each sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    /// Sample IDs in order.
    sample_ids: Vec<String>,
    /// Column names.
    column_names: Vec<String>,
    /// Data stored as sample_id -> column_name -> value.
    data: HashMap<String, HashMap<String, String>>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build metadata holding a single column.
    pub fn from_column<I, S, V>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<String>,
    {
        let mut meta = Self::new();
        meta.column_names.push(column.to_string());
        for (sid, value) in values {
            let sid = sid.into();
            let mut row = HashMap::new();
            row.insert(column.to_string(), value.into());
            if meta.data.insert(sid.clone(), row).is_none() {
                meta.sample_ids.push(sid);
            }
        }
        meta
    }

    /// Load metadata from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with column names (first column is sample ID)
    /// - Optional QIIME 2 directive rows starting with `#q2:`
    /// - Subsequent rows: sample ID followed by variable values
    ///
    /// Empty cells and `NA` are treated as missing.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .quoting(false)
            .comment(None)
            .from_path(path)?;
        let header = rdr.headers()?.clone();
        if header.is_empty() {
            return Err(MislabeledError::EmptyData("Empty metadata file".to_string()));
        }
        if header.len() < 2 {
            return Err(MislabeledError::EmptyData(
                "Metadata must have at least one variable column".to_string(),
            ));
        }

        let mut meta = Self {
            column_names: header.iter().skip(1).map(|s| s.trim().to_string()).collect(),
            ..Self::default()
        };
        for row in rdr.records() {
            let row = row?;
            let sample_id = row.get(0).unwrap_or_default().trim();
            if sample_id.is_empty() || sample_id.starts_with("#q2:") {
                continue;
            }
            let values: HashMap<String, String> = meta
                .column_names
                .iter()
                .zip(row.iter().skip(1).map(str::trim))
                .filter(|(_, raw)| !MISSING_TOKENS.contains(raw))
                .map(|(col, raw)| (col.clone(), raw.to_string()))
                .collect();
            if meta.data.insert(sample_id.to_string(), values).is_some() {
                return Err(MislabeledError::SampleMismatch(format!(
                    "Duplicate sample ID '{}' in metadata",
                    sample_id
                )));
            }
            meta.sample_ids.push(sample_id.to_string());
        }

        if meta.sample_ids.is_empty() {
            return Err(MislabeledError::EmptyData("No samples in metadata".to_string()));
        }
        Ok(meta)
    }

    /// Write metadata to a TSV file with a `#SampleID` index header.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut out = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Never)
            .from_path(path)?;
        out.write_record(std::iter::once("#SampleID").chain(self.column_names.iter().map(String::as_str)))?;
        for sid in &self.sample_ids {
            let values = self.column_names.iter().map(|col| self.get(sid, col).unwrap_or(""));
            out.write_record(std::iter::once(sid.as_str()).chain(values))?;
        }
        out.flush()?;
        Ok(())
    }

    /// Sample IDs in order.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Column names.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Get a value for a specific sample and column; `None` when missing.
    pub fn get(&self, sample_id: &str, column: &str) -> Option<&str> {
        self.data
            .get(sample_id)
            .and_then(|m| m.get(column))
            .map(String::as_str)
    }

    /// Get `(sample_id, value)` pairs for a column, skipping missing values.
    pub fn column(&self, column: &str) -> Result<Vec<(&str, &str)>> {
        if !self.has_column(column) {
            return Err(MislabeledError::MissingColumn(column.to_string()));
        }
        Ok(self
            .sample_ids
            .iter()
            .filter_map(|sid| self.get(sid, column).map(|v| (sid.as_str(), v)))
            .collect())
    }

    /// Get the sorted unique levels of a column.
    pub fn levels(&self, column: &str) -> Result<Vec<String>> {
        let levels: BTreeSet<String> = self
            .column(column)?
            .into_iter()
            .map(|(_, v)| v.to_string())
            .collect();
        Ok(levels.into_iter().collect())
    }

    /// Set (or add) a column from `(sample_id, value)` pairs.
    ///
    /// Values for samples not present in the metadata are ignored.
    pub fn set_column<'a, I>(&mut self, column: &str, values: I)
    where
        I: IntoIterator<Item = (&'a str, String)>,
    {
        if !self.has_column(column) {
            self.column_names.push(column.to_string());
        }
        for (sid, value) in values {
            if let Some(row) = self.data.get_mut(sid) {
                row.insert(column.to_string(), value);
            }
        }
    }

    /// Subset metadata to only include specified samples, in the given order.
    pub fn subset_samples(&self, sample_ids: &[String]) -> Result<Self> {
        let mut new_data = HashMap::new();
        let mut new_sample_ids = Vec::new();

        for sid in sample_ids {
            if let Some(sample_data) = self.data.get(sid) {
                new_data.insert(sid.clone(), sample_data.clone());
                new_sample_ids.push(sid.clone());
            } else {
                return Err(MislabeledError::SampleMismatch(format!(
                    "Sample '{}' not found in metadata",
                    sid
                )));
            }
        }

        Ok(Self {
            sample_ids: new_sample_ids,
            column_names: self.column_names.clone(),
            data: new_data,
        })
    }

    /// Check if a sample exists.
    pub fn has_sample(&self, sample_id: &str) -> bool {
        self.data.contains_key(sample_id)
    }

    /// Check if a column exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }
}
