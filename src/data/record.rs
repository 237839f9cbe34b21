//! Per-sample records accumulated across the pipeline stages.

use crate::data::metadata::Metadata;
use crate::data::tristate::TriState;
use crate::error::{MislabeledError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a sample in source tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSinkRole {
    Source,
    Sink,
}

impl SourceSinkRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Sink => "sink",
        }
    }
}

impl fmt::Display for SourceSinkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceSinkRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "source" => Ok(Self::Source),
            "sink" => Ok(Self::Sink),
            other => Err(format!("'{}' is not a source/sink role", other)),
        }
    }
}

/// Everything known about one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Environment label asserted for the sample.
    pub declared_label: String,
    /// Classifier probability of the declared label.
    pub alleged_probability: Option<f64>,
    pub mislabeled: TriState,
    /// Most probable label according to the classifier.
    pub corrected_label: Option<String>,
    pub source_sink: Option<SourceSinkRole>,
    /// Source-tracking proportion attributed to the declared label.
    pub min_proportion: Option<f64>,
    pub contaminated: TriState,
}

impl SampleRecord {
    /// A record holding only the declared label.
    pub fn new(declared_label: impl Into<String>) -> Self {
        Self {
            declared_label: declared_label.into(),
            alleged_probability: None,
            mislabeled: TriState::NotApplicable,
            corrected_label: None,
            source_sink: None,
            min_proportion: None,
            contaminated: TriState::NotApplicable,
        }
    }
}

/// Ordered table of sample records keyed by sample ID.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecords {
    label_column: String,
    records: IndexMap<String, SampleRecord>,
}

impl SampleRecords {
    /// Create an empty table for the given declared-label column.
    pub fn new(label_column: impl Into<String>) -> Self {
        Self {
            label_column: label_column.into(),
            records: IndexMap::new(),
        }
    }

    /// Build a table from `(sample_id, declared_label)` pairs.
    pub fn from_labels<I, S, L>(label_column: &str, labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, L)>,
        S: Into<String>,
        L: Into<String>,
    {
        let mut table = Self::new(label_column);
        for (sid, label) in labels {
            table.insert(sid.into(), SampleRecord::new(label))?;
        }
        Ok(table)
    }

    /// Build a table from a metadata column.
    ///
    /// Samples whose label is missing are left out.
    pub fn from_metadata(metadata: &Metadata, column: &str) -> Result<Self> {
        let pairs = metadata.column(column)?;
        let skipped = metadata.n_samples() - pairs.len();
        if skipped > 0 {
            log::warn!(
                "{} sample(s) have no value for '{}' and were left out",
                skipped,
                column
            );
        }
        if pairs.is_empty() {
            return Err(MislabeledError::EmptyData(format!(
                "No samples have a value for '{}'",
                column
            )));
        }
        Self::from_labels(column, pairs)
    }

    /// Add a record; sample IDs must be unique.
    pub fn insert(&mut self, sample_id: String, record: SampleRecord) -> Result<()> {
        if self.records.contains_key(&sample_id) {
            return Err(MislabeledError::SampleMismatch(format!(
                "Duplicate sample ID '{}'",
                sample_id
            )));
        }
        self.records.insert(sample_id, record);
        Ok(())
    }

    /// Name of the declared-label column.
    pub fn label_column(&self) -> &str {
        &self.label_column
    }

    /// Rename the declared-label column.
    pub fn rename_label_column(&mut self, name: impl Into<String>) {
        self.label_column = name.into();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, sample_id: &str) -> Option<&SampleRecord> {
        self.records.get(sample_id)
    }

    pub fn get_mut(&mut self, sample_id: &str) -> Option<&mut SampleRecord> {
        self.records.get_mut(sample_id)
    }

    pub fn contains(&self, sample_id: &str) -> bool {
        self.records.contains_key(sample_id)
    }

    /// Sample IDs in table order.
    pub fn sample_ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SampleRecord)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut SampleRecord)> {
        self.records.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Sorted unique declared labels.
    pub fn declared_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .records
            .values()
            .map(|r| r.declared_label.clone())
            .collect();
        labels.sort();
        labels.dedup();
        labels
    }

    /// Append every record of `other`; the label columns must agree.
    pub fn extend(&mut self, other: SampleRecords) -> Result<()> {
        if other.label_column != self.label_column {
            return Err(MislabeledError::InvalidParameter(format!(
                "Cannot concatenate records labelled by '{}' with records labelled by '{}'",
                other.label_column, self.label_column
            )));
        }
        for (sid, record) in other.records {
            self.insert(sid, record)?;
        }
        Ok(())
    }

    /// Keep only the records whose IDs satisfy the predicate.
    pub fn retain<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.records.retain(|sid, _| keep(sid));
    }

    /// Count flags and corrections across the table.
    pub fn summary(&self) -> MislabelSummary {
        let mut summary = MislabelSummary {
            total: self.len(),
            ..MislabelSummary::default()
        };
        for record in self.records.values() {
            summary.mislabeled.add(record.mislabeled);
            summary.contaminated.add(record.contaminated);
            if let Some(corrected) = &record.corrected_label {
                if corrected != &record.declared_label {
                    summary.relabeled += 1;
                }
            }
        }
        summary
    }
}

/// Tally of a tri-state column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagCounts {
    pub flagged: usize,
    pub cleared: usize,
    pub not_applicable: usize,
}

impl FlagCounts {
    fn add(&mut self, flag: TriState) {
        match flag {
            TriState::True => self.flagged += 1,
            TriState::False => self.cleared += 1,
            TriState::NotApplicable => self.not_applicable += 1,
        }
    }
}

/// Summary statistics for a result table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MislabelSummary {
    pub total: usize,
    pub mislabeled: FlagCounts,
    pub contaminated: FlagCounts,
    /// Scored samples whose most probable label differs from the declared one.
    pub relabeled: usize,
}

impl fmt::Display for MislabelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Samples: {}", self.total)?;
        writeln!(
            f,
            "Mislabeled:   {} flagged, {} clear, {} not applicable",
            self.mislabeled.flagged, self.mislabeled.cleared, self.mislabeled.not_applicable
        )?;
        writeln!(
            f,
            "Contaminated: {} flagged, {} clear, {} not applicable",
            self.contaminated.flagged, self.contaminated.cleared, self.contaminated.not_applicable
        )?;
        writeln!(f, "Corrected label differs from declared: {}", self.relabeled)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_labels_rejects_duplicates() {
        let result = SampleRecords::from_labels("env", vec![("a", "fecal"), ("a", "oral")]);
        assert!(matches!(result, Err(MislabeledError::SampleMismatch(_))));
    }

    #[test]
    fn test_from_metadata_skips_missing_labels() {
        let mut meta = Metadata::from_column("env", vec![("a", "fecal"), ("b", "oral")]);
        meta.set_column("other", vec![("a", "x".to_string())]);
        let records = SampleRecords::from_metadata(&meta, "other").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records.get("a").unwrap().declared_label, "x");
    }

    #[test]
    fn test_extend_requires_same_label_column() {
        let mut a = SampleRecords::from_labels("env", vec![("a", "fecal")]).unwrap();
        let b = SampleRecords::from_labels("body_site", vec![("b", "oral")]).unwrap();
        assert!(a.extend(b).is_err());

        let mut c = SampleRecords::from_labels("body_site", vec![("c", "skin")]).unwrap();
        c.rename_label_column("env");
        a.extend(c).unwrap();
        assert_eq!(a.sample_ids().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn test_summary() {
        let mut records =
            SampleRecords::from_labels("env", vec![("a", "fecal"), ("b", "oral"), ("c", "skin")])
                .unwrap();
        {
            let a = records.get_mut("a").unwrap();
            a.mislabeled = TriState::True;
            a.corrected_label = Some("oral".into());
        }
        {
            let b = records.get_mut("b").unwrap();
            b.mislabeled = TriState::False;
            b.corrected_label = Some("oral".into());
            b.contaminated = TriState::True;
        }

        let summary = records.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.mislabeled.flagged, 1);
        assert_eq!(summary.mislabeled.cleared, 1);
        assert_eq!(summary.mislabeled.not_applicable, 1);
        assert_eq!(summary.contaminated.flagged, 1);
        assert_eq!(summary.relabeled, 1);
    }
}
