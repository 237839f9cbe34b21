//! Scoring a pipeline result against injected truth.

use super::inject::{original_label_column, INTENTIONAL_CONTAMINATION, INTENTIONAL_MISLABEL};
use crate::data::{Metadata, SampleRecords, TriState};
use crate::error::{MislabeledError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Detection counts for one kind of problem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionCounts {
    pub true_positives: usize,
    pub false_negatives: usize,
    pub false_positives: usize,
    /// Injected problems on samples that were never evaluated.
    pub not_evaluated: usize,
    /// Injected samples that were not flagged.
    pub missed: Vec<String>,
}

impl DetectionCounts {
    fn record(&mut self, sample_id: &str, injected: bool, called: TriState) {
        match (injected, called) {
            (true, TriState::True) => self.true_positives += 1,
            (true, TriState::False) => {
                self.false_negatives += 1;
                self.missed.push(sample_id.to_string());
            }
            (true, TriState::NotApplicable) => {
                self.not_evaluated += 1;
                self.missed.push(sample_id.to_string());
            }
            (false, TriState::True) => self.false_positives += 1,
            (false, _) => {}
        }
    }

    /// Fraction of injected problems that were flagged.
    pub fn sensitivity(&self) -> f64 {
        let injected = self.true_positives + self.false_negatives + self.not_evaluated;
        if injected == 0 {
            f64::NAN
        } else {
            self.true_positives as f64 / injected as f64
        }
    }
}

/// How well a result recovers injected mislabels and contamination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub samples: usize,
    pub mislabel: DetectionCounts,
    pub contamination: DetectionCounts,
    pub injected_mislabels: usize,
    /// Injected mislabels whose corrected label is the original label.
    pub labels_recovered: usize,
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Assessed samples: {}", self.samples)?;
        for (name, counts) in [("Mislabeling", &self.mislabel), ("Contamination", &self.contamination)] {
            writeln!(
                f,
                "{}: {} TP, {} FN, {} FP, {} not evaluated (sensitivity {:.2})",
                name,
                counts.true_positives,
                counts.false_negatives,
                counts.false_positives,
                counts.not_evaluated,
                counts.sensitivity()
            )?;
            if !counts.missed.is_empty() {
                writeln!(f, "  missed: {}", counts.missed.join(", "))?;
            }
        }
        writeln!(
            f,
            "Original label recovered: {} of {}",
            self.labels_recovered, self.injected_mislabels
        )?;
        Ok(())
    }
}

/// Compare `records` with truth columns written by problem injection.
pub fn assess(records: &SampleRecords, truth: &Metadata, label_column: &str) -> Result<Assessment> {
    let original_column = original_label_column(label_column);
    for column in [INTENTIONAL_MISLABEL, INTENTIONAL_CONTAMINATION, original_column.as_str()] {
        if !truth.has_column(column) {
            return Err(MislabeledError::MissingColumn(column.to_string()));
        }
    }

    let mut assessment = Assessment::default();
    for sid in truth.sample_ids() {
        let injected_mislabel = truth_flag(truth, sid, INTENTIONAL_MISLABEL);
        let injected_contamination = truth_flag(truth, sid, INTENTIONAL_CONTAMINATION);
        let record = records.get(sid);
        if record.is_some() {
            assessment.samples += 1;
        }

        let mislabeled = record.map(|r| r.mislabeled).unwrap_or_default();
        let contaminated = record.map(|r| r.contaminated).unwrap_or_default();
        assessment.mislabel.record(sid, injected_mislabel, mislabeled);
        assessment
            .contamination
            .record(sid, injected_contamination, contaminated);

        if injected_mislabel {
            assessment.injected_mislabels += 1;
            let original = truth.get(sid, &original_column);
            let corrected = record.and_then(|r| r.corrected_label.as_deref());
            if original.is_some() && original == corrected {
                assessment.labels_recovered += 1;
            }
        }
    }
    Ok(assessment)
}

fn truth_flag(truth: &Metadata, sample_id: &str, column: &str) -> bool {
    truth
        .get(sample_id, column)
        .map(|v| TriState::parse_lenient(v).is_true())
        .unwrap_or(false)
}
