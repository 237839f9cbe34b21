//! Threshold decisions over accumulated sample records.
//!
//! Both engines are pure functions of their inputs. They join records to a
//! matrix by sample ID, look up the column for each sample's declared label,
//! and write tri-state flags back into the records.

pub mod contamination;
pub mod mask;
pub mod mislabel;
pub mod overlap;

pub use contamination::evaluate_contamination;
pub use mask::BelowThresholdMask;
pub use mislabel::evaluate_mislabeling;
pub use overlap::{join, MatchedRow};

use crate::data::LabelMatrix;
use crate::error::{MislabeledError, Result};
use std::collections::BTreeSet;

pub(crate) fn check_threshold(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(MislabeledError::InvalidParameter(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

/// Declared-label value for each matched row; unknown labels read as 0.
pub(crate) fn lookup_declared(matched: &[MatchedRow], matrix: &LabelMatrix, what: &str) -> Vec<f64> {
    let mut unknown = BTreeSet::new();
    let values = matched
        .iter()
        .map(|m| match matrix.value_at(m.row, &m.declared_label) {
            Some(v) => v,
            None => {
                unknown.insert(m.declared_label.as_str());
                0.0
            }
        })
        .collect();
    for label in unknown {
        log::warn!("Label '{}' has no column in {}; treating as 0", label, what);
    }
    values
}
