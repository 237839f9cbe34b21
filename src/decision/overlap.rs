//! Joining sample records against a label matrix.

use crate::data::{LabelMatrix, SampleRecords};

/// A record matched to a matrix row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRow {
    pub sample_id: String,
    pub declared_label: String,
    /// Row of the sample in the matrix.
    pub row: usize,
}

/// Inner join of records and matrix rows on sample ID, in record order.
pub fn join(records: &SampleRecords, matrix: &LabelMatrix) -> Vec<MatchedRow> {
    records
        .iter()
        .filter_map(|(sid, record)| {
            matrix.row_index(sid).map(|row| MatchedRow {
                sample_id: sid.to_string(),
                declared_label: record.declared_label.clone(),
                row,
            })
        })
        .collect()
}
