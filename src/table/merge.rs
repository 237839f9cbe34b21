//! Merging feature tables over disjoint sample sets.

use crate::data::CountMatrix;
use crate::error::{MislabeledError, Result};
use indexmap::IndexMap;
use std::collections::HashSet;

/// Union feature tables that share no samples.
///
/// Features are matched by ID; a feature missing from one table counts as
/// zero in that table's samples. Feature order follows first appearance.
pub fn merge(tables: &[&CountMatrix]) -> Result<CountMatrix> {
    if tables.is_empty() {
        return Err(MislabeledError::EmptyData("No tables to merge".to_string()));
    }

    let mut features: IndexMap<&str, usize> = IndexMap::new();
    let mut sample_ids = Vec::new();
    let mut seen = HashSet::new();
    for table in tables {
        for fid in table.feature_ids() {
            let next = features.len();
            features.entry(fid.as_str()).or_insert(next);
        }
        for sid in table.sample_ids() {
            if !seen.insert(sid.as_str()) {
                return Err(MislabeledError::SampleMismatch(format!(
                    "Sample '{}' appears in more than one table being merged",
                    sid
                )));
            }
            sample_ids.push(sid.clone());
        }
    }

    let mut triplets = Vec::new();
    let mut offset = 0;
    for table in tables {
        for (row, row_vec) in table.data().outer_iterator().enumerate() {
            let new_row = features[table.feature_ids()[row].as_str()];
            for (col, &val) in row_vec.iter() {
                triplets.push((new_row, offset + col, val));
            }
        }
        offset += table.n_samples();
    }

    let feature_ids = features.keys().map(|f| f.to_string()).collect();
    CountMatrix::from_triplets(feature_ids, sample_ids, triplets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_unions_features() {
        let a = CountMatrix::from_triplets(
            vec!["otu_1".into(), "otu_2".into()],
            vec!["A1".into(), "A2".into()],
            vec![(0, 0, 3), (1, 1, 4)],
        )
        .unwrap();
        let b = CountMatrix::from_triplets(
            vec!["otu_2".into(), "otu_3".into()],
            vec!["B1".into()],
            vec![(0, 0, 5), (1, 0, 6)],
        )
        .unwrap();

        let merged = merge(&[&a, &b]).unwrap();
        assert_eq!(merged.feature_ids(), &["otu_1", "otu_2", "otu_3"]);
        assert_eq!(merged.sample_ids(), &["A1", "A2", "B1"]);
        assert_eq!(merged.row_dense(0), vec![3, 0, 0]);
        assert_eq!(merged.row_dense(1), vec![0, 4, 5]);
        assert_eq!(merged.row_dense(2), vec![0, 0, 6]);
    }

    #[test]
    fn test_merge_rejects_shared_samples() {
        let a = CountMatrix::from_triplets(vec!["f".into()], vec!["S".into()], vec![(0, 0, 1)]).unwrap();
        assert!(matches!(
            merge(&[&a, &a]),
            Err(MislabeledError::SampleMismatch(_))
        ));
    }
}
