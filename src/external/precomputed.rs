//! Collaborators backed by matrices computed ahead of time.
//!
//! Useful when classification or source tracking ran elsewhere and only the
//! exported probabilities or mixing proportions are at hand.

use super::{Classifier, CrossValidated, Prediction, SampleLabels, SourceTracker, SourceTrackingRequest};
use crate::data::{CountMatrix, LabelMatrix};
use crate::error::{MislabeledError, Result};
use std::path::Path;

/// Serves stored classification probabilities.
#[derive(Debug, Clone)]
pub struct PrecomputedClassifier {
    probabilities: LabelMatrix,
}

impl PrecomputedClassifier {
    pub fn new(probabilities: LabelMatrix) -> Self {
        Self { probabilities }
    }

    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(LabelMatrix::from_tsv(path)?))
    }

    /// Stored rows for the samples of `table`, in table order.
    fn rows_for<'a>(&self, sample_ids: impl Iterator<Item = &'a String>) -> Result<LabelMatrix> {
        let ids: Vec<&String> = sample_ids.collect();
        let rows = self.probabilities.retain_samples(&ids);
        if rows.n_samples() < ids.len() {
            log::warn!(
                "Stored probabilities cover {} of {} requested samples",
                rows.n_samples(),
                ids.len()
            );
        }
        if rows.n_samples() == 0 {
            return Err(MislabeledError::external(
                "classify",
                "no stored probabilities for any sample in the table",
            ));
        }
        Ok(rows)
    }
}

impl Classifier for PrecomputedClassifier {
    type Model = ();

    fn classify_cv(
        &self,
        table: &CountMatrix,
        labels: &SampleLabels,
        _n_jobs: usize,
    ) -> Result<CrossValidated<()>> {
        let probabilities = self.rows_for(
            table
                .sample_ids()
                .iter()
                .filter(|sid| labels.contains_key(sid.as_str())),
        )?;
        Ok(CrossValidated {
            model: (),
            features: table.feature_ids().to_vec(),
            probabilities,
        })
    }

    fn fit(&self, _table: &CountMatrix, _labels: &SampleLabels, _n_jobs: usize) -> Result<()> {
        Ok(())
    }

    fn predict(&self, table: &CountMatrix, _model: &(), _n_jobs: usize) -> Result<Prediction> {
        let probabilities = self.rows_for(table.sample_ids().iter())?;
        Ok(Prediction::from_probabilities(probabilities))
    }
}

/// Serves stored mixing proportions.
#[derive(Debug, Clone)]
pub struct PrecomputedSourceTracker {
    proportions: LabelMatrix,
}

impl PrecomputedSourceTracker {
    /// `proportions` must hold one row per sink.
    pub fn new(proportions: LabelMatrix) -> Self {
        Self { proportions }
    }

    /// Load proportions; `transpose_on_load` reads sources-as-rows files.
    pub fn from_tsv<P: AsRef<Path>>(path: P, transpose_on_load: bool) -> Result<Self> {
        let proportions = if transpose_on_load {
            LabelMatrix::from_tsv_transposed(path)?
        } else {
            LabelMatrix::from_tsv(path)?
        };
        Ok(Self::new(proportions))
    }
}

impl SourceTracker for PrecomputedSourceTracker {
    fn estimate_proportions(&self, request: &SourceTrackingRequest<'_>) -> Result<LabelMatrix> {
        let ids: Vec<&str> = request
            .evaluated()
            .map(|s| s.sample_id.as_str())
            .filter(|sid| request.table.has_sample(sid))
            .collect();
        let rows = self.proportions.retain_samples(&ids);
        log::debug!(
            "Stored proportions cover {} of {} evaluated samples",
            rows.n_samples(),
            ids.len()
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SourceSinkRole;
    use crate::external::TrackedSample;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_table() -> CountMatrix {
        CountMatrix::from_triplets(
            vec!["f1".into()],
            vec!["S1".into(), "S2".into()],
            vec![(0, 0, 5), (0, 1, 5)],
        )
        .unwrap()
    }

    fn create_test_matrix() -> LabelMatrix {
        LabelMatrix::from_rows(
            vec!["gut".into(), "skin".into()],
            vec![
                ("S2", vec![0.1, 0.9]),
                ("S3", vec![0.5, 0.5]),
                ("S1", vec![0.8, 0.2]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_classify_restricted_to_table() {
        let clf = PrecomputedClassifier::new(create_test_matrix());
        let labels: SampleLabels = vec![("S1".to_string(), "gut".to_string()), ("S2".to_string(), "gut".to_string())]
            .into_iter()
            .collect();
        let cv = clf.classify_cv(&create_test_table(), &labels, 1).unwrap();
        assert_eq!(cv.probabilities.sample_ids(), &["S1", "S2"]);
        assert_eq!(cv.features, vec!["f1"]);
    }

    #[test]
    fn test_predict_labels_are_argmax() {
        let clf = PrecomputedClassifier::new(create_test_matrix());
        let pred = clf.predict(&create_test_table(), &(), 1).unwrap();
        assert_eq!(pred.labels["S1"], "gut");
        assert_eq!(pred.labels["S2"], "skin");
    }

    #[test]
    fn test_source_tracker_sinks_only_without_loo() {
        let tracker = PrecomputedSourceTracker::new(create_test_matrix());
        let table = create_test_table();
        let samples = vec![
            TrackedSample {
                sample_id: "S1".into(),
                role: SourceSinkRole::Source,
                label: "gut".into(),
            },
            TrackedSample {
                sample_id: "S2".into(),
                role: SourceSinkRole::Sink,
                label: "skin".into(),
            },
        ];

        let request = SourceTrackingRequest::new(&table, &samples, "env", 1, false);
        let props = tracker.estimate_proportions(&request).unwrap();
        assert_eq!(props.sample_ids(), &["S2"]);

        let request = SourceTrackingRequest::new(&table, &samples, "env", 1, true);
        let props = tracker.estimate_proportions(&request).unwrap();
        assert_eq!(props.sample_ids(), &["S1", "S2"]);
    }

    #[test]
    fn test_transpose_on_load() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "#SampleID\tS1\tS2").unwrap();
        writeln!(file, "gut\t0.7\t0.2").unwrap();
        writeln!(file, "skin\t0.3\t0.8").unwrap();
        file.flush().unwrap();

        let tracker = PrecomputedSourceTracker::from_tsv(file.path(), true).unwrap();
        assert_eq!(tracker.proportions.get("S2", "skin"), Some(0.8));
    }
}
