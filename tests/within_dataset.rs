//! Integration tests for the within-dataset pipeline.

use mislabeled::external::{CrossValidated, Prediction};
use mislabeled::prelude::*;
use std::cell::{Cell, RefCell};
use std::io::Write;
use tempfile::NamedTempFile;

const LABELS: [&str; 3] = ["gut", "oral", "skin"];

/// Six samples at 200 reads, two per label, plus one at 50 reads.
fn write_table() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "# Constructed from biom file").unwrap();
    writeln!(file, "#OTU ID\tg1\tg2\to1\to2\ts1\ts2\tlow").unwrap();
    writeln!(file, "f_gut\t150\t140\t10\t20\t60\t30\t50").unwrap();
    writeln!(file, "f_oral\t30\t40\t170\t160\t20\t40\t0").unwrap();
    writeln!(file, "f_skin\t20\t20\t20\t20\t120\t130\t0").unwrap();
    file.flush().unwrap();
    file
}

fn write_metadata() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "sample-id\tenv\thost").unwrap();
    writeln!(file, "#q2:types\tcategorical\tcategorical").unwrap();
    for (sid, env) in [
        ("g1", "gut"),
        ("g2", "gut"),
        ("o1", "oral"),
        ("o2", "gut"),
        ("s1", "skin"),
        ("s2", "skin"),
        ("low", "gut"),
    ] {
        writeln!(file, "{}\t{}\thuman", sid, env).unwrap();
    }
    writeln!(file, "unlabelled\t\thuman").unwrap();
    file.flush().unwrap();
    file
}

fn probabilities() -> LabelMatrix {
    LabelMatrix::from_rows(
        LABELS.iter().map(|s| s.to_string()).collect(),
        vec![
            ("g1", vec![0.9, 0.05, 0.05]),
            ("g2", vec![0.8, 0.1, 0.1]),
            ("o1", vec![0.1, 0.8, 0.1]),
            // declared gut, looks oral
            ("o2", vec![0.1, 0.85, 0.05]),
            ("s1", vec![0.3, 0.1, 0.6]),
            ("s2", vec![0.2, 0.1, 0.7]),
            ("low", vec![0.1, 0.8, 0.1]),
        ],
    )
    .unwrap()
}

fn proportions() -> LabelMatrix {
    LabelMatrix::from_rows(
        LABELS.iter().map(|s| s.to_string()).collect(),
        vec![
            ("g1", vec![0.9, 0.05, 0.05]),
            ("g2", vec![0.7, 0.2, 0.1]),
            ("o1", vec![0.1, 0.85, 0.05]),
            ("o2", vec![0.05, 0.9, 0.05]),
            // skin sample carrying a lot of gut
            ("s1", vec![0.45, 0.1, 0.45]),
            ("s2", vec![0.1, 0.1, 0.8]),
        ],
    )
    .unwrap()
}

/// Classifier that records what it was given.
struct RecordingClassifier {
    inner: PrecomputedClassifier,
    calls: Cell<usize>,
    depths: RefCell<Vec<u64>>,
    labelled: RefCell<Vec<String>>,
}

impl RecordingClassifier {
    fn new(probabilities: LabelMatrix) -> Self {
        Self {
            inner: PrecomputedClassifier::new(probabilities),
            calls: Cell::new(0),
            depths: RefCell::new(Vec::new()),
            labelled: RefCell::new(Vec::new()),
        }
    }
}

impl Classifier for RecordingClassifier {
    type Model = ();

    fn classify_cv(
        &self,
        table: &CountMatrix,
        labels: &SampleLabels,
        n_jobs: usize,
    ) -> Result<CrossValidated<()>> {
        self.calls.set(self.calls.get() + 1);
        *self.depths.borrow_mut() = table.col_sums();
        *self.labelled.borrow_mut() = labels.keys().cloned().collect();
        self.inner.classify_cv(table, labels, n_jobs)
    }

    fn fit(&self, table: &CountMatrix, labels: &SampleLabels, n_jobs: usize) -> Result<()> {
        self.calls.set(self.calls.get() + 1);
        self.inner.fit(table, labels, n_jobs)
    }

    fn predict(&self, table: &CountMatrix, model: &(), n_jobs: usize) -> Result<Prediction> {
        self.calls.set(self.calls.get() + 1);
        self.inner.predict(table, model, n_jobs)
    }
}

/// Source tracker that records each request.
struct RecordingTracker {
    inner: PrecomputedSourceTracker,
    requests: RefCell<Vec<(bool, Vec<TrackedSample>, String)>>,
}

impl SourceTracker for RecordingTracker {
    fn estimate_proportions(&self, request: &SourceTrackingRequest<'_>) -> Result<LabelMatrix> {
        self.requests.borrow_mut().push((
            request.loo,
            request.samples.to_vec(),
            request.label_column.to_string(),
        ));
        self.inner.estimate_proportions(request)
    }
}

struct FailingTracker;

impl SourceTracker for FailingTracker {
    fn estimate_proportions(&self, _request: &SourceTrackingRequest<'_>) -> Result<LabelMatrix> {
        Err(MislabeledError::external("source tracking", "gibbs sampler diverged"))
    }
}

fn create_test_config() -> PipelineConfig {
    PipelineConfig {
        sampling_depth: 100,
        ..PipelineConfig::default()
    }
}

#[test]
fn test_within_dataset_end_to_end() {
    let table_file = write_table();
    let metadata_file = write_metadata();
    let table = CountMatrix::from_tsv(table_file.path()).unwrap();
    let metadata = Metadata::from_tsv(metadata_file.path()).unwrap();

    let config = create_test_config();
    let classifier = RecordingClassifier::new(probabilities());
    let tracker = RecordingTracker {
        inner: PrecomputedSourceTracker::new(proportions()),
        requests: RefCell::new(Vec::new()),
    };
    let tables = InProcessTables::new(config.seed);

    let records = MislabelPipeline::new(&config, &classifier, &tracker, &tables)
        .within(&Dataset::new(&table, &metadata, "env"))
        .unwrap();

    // the unlabelled sample is left out, the shallow one kept as not applicable
    assert_eq!(records.len(), 7);
    assert!(!records.contains("unlabelled"));

    // classifier saw the rarefied table, without the shallow sample
    assert_eq!(classifier.calls.get(), 1);
    assert!(classifier.depths.borrow().iter().all(|&d| d == 100));
    assert!(!classifier.labelled.borrow().contains(&"low".to_string()));

    // o2 is declared gut but scores 0.1
    let o2 = records.get("o2").unwrap();
    assert_eq!(o2.alleged_probability, Some(0.1));
    assert_eq!(o2.mislabeled, TriState::True);
    assert_eq!(o2.corrected_label.as_deref(), Some("oral"));
    assert_eq!(o2.source_sink, Some(SourceSinkRole::Sink));
    assert_eq!(o2.contaminated, TriState::NotApplicable);

    let s1 = records.get("s1").unwrap();
    assert_eq!(s1.mislabeled, TriState::False);
    assert_eq!(s1.source_sink, Some(SourceSinkRole::Source));
    assert_eq!(s1.min_proportion, Some(0.45));
    assert_eq!(s1.contaminated, TriState::True);

    let g1 = records.get("g1").unwrap();
    assert_eq!(g1.mislabeled, TriState::False);
    assert_eq!(g1.contaminated, TriState::False);

    let low = records.get("low").unwrap();
    assert_eq!(low.mislabeled, TriState::NotApplicable);
    assert_eq!(low.alleged_probability, None);
    assert_eq!(low.corrected_label, None);
    assert_eq!(low.min_proportion, None);

    // leave-one-out over every sample that got a role
    let requests = tracker.requests.borrow();
    assert_eq!(requests.len(), 1);
    let (loo, samples, column) = &requests[0];
    assert!(*loo);
    assert_eq!(column, "env");
    assert_eq!(samples.len(), 6);
    assert!(samples
        .iter()
        .any(|s| s.sample_id == "o2" && s.role == SourceSinkRole::Sink && s.label == "gut"));

    let summary = records.summary();
    assert_eq!(summary.mislabeled.flagged, 1);
    assert_eq!(summary.contaminated.flagged, 1);
}

#[test]
fn test_within_dataset_artifact_roundtrip() {
    let table_file = write_table();
    let metadata_file = write_metadata();
    let table = CountMatrix::from_tsv(table_file.path()).unwrap();
    let metadata = Metadata::from_tsv(metadata_file.path()).unwrap();

    let config = create_test_config();
    let classifier = PrecomputedClassifier::new(probabilities());
    let tracker = PrecomputedSourceTracker::new(proportions());
    let tables = InProcessTables::new(config.seed);

    let records = MislabelPipeline::new(&config, &classifier, &tracker, &tables)
        .within(&Dataset::new(&table, &metadata, "env"))
        .unwrap();

    let out = NamedTempFile::new().unwrap();
    records.to_tsv(out.path()).unwrap();
    assert!(MislabeledFormat::sniff(out.path()).unwrap());

    let loaded = SampleRecords::from_tsv(out.path()).unwrap();
    assert_eq!(loaded, records);
}

#[test]
fn test_within_dataset_tracker_failure_propagates() {
    let table_file = write_table();
    let metadata_file = write_metadata();
    let table = CountMatrix::from_tsv(table_file.path()).unwrap();
    let metadata = Metadata::from_tsv(metadata_file.path()).unwrap();

    let config = create_test_config();
    let classifier = RecordingClassifier::new(probabilities());
    let tables = InProcessTables::new(config.seed);

    let result = MislabelPipeline::new(&config, &classifier, &FailingTracker, &tables)
        .within(&Dataset::new(&table, &metadata, "env"));

    match result {
        Err(MislabeledError::External { procedure, message }) => {
            assert_eq!(procedure, "source tracking");
            assert_eq!(message, "gibbs sampler diverged");
        }
        other => panic!("expected external error, got {:?}", other.map(|r| r.len())),
    }
}

#[test]
fn test_within_dataset_thresholds_from_config() {
    let table_file = write_table();
    let metadata_file = write_metadata();
    let table = CountMatrix::from_tsv(table_file.path()).unwrap();
    let metadata = Metadata::from_tsv(metadata_file.path()).unwrap();

    // s1 scores 0.6 for skin: mislabeled under a stricter threshold
    let config = PipelineConfig {
        alleged_min_probability: 0.65,
        ..create_test_config()
    };
    let classifier = PrecomputedClassifier::new(probabilities());
    let tracker = PrecomputedSourceTracker::new(proportions());
    let tables = InProcessTables::new(config.seed);

    let records = MislabelPipeline::new(&config, &classifier, &tracker, &tables)
        .within(&Dataset::new(&table, &metadata, "env"))
        .unwrap();

    let s1 = records.get("s1").unwrap();
    assert_eq!(s1.mislabeled, TriState::True);
    assert_eq!(s1.corrected_label.as_deref(), Some("skin"));
    assert_eq!(s1.contaminated, TriState::NotApplicable);
}
