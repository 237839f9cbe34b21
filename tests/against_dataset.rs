//! Integration tests for the against-dataset pipeline.

use mislabeled::external::{CrossValidated, Prediction};
use mislabeled::prelude::*;
use std::cell::{Cell, RefCell};

fn labels() -> Vec<String> {
    vec!["gut".into(), "oral".into(), "skin".into()]
}

/// Each sample has 200 reads split between a dominant and a minor feature.
fn create_table(sample_ids: &[&str], dominant: &[usize]) -> CountMatrix {
    let mut triplets = Vec::new();
    for (col, &feature) in dominant.iter().enumerate() {
        triplets.push((feature, col, 160));
        triplets.push(((feature + 1) % 3, col, 40));
    }
    CountMatrix::from_triplets(
        vec!["f_gut".into(), "f_oral".into(), "f_skin".into()],
        sample_ids.iter().map(|s| s.to_string()).collect(),
        triplets,
    )
    .unwrap()
}

fn create_reference() -> (CountMatrix, Metadata) {
    let ids = ["r_g1", "r_g2", "r_o1", "r_o2", "r_s1", "r_s2"];
    let table = create_table(&ids, &[0, 0, 1, 1, 2, 2]);
    let metadata = Metadata::from_column(
        "body_site",
        ids.iter()
            .zip(["gut", "gut", "oral", "oral", "skin", "skin"])
            .map(|(s, l)| (*s, l)),
    );
    (table, metadata)
}

fn create_focus(declared: [&str; 3]) -> (CountMatrix, Metadata) {
    let ids = ["f1", "f2", "f3"];
    let table = create_table(&ids, &[0, 1, 2]);
    let metadata = Metadata::from_column("env", ids.iter().zip(declared).map(|(s, l)| (*s, l)));
    (table, metadata)
}

struct CountingClassifier {
    inner: PrecomputedClassifier,
    calls: Cell<usize>,
    trained_on: RefCell<Vec<(String, String)>>,
}

impl CountingClassifier {
    fn new() -> Self {
        let probabilities = LabelMatrix::from_rows(
            labels(),
            vec![
                ("f1", vec![0.9, 0.05, 0.05]),
                ("f2", vec![0.1, 0.1, 0.8]),
                ("f3", vec![0.2, 0.1, 0.7]),
            ],
        )
        .unwrap();
        Self {
            inner: PrecomputedClassifier::new(probabilities),
            calls: Cell::new(0),
            trained_on: RefCell::new(Vec::new()),
        }
    }
}

impl Classifier for CountingClassifier {
    type Model = ();

    fn classify_cv(
        &self,
        table: &CountMatrix,
        labels: &SampleLabels,
        n_jobs: usize,
    ) -> Result<CrossValidated<()>> {
        self.calls.set(self.calls.get() + 1);
        self.inner.classify_cv(table, labels, n_jobs)
    }

    fn fit(&self, table: &CountMatrix, labels: &SampleLabels, n_jobs: usize) -> Result<()> {
        self.calls.set(self.calls.get() + 1);
        *self.trained_on.borrow_mut() = labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        self.inner.fit(table, labels, n_jobs)
    }

    fn predict(&self, table: &CountMatrix, model: &(), n_jobs: usize) -> Result<Prediction> {
        self.calls.set(self.calls.get() + 1);
        self.inner.predict(table, model, n_jobs)
    }
}

struct CountingTracker {
    inner: PrecomputedSourceTracker,
    calls: Cell<usize>,
    last: RefCell<Option<(bool, usize, Vec<TrackedSample>, String)>>,
}

impl CountingTracker {
    fn new() -> Self {
        let proportions = LabelMatrix::from_rows(
            labels(),
            vec![
                ("f1", vec![0.8, 0.1, 0.1]),
                ("f2", vec![0.1, 0.2, 0.7]),
                ("f3", vec![0.6, 0.1, 0.3]),
            ],
        )
        .unwrap();
        Self {
            inner: PrecomputedSourceTracker::new(proportions),
            calls: Cell::new(0),
            last: RefCell::new(None),
        }
    }
}

impl SourceTracker for CountingTracker {
    fn estimate_proportions(&self, request: &SourceTrackingRequest<'_>) -> Result<LabelMatrix> {
        self.calls.set(self.calls.get() + 1);
        *self.last.borrow_mut() = Some((
            request.loo,
            request.table.n_samples(),
            request.samples.to_vec(),
            request.label_column.to_string(),
        ));
        self.inner.estimate_proportions(request)
    }
}

#[derive(Default)]
struct CountingTables {
    inner: InProcessTables,
    calls: Cell<usize>,
    merges: Cell<usize>,
}

impl FeatureTableOps for CountingTables {
    fn filter_features(&self, table: &CountMatrix, min_samples: usize) -> Result<CountMatrix> {
        self.calls.set(self.calls.get() + 1);
        self.inner.filter_features(table, min_samples)
    }

    fn rarefy(&self, table: &CountMatrix, sampling_depth: u64) -> Result<CountMatrix> {
        self.calls.set(self.calls.get() + 1);
        self.inner.rarefy(table, sampling_depth)
    }

    fn merge(&self, tables: &[&CountMatrix]) -> Result<CountMatrix> {
        self.calls.set(self.calls.get() + 1);
        self.merges.set(self.merges.get() + 1);
        self.inner.merge(tables)
    }
}

fn create_test_config() -> PipelineConfig {
    PipelineConfig {
        sampling_depth: 100,
        ..PipelineConfig::default()
    }
}

#[test]
fn test_against_dataset_end_to_end() {
    let (ref_table, ref_meta) = create_reference();
    let (focus_table, focus_meta) = create_focus(["gut", "oral", "skin"]);
    let config = create_test_config();
    let classifier = CountingClassifier::new();
    let tracker = CountingTracker::new();
    let tables = CountingTables::default();

    let records = MislabelPipeline::new(&config, &classifier, &tracker, &tables)
        .against(
            &Dataset::new(&focus_table, &focus_meta, "env"),
            &Dataset::new(&ref_table, &ref_meta, "body_site"),
        )
        .unwrap();

    // only focus rows, relabelled to the reference column
    assert_eq!(records.sample_ids().collect::<Vec<_>>(), vec!["f1", "f2", "f3"]);
    assert_eq!(records.label_column(), "body_site");
    assert!(records
        .iter()
        .all(|(_, r)| r.source_sink == Some(SourceSinkRole::Sink)));

    // trained on reference labels only, then predicted
    assert_eq!(classifier.calls.get(), 2);
    let trained = classifier.trained_on.borrow();
    assert_eq!(trained.len(), 6);
    assert!(trained.iter().all(|(sid, _)| sid.starts_with("r_")));

    let f1 = records.get("f1").unwrap();
    assert_eq!(f1.mislabeled, TriState::False);
    assert_eq!(f1.contaminated, TriState::False);

    let f2 = records.get("f2").unwrap();
    assert_eq!(f2.alleged_probability, Some(0.1));
    assert_eq!(f2.mislabeled, TriState::True);
    assert_eq!(f2.corrected_label.as_deref(), Some("skin"));
    assert_eq!(f2.contaminated, TriState::NotApplicable);

    let f3 = records.get("f3").unwrap();
    assert_eq!(f3.mislabeled, TriState::False);
    assert_eq!(f3.min_proportion, Some(0.3));
    assert_eq!(f3.contaminated, TriState::True);

    // one non-LOO run over the merged tables
    assert_eq!(tables.merges.get(), 1);
    assert_eq!(tracker.calls.get(), 1);
    let last = tracker.last.borrow();
    let (loo, n_table_samples, samples, column) = last.as_ref().unwrap();
    assert!(!*loo);
    assert_eq!(*n_table_samples, 9);
    assert_eq!(column, "body_site");
    assert_eq!(samples.iter().filter(|s| s.role == SourceSinkRole::Source).count(), 6);
    assert_eq!(samples.iter().filter(|s| s.role == SourceSinkRole::Sink).count(), 3);
}

#[test]
fn test_against_dataset_label_mismatch_fails_fast() {
    let (ref_table, ref_meta) = create_reference();
    let (focus_table, focus_meta) = create_focus(["gut", "vaginal", "gut"]);
    let config = create_test_config();
    let classifier = CountingClassifier::new();
    let tracker = CountingTracker::new();
    let tables = CountingTables::default();

    let result = MislabelPipeline::new(&config, &classifier, &tracker, &tables).against(
        &Dataset::new(&focus_table, &focus_meta, "env"),
        &Dataset::new(&ref_table, &ref_meta, "body_site"),
    );

    match result {
        Err(MislabeledError::LabelMismatch { missing }) => assert_eq!(missing, vec!["vaginal"]),
        other => panic!("expected label mismatch, got {:?}", other.map(|r| r.len())),
    }
    assert_eq!(classifier.calls.get(), 0);
    assert_eq!(tracker.calls.get(), 0);
    assert_eq!(tables.calls.get(), 0);
}

#[test]
fn test_against_dataset_label_subset_check() {
    // focus {A, B} against reference {A}
    let focus = SampleRecords::from_labels("env", vec![("f1", "A"), ("f2", "B")]).unwrap();
    let reference = SampleRecords::from_labels("env", vec![("r1", "A")]).unwrap();
    assert!(matches!(
        mislabeled::pipeline::check_label_coverage(&focus, &reference),
        Err(MislabeledError::LabelMismatch { .. })
    ));
}

#[test]
fn test_against_dataset_shared_sample_ids_rejected() {
    let (ref_table, ref_meta) = create_reference();
    let focus_table = create_table(&["r_g1"], &[0]);
    let focus_meta = Metadata::from_column("env", vec![("r_g1", "gut")]);
    let config = create_test_config();
    let classifier = CountingClassifier::new();
    let tracker = CountingTracker::new();
    let tables = CountingTables::default();

    let result = MislabelPipeline::new(&config, &classifier, &tracker, &tables).against(
        &Dataset::new(&focus_table, &focus_meta, "env"),
        &Dataset::new(&ref_table, &ref_meta, "body_site"),
    );
    assert!(matches!(result, Err(MislabeledError::SampleMismatch(_))));
    assert_eq!(classifier.calls.get(), 0);
    assert_eq!(tables.calls.get(), 0);
}
