//! Pipeline runner composing preparation, collaborators and decisions.

use crate::data::{CountMatrix, Metadata, SampleRecords, SourceSinkRole};
use crate::decision::{evaluate_contamination, evaluate_mislabeling, BelowThresholdMask};
use crate::error::{MislabeledError, Result};
use crate::external::{
    Classifier, SampleLabels, SourceTracker, SourceTrackingRequest, TrackedSample,
};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::prepare::Preparation;
use crate::table::FeatureTableOps;
use std::collections::HashSet;

/// A feature table with the metadata column holding declared labels.
#[derive(Debug, Clone, Copy)]
pub struct Dataset<'a> {
    pub table: &'a CountMatrix,
    pub metadata: &'a Metadata,
    pub label_column: &'a str,
}

impl<'a> Dataset<'a> {
    pub fn new(table: &'a CountMatrix, metadata: &'a Metadata, label_column: &'a str) -> Self {
        Self {
            table,
            metadata,
            label_column,
        }
    }

    fn records(&self) -> Result<SampleRecords> {
        SampleRecords::from_metadata(self.metadata, self.label_column)
    }

    fn preparation(&self, config: &PipelineConfig) -> Preparation {
        Preparation {
            sampling_depth: config.sampling_depth,
            min_samples: config.min_samples(self.table.n_samples()),
        }
    }
}

/// Mislabeling and contamination detection over configured collaborators.
///
/// # Example
///
/// ```no_run
/// use mislabeled::prelude::*;
///
/// let table = CountMatrix::from_tsv("table.tsv").unwrap();
/// let metadata = Metadata::from_tsv("metadata.tsv").unwrap();
/// let config = PipelineConfig::from_path("config.yaml").unwrap();
/// let (classifier, tracker) = config.backend().unwrap().build().unwrap();
/// let tables = InProcessTables::new(config.seed);
///
/// let records = MislabelPipeline::new(&config, &classifier, &tracker, &tables)
///     .within(&Dataset::new(&table, &metadata, "env"))
///     .unwrap();
/// records.to_tsv("mislabeled.tsv").unwrap();
/// ```
pub struct MislabelPipeline<'a, C, S, T: ?Sized> {
    config: &'a PipelineConfig,
    classifier: &'a C,
    tracker: &'a S,
    tables: &'a T,
}

impl<'a, C, S, T> MislabelPipeline<'a, C, S, T>
where
    C: Classifier,
    S: SourceTracker,
    T: FeatureTableOps + ?Sized,
{
    pub fn new(config: &'a PipelineConfig, classifier: &'a C, tracker: &'a S, tables: &'a T) -> Self {
        Self {
            config,
            classifier,
            tracker,
            tables,
        }
    }

    /// Assess a dataset against itself.
    ///
    /// The classifier is cross-validated on the rarefied, filtered table.
    /// Samples below the probability threshold become sinks and the rest
    /// sources, and leave-one-out source tracking runs on a separately
    /// prepared copy of the original table.
    pub fn within(&self, dataset: &Dataset<'_>) -> Result<SampleRecords> {
        self.config.validate()?;
        let mut records = dataset.records()?;
        let prep = dataset.preparation(self.config);
        log::info!(
            "Within-dataset assessment: {} features x {} samples, {} labelled by '{}'",
            dataset.table.n_features(),
            dataset.table.n_samples(),
            records.len(),
            dataset.label_column
        );

        log::info!("Preparing classification table");
        let class_table = prep.for_classification(self.tables, dataset.table)?;
        let labels = labels_in(&records, class_table.sample_ids());

        log::info!("Classifying {} samples", labels.len());
        let cv = self
            .classifier
            .classify_cv(&class_table, &labels, self.config.n_jobs)?;
        let mask = evaluate_mislabeling(
            &mut records,
            &cv.probabilities,
            self.config.alleged_min_probability,
        )?;
        assign_roles(&mut records, &mask);

        log::info!("Preparing source-tracking table");
        let st_table = prep.for_source_tracking(self.tables, dataset.table)?;
        let samples = tracked_samples(&records, &st_table);

        log::info!("Source tracking {} samples (leave-one-out)", samples.len());
        let request = SourceTrackingRequest::new(
            &st_table,
            &samples,
            records.label_column(),
            self.config.n_jobs,
            true,
        );
        let proportions = self.tracker.estimate_proportions(&request)?;
        evaluate_contamination(
            &mut records,
            &proportions,
            &mask,
            self.config.env_min_proportion,
        )?;

        log::info!("{}", records.summary());
        Ok(records)
    }

    /// Assess a focus dataset against a trusted reference.
    ///
    /// Every focus label must occur in the reference; this is checked before
    /// any table is touched. The output holds focus samples only, labelled by
    /// the reference's column name.
    pub fn against(&self, focus: &Dataset<'_>, reference: &Dataset<'_>) -> Result<SampleRecords> {
        self.config.validate()?;
        let mut focus_records = focus.records()?;
        let reference_records = reference.records()?;
        check_label_coverage(&focus_records, &reference_records)?;
        log::info!(
            "Against-dataset assessment: {} focus samples against {} reference samples",
            focus_records.len(),
            reference_records.len()
        );

        if focus.label_column != reference.label_column {
            log::info!(
                "Renaming focus column '{}' to '{}'",
                focus.label_column,
                reference.label_column
            );
            focus_records.rename_label_column(reference.label_column);
        }
        let focus_ids: HashSet<String> = focus_records.sample_ids().map(String::from).collect();

        let mut records = focus_records;
        set_role(&mut records, SourceSinkRole::Sink);
        let mut reference_records = reference_records;
        set_role(&mut reference_records, SourceSinkRole::Source);
        records.extend(reference_records)?;

        log::info!("Preparing focus and reference tables");
        let focus_table = focus
            .preparation(self.config)
            .for_classification(self.tables, focus.table)?;
        let reference_table = reference
            .preparation(self.config)
            .for_classification(self.tables, reference.table)?;

        let reference_labels = labels_in(&records, reference_table.sample_ids());
        log::info!("Training classifier on {} reference samples", reference_labels.len());
        let model = self
            .classifier
            .fit(&reference_table, &reference_labels, self.config.n_jobs)?;
        log::info!("Predicting {} focus samples", focus_table.n_samples());
        let prediction = self
            .classifier
            .predict(&focus_table, &model, self.config.n_jobs)?;
        let mask = evaluate_mislabeling(
            &mut records,
            &prediction.probabilities,
            self.config.alleged_min_probability,
        )?;

        let merged = self.tables.merge(&[&reference_table, &focus_table])?;
        let samples = tracked_samples(&records, &merged);
        log::info!("Source tracking {} samples", samples.len());
        let request = SourceTrackingRequest::new(
            &merged,
            &samples,
            records.label_column(),
            self.config.n_jobs,
            false,
        );
        let proportions = self.tracker.estimate_proportions(&request)?;
        evaluate_contamination(
            &mut records,
            &proportions,
            &mask,
            self.config.env_min_proportion,
        )?;

        records.retain(|sid| focus_ids.contains(sid));
        log::info!("{}", records.summary());
        Ok(records)
    }
}

/// Fail when the focus declares a label the reference never uses.
pub fn check_label_coverage(focus: &SampleRecords, reference: &SampleRecords) -> Result<()> {
    let known = reference.declared_labels();
    let missing: Vec<String> = focus
        .declared_labels()
        .into_iter()
        .filter(|label| !known.contains(label))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(MislabeledError::LabelMismatch { missing })
    }
}

/// Sink below threshold, source otherwise, no role when unscored.
fn assign_roles(records: &mut SampleRecords, mask: &BelowThresholdMask) {
    for (sid, record) in records.iter_mut() {
        record.source_sink = mask.get(sid).map(|below| {
            if below {
                SourceSinkRole::Sink
            } else {
                SourceSinkRole::Source
            }
        });
    }
}

fn set_role(records: &mut SampleRecords, role: SourceSinkRole) {
    for (_, record) in records.iter_mut() {
        record.source_sink = Some(role);
    }
}

/// Declared labels of the records present in `sample_ids`.
fn labels_in(records: &SampleRecords, sample_ids: &[String]) -> SampleLabels {
    sample_ids
        .iter()
        .filter_map(|sid| {
            records
                .get(sid)
                .map(|r| (sid.clone(), r.declared_label.clone()))
        })
        .collect()
}

/// Records with a role whose sample survived preparation.
fn tracked_samples(records: &SampleRecords, table: &CountMatrix) -> Vec<TrackedSample> {
    records
        .iter()
        .filter(|(sid, _)| table.has_sample(sid))
        .filter_map(|(sid, r)| {
            r.source_sink.map(|role| TrackedSample {
                sample_id: sid.to_string(),
                role,
                label: r.declared_label.clone(),
            })
        })
        .collect()
}
