//! Collaborator contracts for classification and source tracking.
//!
//! The pipelines never train a model or estimate mixing proportions
//! themselves. They hand prepared tables to a [`Classifier`] and a
//! [`SourceTracker`] and consume the label matrices those return.

pub mod backend;
pub mod command;
pub mod precomputed;

pub use backend::{
    BackendConfig, BackendModel, ClassifierBackend, ClassifierConfig, SourceTrackerBackend,
    SourceTrackerConfig,
};
pub use command::{CommandClassifier, CommandModel, CommandSourceTracker};
pub use precomputed::{PrecomputedClassifier, PrecomputedSourceTracker};

use crate::data::{CountMatrix, LabelMatrix, SourceSinkRole};
use crate::error::Result;
use indexmap::IndexMap;

/// Declared label per sample, in sample order.
pub type SampleLabels = IndexMap<String, String>;

/// Output of a cross-validated classification run.
#[derive(Debug, Clone)]
pub struct CrossValidated<M> {
    pub model: M,
    /// Features the model was trained on.
    pub features: Vec<String>,
    /// Out-of-fold probability of each label, one row per sample.
    pub probabilities: LabelMatrix,
}

/// Output of applying a trained model to new samples.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub labels: SampleLabels,
    pub probabilities: LabelMatrix,
}

impl Prediction {
    /// Build a prediction whose labels are the per-row maxima.
    pub fn from_probabilities(probabilities: LabelMatrix) -> Self {
        let labels = probabilities
            .sample_ids()
            .iter()
            .enumerate()
            .filter_map(|(row, sid)| {
                probabilities
                    .argmax(row)
                    .map(|label| (sid.clone(), label.to_string()))
            })
            .collect();
        Self {
            labels,
            probabilities,
        }
    }
}

/// A supervised sample classifier.
pub trait Classifier {
    type Model;

    /// Cross-validated probabilities for every labelled sample in `table`.
    fn classify_cv(
        &self,
        table: &CountMatrix,
        labels: &SampleLabels,
        n_jobs: usize,
    ) -> Result<CrossValidated<Self::Model>>;

    fn fit(&self, table: &CountMatrix, labels: &SampleLabels, n_jobs: usize) -> Result<Self::Model>;

    fn predict(&self, table: &CountMatrix, model: &Self::Model, n_jobs: usize) -> Result<Prediction>;
}

/// One sample as seen by the source tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedSample {
    pub sample_id: String,
    pub role: SourceSinkRole,
    pub label: String,
}

/// Inputs to a source-tracking run.
#[derive(Debug, Clone)]
pub struct SourceTrackingRequest<'a> {
    pub table: &'a CountMatrix,
    pub samples: &'a [TrackedSample],
    /// Name of the column carrying each sample's source label.
    pub label_column: &'a str,
    pub n_jobs: usize,
    /// Also evaluate every source against the remaining sources.
    pub loo: bool,
    /// Rarefaction depth applied by the tracker, 0 for none.
    pub source_depth: u64,
    pub sink_depth: u64,
}

impl<'a> SourceTrackingRequest<'a> {
    pub fn new(
        table: &'a CountMatrix,
        samples: &'a [TrackedSample],
        label_column: &'a str,
        n_jobs: usize,
        loo: bool,
    ) -> Self {
        Self {
            table,
            samples,
            label_column,
            n_jobs,
            loo,
            source_depth: 0,
            sink_depth: 0,
        }
    }

    /// Samples that receive a proportion row: all of them under LOO, sinks otherwise.
    pub fn evaluated(&self) -> impl Iterator<Item = &TrackedSample> {
        self.samples
            .iter()
            .filter(move |s| self.loo || s.role == SourceSinkRole::Sink)
    }
}

/// Estimates the proportion of each sink explained by each source label.
pub trait SourceTracker {
    /// One row per evaluated sample, one column per source label.
    fn estimate_proportions(&self, request: &SourceTrackingRequest<'_>) -> Result<LabelMatrix>;
}
