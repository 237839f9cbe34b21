//! Mislabeling and contamination detection for microbiome feature tables
//!
//! This library reproduces the HMP SOP checks for samples whose declared
//! environment disagrees with their composition.
//!
//! # Overview
//!
//! - **data**: Core data structures (CountMatrix, Metadata, LabelMatrix, SampleRecords)
//! - **table**: Feature-table services (prevalence filter, rarefaction, merge)
//! - **external**: Classifier and source-tracker contracts and adapters
//! - **decision**: Mislabel and contamination threshold decisions
//! - **pipeline**: Within-dataset and against-dataset orchestration
//! - **benchmark**: Problem injection and assessment against known truth
//!
//! A sample is *mislabeled* when the classifier assigns its declared label a
//! probability below `alleged_min_probability`. A sample that is not
//! mislabeled is *contaminated* when source tracking attributes less than
//! `env_min_proportion` of it to its declared environment.
//!
//! # Example
//!
//! ```no_run
//! use mislabeled::prelude::*;
//!
//! let table = CountMatrix::from_tsv("table.tsv").unwrap();
//! let metadata = Metadata::from_tsv("metadata.tsv").unwrap();
//!
//! let config = PipelineConfig::default();
//! let classifier = PrecomputedClassifier::from_tsv("probabilities.tsv").unwrap();
//! let tracker = PrecomputedSourceTracker::from_tsv("mixing_proportions.tsv", true).unwrap();
//! let tables = InProcessTables::new(config.seed);
//!
//! let records = MislabelPipeline::new(&config, &classifier, &tracker, &tables)
//!     .within(&Dataset::new(&table, &metadata, "env"))
//!     .unwrap();
//! println!("{}", records.summary());
//! records.to_tsv("mislabeled.tsv").unwrap();
//! ```

pub mod benchmark;
pub mod data;
pub mod decision;
pub mod error;
pub mod external;
pub mod pipeline;
pub mod table;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::benchmark::{assess, inject_problems, Assessment, InjectionConfig, ProblematicData};
    pub use crate::data::{
        CountMatrix, LabelMatrix, Metadata, MislabelSummary, MislabeledFormat, SampleRecord,
        SampleRecords, SourceSinkRole, TriState, NOT_APPLICABLE,
    };
    pub use crate::decision::{evaluate_contamination, evaluate_mislabeling, BelowThresholdMask};
    pub use crate::error::{MislabeledError, Result};
    pub use crate::external::{
        BackendConfig, Classifier, ClassifierBackend, CommandClassifier, CommandSourceTracker,
        PrecomputedClassifier, PrecomputedSourceTracker, SampleLabels, SourceTracker,
        SourceTrackerBackend, SourceTrackingRequest, TrackedSample,
    };
    pub use crate::pipeline::{Dataset, MislabelPipeline, PipelineConfig};
    pub use crate::table::{FeatureTableOps, InProcessTables};
}
