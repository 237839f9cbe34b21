//! Data structures shared by the pipelines.

mod count_matrix;
pub mod format;
mod label_matrix;
mod metadata;
mod record;
mod tristate;

pub use count_matrix::CountMatrix;
pub use format::MislabeledFormat;
pub use label_matrix::LabelMatrix;
pub use metadata::Metadata;
pub use record::{FlagCounts, MislabelSummary, SampleRecord, SampleRecords, SourceSinkRole};
pub use tristate::{TriState, NOT_APPLICABLE};
