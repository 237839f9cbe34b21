//! Within-dataset and against-dataset assessment pipelines.

mod config;
mod prepare;
mod runner;

pub use config::PipelineConfig;
pub use prepare::Preparation;
pub use runner::{check_label_coverage, Dataset, MislabelPipeline};
