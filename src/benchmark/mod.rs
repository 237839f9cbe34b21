//! Benchmarking with known truth.
//!
//! [`inject_problems`] plants mislabels and contamination in a trusted
//! dataset. [`assess`] scores a pipeline result against what was planted.

pub mod assess;
pub mod inject;

pub use assess::{assess, Assessment, DetectionCounts};
pub use inject::{
    inject_problems, original_label_column, InjectionConfig, ProblematicData,
    INTENTIONAL_CONTAMINATION, INTENTIONAL_MISLABEL,
};
