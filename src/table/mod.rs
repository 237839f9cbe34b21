//! Feature-table services used to prepare pipeline inputs.
//!
//! The pipelines only talk to [`FeatureTableOps`]; [`InProcessTables`] is the
//! bundled implementation built on the functions in this module.

pub mod filter;
pub mod merge;
pub mod rarefy;

pub use filter::{filter_features, prevalence_min_samples};
pub use merge::merge;
pub use rarefy::rarefy;

use crate::data::CountMatrix;
use crate::error::Result;

/// Table operations the pipelines depend on.
pub trait FeatureTableOps {
    /// Drop features present in fewer than `min_samples` samples.
    fn filter_features(&self, table: &CountMatrix, min_samples: usize) -> Result<CountMatrix>;

    /// Subsample every sample to `sampling_depth` reads, dropping shallower samples.
    fn rarefy(&self, table: &CountMatrix, sampling_depth: u64) -> Result<CountMatrix>;

    /// Union tables over disjoint sample sets.
    fn merge(&self, tables: &[&CountMatrix]) -> Result<CountMatrix>;
}

/// In-process table operations with seeded rarefaction.
#[derive(Debug, Clone, Copy)]
pub struct InProcessTables {
    pub seed: u64,
}

impl InProcessTables {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Default for InProcessTables {
    fn default() -> Self {
        Self::new(42)
    }
}

impl FeatureTableOps for InProcessTables {
    fn filter_features(&self, table: &CountMatrix, min_samples: usize) -> Result<CountMatrix> {
        filter_features(table, min_samples)
    }

    fn rarefy(&self, table: &CountMatrix, sampling_depth: u64) -> Result<CountMatrix> {
        rarefy(table, sampling_depth, self.seed)
    }

    fn merge(&self, tables: &[&CountMatrix]) -> Result<CountMatrix> {
        merge(tables)
    }
}
