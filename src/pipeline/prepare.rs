//! Table preparation ahead of classification and source tracking.

use crate::data::CountMatrix;
use crate::error::Result;
use crate::table::FeatureTableOps;

/// How deep to rarefy and how many samples a feature must occur in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preparation {
    pub sampling_depth: u64,
    /// `None` skips prevalence filtering.
    pub min_samples: Option<usize>,
}

impl Preparation {
    fn filter<T: FeatureTableOps + ?Sized>(&self, ops: &T, table: CountMatrix) -> Result<CountMatrix> {
        match self.min_samples {
            Some(min_samples) => ops.filter_features(&table, min_samples),
            None => Ok(table),
        }
    }

    /// Rarefy, then drop low-prevalence features.
    pub fn for_classification<T: FeatureTableOps + ?Sized>(
        &self,
        ops: &T,
        table: &CountMatrix,
    ) -> Result<CountMatrix> {
        let rarefied = ops.rarefy(table, self.sampling_depth)?;
        let prepared = self.filter(ops, rarefied)?;
        log::debug!(
            "Classification table: {} features x {} samples",
            prepared.n_features(),
            prepared.n_samples()
        );
        Ok(prepared)
    }

    /// Filter, rarefy, then filter again.
    ///
    /// The first filter keeps rarefaction from spending reads on features that
    /// would be discarded anyway.
    pub fn for_source_tracking<T: FeatureTableOps + ?Sized>(
        &self,
        ops: &T,
        table: &CountMatrix,
    ) -> Result<CountMatrix> {
        let filtered = self.filter(ops, table.clone())?;
        let rarefied = ops.rarefy(&filtered, self.sampling_depth)?;
        let prepared = self.filter(ops, rarefied)?;
        log::debug!(
            "Source-tracking table: {} features x {} samples",
            prepared.n_features(),
            prepared.n_samples()
        );
        Ok(prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::InProcessTables;

    fn create_test_table() -> CountMatrix {
        // 200 samples; f0 everywhere, f1 in one sample, f2 in three
        let mut triplets = Vec::new();
        let mut sample_ids = Vec::new();
        for s in 0..200 {
            sample_ids.push(format!("S{}", s));
            triplets.push((0, s, 50));
        }
        triplets.push((1, 0, 50));
        for s in 1..4 {
            triplets.push((2, s, 50));
        }
        CountMatrix::from_triplets(
            vec!["f0".into(), "f1".into(), "f2".into()],
            sample_ids,
            triplets,
        )
        .unwrap()
    }

    #[test]
    fn test_classification_prep_drops_rare_features() {
        let prep = Preparation {
            sampling_depth: 50,
            min_samples: Some(2),
        };
        let table = create_test_table();
        let prepared = prep.for_classification(&InProcessTables::default(), &table).unwrap();
        assert!(!prepared.feature_ids().contains(&"f1".to_string()));
        assert!(prepared.feature_ids().contains(&"f2".to_string()));
    }

    #[test]
    fn test_source_tracking_prep_skips_filter_when_none() {
        let prep = Preparation {
            sampling_depth: 10,
            min_samples: None,
        };
        let table = create_test_table();
        let prepared = prep.for_source_tracking(&InProcessTables::default(), &table).unwrap();
        assert_eq!(prepared.n_samples(), 200);
        assert!(prepared.col_sums().iter().all(|&s| s == 10));
    }
}
