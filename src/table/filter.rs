//! Prevalence-based feature filtering.

use crate::data::CountMatrix;
use crate::error::{MislabeledError, Result};

/// Filter features observed in fewer than `min_samples` samples.
///
/// # Arguments
/// * `counts` - The feature table to filter
/// * `min_samples` - Minimum number of samples with a non-zero count
///
/// # Returns
/// A new CountMatrix containing only features meeting the threshold.
pub fn filter_features(counts: &CountMatrix, min_samples: usize) -> Result<CountMatrix> {
    let keep_indices: Vec<usize> = counts
        .feature_occupancy()
        .iter()
        .enumerate()
        .filter(|(_, &n)| n >= min_samples)
        .map(|(i, _)| i)
        .collect();

    if keep_indices.is_empty() {
        return Err(MislabeledError::EmptyData(format!(
            "No features are present in at least {} samples",
            min_samples
        )));
    }

    log::debug!(
        "Feature filter (min_samples={}): kept {} of {} features",
        min_samples,
        keep_indices.len(),
        counts.n_features()
    );
    counts.subset_features(&keep_indices)
}

/// Minimum sample count for a prevalence filter at `fraction` of `n_samples`.
///
/// The count is rounded down. Returns `None` when it is 1 or less, in which
/// case filtering would remove nothing but features absent everywhere.
pub fn prevalence_min_samples(n_samples: usize, fraction: f64) -> Option<usize> {
    let min_samples = (n_samples as f64 * fraction).floor() as usize;
    if min_samples <= 1 {
        None
    } else {
        Some(min_samples)
    }
}
