//! Contamination decision: thresholding the source-tracking proportion of the declared label.

use crate::data::{LabelMatrix, SampleRecords, TriState};
use crate::decision::mask::BelowThresholdMask;
use crate::decision::overlap::join;
use crate::decision::{check_threshold, lookup_declared};
use crate::error::Result;

/// Flag samples whose declared environment explains too little of their composition.
///
/// Every record starts at `contaminated = False` with no `min_proportion`.
/// Samples in `proportions` get the proportion attributed to their declared
/// label. Then, in order of precedence:
///
/// 1. below the probability threshold in `mask`: not applicable
/// 2. tracked but never scored by the classifier: not applicable
/// 3. tracked and `min_proportion < min_proportion_threshold`: contaminated
///
/// Everything else, including samples the tracker never saw, stays `False`.
pub fn evaluate_contamination(
    records: &mut SampleRecords,
    proportions: &LabelMatrix,
    mask: &BelowThresholdMask,
    min_proportion_threshold: f64,
) -> Result<()> {
    check_threshold("min_proportion_threshold", min_proportion_threshold)?;

    for (_, record) in records.iter_mut() {
        record.min_proportion = None;
        record.contaminated = TriState::False;
    }

    let matched = join(records, proportions);
    let declared = lookup_declared(&matched, proportions, "source proportions");

    for (m, p) in matched.iter().zip(declared) {
        if let Some(record) = records.get_mut(&m.sample_id) {
            record.min_proportion = Some(p);
            record.contaminated = match mask.get(&m.sample_id) {
                Some(false) => TriState::from(p < min_proportion_threshold),
                Some(true) | None => TriState::NotApplicable,
            };
        }
    }

    for sid in mask.below() {
        if let Some(record) = records.get_mut(sid) {
            record.contaminated = TriState::NotApplicable;
        }
    }

    let flagged = records.iter().filter(|(_, r)| r.contaminated.is_true()).count();
    log::info!(
        "Contamination: {} of {} samples tracked, {} below proportion {}",
        matched.len(),
        records.len(),
        flagged,
        min_proportion_threshold
    );
    Ok(())
}
