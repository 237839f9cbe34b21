//! Mislabel decision: thresholding the classifier's belief in the declared label.

use crate::data::{LabelMatrix, SampleRecords, TriState};
use crate::decision::mask::BelowThresholdMask;
use crate::decision::overlap::join;
use crate::decision::{check_threshold, lookup_declared};
use crate::error::Result;

/// Score every record against a classification-probability matrix.
///
/// For samples present in `probabilities`:
/// - `alleged_probability` is the probability of the declared label
/// - `mislabeled` is `alleged_probability < min_probability`
/// - `corrected_label` is the most probable label (first maximum on ties)
///
/// Samples absent from the matrix are reset to not applicable. A declared
/// label the classifier never scored counts as probability 0.
///
/// # Returns
/// The below-threshold mask over the scored samples.
pub fn evaluate_mislabeling(
    records: &mut SampleRecords,
    probabilities: &LabelMatrix,
    min_probability: f64,
) -> Result<BelowThresholdMask> {
    check_threshold("min_probability", min_probability)?;

    for (_, record) in records.iter_mut() {
        record.alleged_probability = None;
        record.mislabeled = TriState::NotApplicable;
        record.corrected_label = None;
    }

    let matched = join(records, probabilities);
    let alleged = lookup_declared(&matched, probabilities, "classifier probabilities");

    let mut mask = BelowThresholdMask::new();
    for (m, p) in matched.iter().zip(alleged) {
        let below = p < min_probability;
        let corrected = probabilities.argmax(m.row).map(String::from);
        if let Some(record) = records.get_mut(&m.sample_id) {
            record.alleged_probability = Some(p);
            record.mislabeled = TriState::from(below);
            record.corrected_label = corrected;
        }
        mask.insert(m.sample_id.clone(), below);
    }

    log::info!(
        "Mislabeling: {} of {} samples scored, {} below probability {}",
        mask.len(),
        records.len(),
        mask.below().count(),
        min_probability
    );
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_records() -> SampleRecords {
        SampleRecords::from_labels(
            "env",
            vec![("foo", "fecal"), ("bar", "oral"), ("baz", "skin"), ("extra", "fecal")],
        )
        .unwrap()
    }

    fn create_test_probabilities() -> LabelMatrix {
        LabelMatrix::from_rows(
            vec!["fecal".into(), "oral".into(), "skin".into()],
            vec![
                ("bar", vec![0.5, 0.2, 0.3]),
                ("baz", vec![0.3, 0.3, 0.4]),
                ("foo", vec![0.6, 0.2, 0.2]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_set_mislabeled() {
        let mut records = create_test_records();
        let mask = evaluate_mislabeling(&mut records, &create_test_probabilities(), 0.25).unwrap();

        let foo = records.get("foo").unwrap();
        assert_eq!(foo.alleged_probability, Some(0.6));
        assert_eq!(foo.mislabeled, TriState::False);
        assert_eq!(foo.corrected_label.as_deref(), Some("fecal"));

        let bar = records.get("bar").unwrap();
        assert_eq!(bar.alleged_probability, Some(0.2));
        assert_eq!(bar.mislabeled, TriState::True);
        assert_eq!(bar.corrected_label.as_deref(), Some("fecal"));

        let baz = records.get("baz").unwrap();
        assert_eq!(baz.alleged_probability, Some(0.4));
        assert_eq!(baz.mislabeled, TriState::False);
        assert_eq!(baz.corrected_label.as_deref(), Some("skin"));

        let extra = records.get("extra").unwrap();
        assert_eq!(extra.alleged_probability, None);
        assert_eq!(extra.mislabeled, TriState::NotApplicable);
        assert_eq!(extra.corrected_label, None);

        let expected: BelowThresholdMask =
            vec![("foo", false), ("bar", true), ("baz", false)].into_iter().collect();
        assert_eq!(mask, expected);
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut records = create_test_records();
        let mask = evaluate_mislabeling(&mut records, &create_test_probabilities(), 0.2).unwrap();
        assert_eq!(mask.get("bar"), Some(false));
        assert_eq!(records.get("bar").unwrap().mislabeled, TriState::False);
    }

    #[test]
    fn test_rerun_overwrites_previous_scores() {
        let mut records = create_test_records();
        evaluate_mislabeling(&mut records, &create_test_probabilities(), 0.25).unwrap();

        let only_baz = create_test_probabilities().retain_samples(&["baz"]);
        let mask = evaluate_mislabeling(&mut records, &only_baz, 0.25).unwrap();
        assert_eq!(mask.len(), 1);
        assert_eq!(records.get("foo").unwrap().mislabeled, TriState::NotApplicable);
        assert_eq!(records.get("foo").unwrap().alleged_probability, None);
    }

    #[test]
    fn test_unscored_declared_label_counts_as_zero() {
        let mut records = SampleRecords::from_labels("env", vec![("s", "vaginal")]).unwrap();
        let probs = LabelMatrix::from_rows(
            vec!["fecal".into(), "oral".into()],
            vec![("s", vec![0.7, 0.3])],
        )
        .unwrap();
        let mask = evaluate_mislabeling(&mut records, &probs, 0.25).unwrap();
        assert!(mask.is_below("s"));
        assert_eq!(records.get("s").unwrap().alleged_probability, Some(0.0));
    }

    #[test]
    fn test_invalid_threshold() {
        let mut records = create_test_records();
        assert!(evaluate_mislabeling(&mut records, &create_test_probabilities(), 1.5).is_err());
    }
}
