//! Rarefaction: subsampling every sample to an even depth.

use crate::data::CountMatrix;
use crate::error::{MislabeledError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

/// Subsample each sample to exactly `depth` reads, without replacement.
///
/// Samples with fewer than `depth` reads are dropped. Features left with no
/// counts are removed. Each sample draws from its own generator seeded from
/// `seed` and its column index, so results do not depend on thread
/// scheduling.
pub fn rarefy(counts: &CountMatrix, depth: u64, seed: u64) -> Result<CountMatrix> {
    if depth == 0 {
        return Err(MislabeledError::InvalidParameter(
            "Sampling depth must be positive".to_string(),
        ));
    }

    let col_sums = counts.col_sums();
    let keep: Vec<usize> = col_sums
        .iter()
        .enumerate()
        .filter(|(_, &sum)| sum >= depth)
        .map(|(i, _)| i)
        .collect();

    if keep.is_empty() {
        return Err(MislabeledError::EmptyData(format!(
            "No samples have at least {} reads",
            depth
        )));
    }
    let dropped = counts.n_samples() - keep.len();
    if dropped > 0 {
        log::warn!(
            "Rarefaction at depth {} dropped {} of {} samples",
            depth,
            dropped,
            counts.n_samples()
        );
    }

    let csc = counts.data().to_csc();
    let columns: Vec<Vec<(usize, u64)>> = keep
        .par_iter()
        .map(|&col| {
            let observed: Vec<(usize, u64)> = csc
                .outer_view(col)
                .map(|v| v.iter().map(|(row, &val)| (row, val)).collect())
                .unwrap_or_default();
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(col as u64));
            subsample(&observed, col_sums[col], depth, &mut rng)
        })
        .collect();

    let sample_ids: Vec<String> = keep
        .iter()
        .map(|&col| counts.sample_ids()[col].clone())
        .collect();
    let triplets = columns
        .into_iter()
        .enumerate()
        .flat_map(|(new_col, entries)| {
            entries
                .into_iter()
                .map(move |(row, val)| (row, new_col, val))
        });

    CountMatrix::from_triplets(counts.feature_ids().to_vec(), sample_ids, triplets)?
        .remove_empty_features()
}

/// Draw `depth` reads from a sample described by `(feature, count)` pairs.
fn subsample(observed: &[(usize, u64)], total: u64, depth: u64, rng: &mut StdRng) -> Vec<(usize, u64)> {
    if depth == total {
        return observed.to_vec();
    }

    let mut picks: Vec<usize> =
        rand::seq::index::sample(rng, total as usize, depth as usize).into_vec();
    picks.sort_unstable();

    // Walk the sorted read indices alongside the cumulative feature counts.
    let mut result = Vec::new();
    let mut picks = picks.into_iter().peekable();
    let mut upper = 0u64;
    for &(feature, count) in observed {
        upper += count;
        let mut drawn = 0u64;
        while let Some(&p) = picks.peek() {
            if (p as u64) < upper {
                drawn += 1;
                picks.next();
            } else {
                break;
            }
        }
        if drawn > 0 {
            result.push((feature, drawn));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_matrix() -> CountMatrix {
        let triplets = vec![
            (0, 0, 500),
            (1, 0, 500),
            (0, 1, 40),
            (1, 1, 20),
            (2, 1, 40),
            (2, 2, 30),
            (1, 3, 1),
        ];
        let feature_ids = (0..3).map(|i| format!("otu_{}", i)).collect();
        let sample_ids = (0..4).map(|i| format!("S{}", i)).collect();
        CountMatrix::from_triplets(feature_ids, sample_ids, triplets).unwrap()
    }

    #[test]
    fn test_rarefy_even_depth() {
        let counts = create_test_matrix();
        let rarefied = rarefy(&counts, 100, 42).unwrap();

        assert_eq!(rarefied.sample_ids(), &["S0", "S1"]);
        assert_eq!(rarefied.col_sums(), vec![100, 100]);
    }

    #[test]
    fn test_rarefy_never_exceeds_observed() {
        let counts = create_test_matrix();
        let rarefied = rarefy(&counts, 100, 7).unwrap();
        let s1 = rarefied.sample_index("S1").unwrap();
        for (row, fid) in rarefied.feature_ids().iter().enumerate() {
            let orig_row = counts.feature_ids().iter().position(|f| f == fid).unwrap();
            assert!(rarefied.get(row, s1) <= counts.get(orig_row, 1));
        }
    }

    #[test]
    fn test_rarefy_is_deterministic() {
        let counts = create_test_matrix();
        let a = rarefy(&counts, 50, 11).unwrap();
        let b = rarefy(&counts, 50, 11).unwrap();
        for row in 0..a.n_features() {
            assert_eq!(a.row_dense(row), b.row_dense(row));
        }
    }

    #[test]
    fn test_rarefy_exact_depth_keeps_counts() {
        let counts = create_test_matrix();
        let rarefied = rarefy(&counts, 30, 1).unwrap();
        let s2 = rarefied.sample_index("S2").unwrap();
        let otu2 = rarefied.feature_ids().iter().position(|f| f == "otu_2").unwrap();
        assert_eq!(rarefied.get(otu2, s2), 30);
    }

    #[test]
    fn test_rarefy_errors() {
        let counts = create_test_matrix();
        assert!(rarefy(&counts, 0, 1).is_err());
        assert!(matches!(
            rarefy(&counts, 10_000, 1),
            Err(MislabeledError::EmptyData(_))
        ));
    }
}
