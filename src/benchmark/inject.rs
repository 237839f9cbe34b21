//! Problem injection: benchmark datasets with known mislabels and contaminants.
//!
//! Starting from a trusted table, a subset of samples per label is kept, a
//! few are relabelled to another label, and a few receive the reads of a
//! donor sample from another label. The metadata records what was done.

use crate::data::{CountMatrix, Metadata, TriState};
use crate::error::{MislabeledError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Truth column flagging relabelled samples.
pub const INTENTIONAL_MISLABEL: &str = "intentional_mislabel";
/// Truth column flagging contaminated samples.
pub const INTENTIONAL_CONTAMINATION: &str = "intentional_contamination";

/// Name of the truth column holding the label before relabelling.
pub fn original_label_column(label_column: &str) -> String {
    format!("original_{}", label_column)
}

/// Configuration for problem injection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectionConfig {
    /// Samples with fewer reads are discarded before selection.
    pub min_depth: u64,
    /// Labels to keep; empty keeps all.
    pub labels: Vec<String>,
    /// Maximum samples kept per label.
    pub samples_per_label: usize,
    /// Samples relabelled per label.
    pub n_mislabel: usize,
    /// Samples contaminated per label.
    pub n_contaminate: usize,
    pub seed: u64,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            min_depth: 1000,
            labels: Vec::new(),
            samples_per_label: 50,
            n_mislabel: 2,
            n_contaminate: 2,
            seed: 42,
        }
    }
}

impl InjectionConfig {
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_samples_per_label(mut self, n: usize) -> Self {
        self.samples_per_label = n;
        self
    }

    pub fn with_problems(mut self, n_mislabel: usize, n_contaminate: usize) -> Self {
        self.n_mislabel = n_mislabel;
        self.n_contaminate = n_contaminate;
        self
    }

    pub fn with_min_depth(mut self, depth: u64) -> Self {
        self.min_depth = depth;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Samples a label needs: mislabels, one donor, contaminants.
    fn required_per_label(&self) -> usize {
        self.n_mislabel + 1 + self.n_contaminate
    }
}

/// A dataset with injected problems and its truth.
#[derive(Debug, Clone)]
pub struct ProblematicData {
    pub table: CountMatrix,
    /// Input metadata plus the truth columns, with relabelled declared labels.
    pub metadata: Metadata,
    pub mislabeled: Vec<String>,
    pub contaminated: Vec<String>,
}

impl ProblematicData {
    /// Write `<prefix>.table.tsv` and `<prefix>.metadata.tsv`.
    pub fn write<P: AsRef<Path>>(&self, prefix: P) -> Result<()> {
        let prefix = prefix.as_ref().display().to_string();
        self.table.to_tsv(format!("{}.table.tsv", prefix))?;
        self.metadata.to_tsv(format!("{}.metadata.tsv", prefix))?;
        Ok(())
    }
}

/// Build a benchmark dataset with known mislabels and contaminants.
///
/// Within each label (after shuffling) the first `n_mislabel` samples are
/// relabelled, cycling through the other labels. The next sample is the
/// label's donor, and the `n_contaminate` samples after it each receive the
/// donor reads of another label, again cycling.
pub fn inject_problems(
    table: &CountMatrix,
    metadata: &Metadata,
    label_column: &str,
    config: &InjectionConfig,
) -> Result<ProblematicData> {
    let depths = table.col_sums();
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (sid, label) in metadata.column(label_column)? {
        if !config.labels.is_empty() && !config.labels.iter().any(|l| l == label) {
            continue;
        }
        let deep_enough = table
            .sample_index(sid)
            .map(|col| depths[col] >= config.min_depth)
            .unwrap_or(false);
        if deep_enough {
            groups.entry(label.to_string()).or_default().push(sid.to_string());
        }
    }

    if groups.len() < 2 {
        return Err(MislabeledError::InvalidParameter(format!(
            "Need at least 2 labels with samples of depth {} or more, found {}",
            config.min_depth,
            groups.len()
        )));
    }
    let needed = config.required_per_label();
    for (label, ids) in &groups {
        if ids.len() < needed || config.samples_per_label < needed {
            return Err(MislabeledError::InvalidParameter(format!(
                "Label '{}' needs {} samples for the requested problems, {} available",
                label,
                needed,
                ids.len().min(config.samples_per_label)
            )));
        }
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    for ids in groups.values_mut() {
        ids.shuffle(&mut rng);
        ids.truncate(config.samples_per_label);
    }
    let labels: Vec<String> = groups.keys().cloned().collect();
    let others = |label: &str| -> Vec<&String> { labels.iter().filter(|l| *l != label).collect() };

    let mut kept: Vec<String> = groups.values().flatten().cloned().collect();
    kept.shuffle(&mut rng);

    let mut relabel: Vec<(String, String)> = Vec::new();
    let mut contaminants: Vec<(String, String)> = Vec::new();
    for (label, ids) in &groups {
        let other = others(label.as_str());
        for (i, sid) in ids.iter().take(config.n_mislabel).enumerate() {
            relabel.push((sid.clone(), other[i % other.len()].clone()));
        }
        let first = config.n_mislabel + 1;
        for (j, sid) in ids[first..first + config.n_contaminate].iter().enumerate() {
            let donor_label = other[j % other.len()];
            let donor = groups[donor_label][config.n_mislabel].clone();
            contaminants.push((sid.clone(), donor));
        }
    }

    let subset = table.retain_samples(&kept)?;
    let mut columns: Vec<Vec<u64>> = (0..subset.n_samples()).map(|c| subset.col_dense(c)).collect();
    for (sid, donor) in &contaminants {
        let (Some(target), Some(source)) = (subset.sample_index(sid), subset.sample_index(donor)) else {
            continue;
        };
        let donor_counts = subset.col_dense(source);
        for (count, extra) in columns[target].iter_mut().zip(donor_counts) {
            *count += extra;
        }
    }
    let triplets = columns.iter().enumerate().flat_map(|(col, counts)| {
        counts
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > 0)
            .map(move |(row, &v)| (row, col, v))
    });
    let out_table = CountMatrix::from_triplets(
        subset.feature_ids().to_vec(),
        subset.sample_ids().to_vec(),
        triplets,
    )?
    .remove_empty_features()?;

    let mut out_meta = metadata.subset_samples(&kept)?;
    let original: Vec<(&str, String)> = kept
        .iter()
        .map(|sid| (sid.as_str(), metadata.get(sid, label_column).unwrap_or_default().to_string()))
        .collect();
    out_meta.set_column(&original_label_column(label_column), original);
    out_meta.set_column(
        label_column,
        relabel.iter().map(|(sid, label)| (sid.as_str(), label.clone())),
    );
    out_meta.set_column(
        INTENTIONAL_MISLABEL,
        kept.iter().map(|sid| {
            let flagged = relabel.iter().any(|(s, _)| s == sid);
            (sid.as_str(), flag_text(flagged))
        }),
    );
    out_meta.set_column(
        INTENTIONAL_CONTAMINATION,
        kept.iter().map(|sid| {
            let flagged = contaminants.iter().any(|(s, _)| s == sid);
            (sid.as_str(), flag_text(flagged))
        }),
    );

    log::info!(
        "Injected {} mislabels and {} contaminations into {} samples over {} labels",
        relabel.len(),
        contaminants.len(),
        kept.len(),
        labels.len()
    );

    Ok(ProblematicData {
        table: out_table,
        metadata: out_meta,
        mislabeled: relabel.into_iter().map(|(sid, _)| sid).collect(),
        contaminated: contaminants.into_iter().map(|(sid, _)| sid).collect(),
    })
}

fn flag_text(flag: bool) -> String {
    TriState::from(flag).to_string()
}
