//! Feature table with sparse storage for microbiome abundance data.

use crate::error::{MislabeledError, Result};
use rayon::prelude::*;
use sprs::{CsMat, TriMat};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Feature table: features (OTUs/ASVs) as CSR rows, samples as columns.
///
/// Sample IDs are unique within a table.
#[derive(Debug, Clone)]
pub struct CountMatrix {
    data: CsMat<u64>,
    feature_ids: Vec<String>,
    sample_ids: Vec<String>,
    sample_index: HashMap<String, usize>,
}

impl CountMatrix {
    pub fn new(
        data: CsMat<u64>,
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != feature_ids.len() {
            return Err(MislabeledError::DimensionMismatch {
                expected: nrows,
                actual: feature_ids.len(),
            });
        }
        if ncols != sample_ids.len() {
            return Err(MislabeledError::DimensionMismatch {
                expected: ncols,
                actual: sample_ids.len(),
            });
        }
        let mut sample_index = HashMap::with_capacity(sample_ids.len());
        for (col, sid) in sample_ids.iter().enumerate() {
            if sample_index.insert(sid.clone(), col).is_some() {
                return Err(MislabeledError::SampleMismatch(format!(
                    "Duplicate sample ID '{}'",
                    sid
                )));
            }
        }
        Ok(Self {
            data,
            feature_ids,
            sample_ids,
            sample_index,
        })
    }

    /// Build a matrix from `(feature, sample, count)` triplets.
    pub fn from_triplets(
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
        triplets: impl IntoIterator<Item = (usize, usize, u64)>,
    ) -> Result<Self> {
        let mut tri_mat = TriMat::new((feature_ids.len(), sample_ids.len()));
        for (row, col, val) in triplets {
            if val > 0 {
                tri_mat.add_triplet(row, col, val);
            }
        }
        Self::new(tri_mat.to_csr(), feature_ids, sample_ids)
    }

    /// Load a feature table from a TSV file.
    ///
    /// Leading `# ` lines written by `biom convert` are skipped. The header
    /// row names the samples after a feature ID column, which may itself be
    /// spelled `#OTU ID`. Counts written as floats are accepted when whole.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .comment(None)
            .from_path(path)?;
        let mut rows = rdr
            .records()
            .filter(|row| !matches!(row, Ok(r) if r.get(0).is_some_and(is_biom_comment)));

        let header = rows
            .next()
            .ok_or_else(|| MislabeledError::EmptyData("Empty TSV file".to_string()))??;
        if header.len() < 2 {
            return Err(MislabeledError::EmptyData(
                "TSV must have at least one sample".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header.iter().skip(1).map(|s| s.trim().to_string()).collect();

        let mut feature_ids = Vec::new();
        let mut triplets = Vec::new();
        for row in rows {
            let row = row?;
            let Some(feature) = row.get(0).filter(|f| !f.trim().is_empty()) else {
                continue;
            };
            let row_idx = feature_ids.len();
            feature_ids.push(feature.to_string());
            for (col_idx, raw) in row.iter().skip(1).take(sample_ids.len()).enumerate() {
                let count = parse_count(raw).ok_or_else(|| MislabeledError::InvalidCount {
                    value: raw.to_string(),
                    row: row_idx,
                    col: col_idx,
                })?;
                triplets.push((row_idx, col_idx, count));
            }
        }

        if feature_ids.is_empty() {
            return Err(MislabeledError::EmptyData("No features in TSV".to_string()));
        }
        Self::from_triplets(feature_ids, sample_ids, triplets)
    }

    /// Write the table as TSV with an `#OTU ID` header.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut out = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Never)
            .from_path(path)?;
        out.write_record(std::iter::once("#OTU ID").chain(self.sample_ids.iter().map(String::as_str)))?;
        for (row, feature) in self.feature_ids.iter().enumerate() {
            let counts = self.row_dense(row).into_iter().map(|c| c.to_string());
            out.write_record(std::iter::once(feature.clone()).chain(counts))?;
        }
        out.flush()?;
        Ok(())
    }

    /// Count at (feature, sample); 0 when not stored.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u64 {
        self.data.get(row, col).copied().unwrap_or(0)
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.rows()
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.cols()
    }

    #[inline]
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Underlying CSR storage.
    #[inline]
    pub fn data(&self) -> &CsMat<u64> {
        &self.data
    }

    /// Column index of a sample.
    pub fn sample_index(&self, sample_id: &str) -> Option<usize> {
        self.sample_index.get(sample_id).copied()
    }

    /// Check if a sample is present.
    pub fn has_sample(&self, sample_id: &str) -> bool {
        self.sample_index(sample_id).is_some()
    }

    /// Counts of one feature across all samples.
    pub fn row_dense(&self, row: usize) -> Vec<u64> {
        let mut dense = vec![0; self.n_samples()];
        if let Some(view) = self.data.outer_view(row) {
            for (col, &count) in view.iter() {
                dense[col] = count;
            }
        }
        dense
    }

    /// Counts of one sample across all features.
    pub fn col_dense(&self, col: usize) -> Vec<u64> {
        let mut dense = vec![0; self.n_features()];
        for (&count, (row, c)) in self.data.iter() {
            if c == col {
                dense[row] = count;
            }
        }
        dense
    }

    /// Sequencing depth of every sample.
    pub fn col_sums(&self) -> Vec<u64> {
        self.data.iter().fold(vec![0; self.n_samples()], |mut sums, (&count, (_, col))| {
            sums[col] += count;
            sums
        })
    }

    /// Number of samples each feature is observed in.
    pub fn feature_occupancy(&self) -> Vec<usize> {
        (0..self.n_features())
            .into_par_iter()
            .map(|row| {
                self.data
                    .outer_view(row)
                    .map(|v| v.iter().filter(|(_, &val)| val > 0).count())
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Keep the features at `indices`, in that order.
    pub fn subset_features(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_features()) {
            return Err(MislabeledError::InvalidParameter(format!(
                "Feature index {} out of bounds",
                bad
            )));
        }
        let feature_ids = indices.iter().map(|&i| self.feature_ids[i].clone()).collect();
        let mut triplets = Vec::new();
        for (new_row, &old_row) in indices.iter().enumerate() {
            if let Some(view) = self.data.outer_view(old_row) {
                triplets.extend(view.iter().map(|(col, &count)| (new_row, col, count)));
            }
        }
        Self::from_triplets(feature_ids, self.sample_ids.clone(), triplets)
    }

    /// Keep the samples at `indices`, in that order.
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_samples()) {
            return Err(MislabeledError::InvalidParameter(format!(
                "Sample index {} out of bounds",
                bad
            )));
        }
        let new_col: HashMap<usize, usize> =
            indices.iter().enumerate().map(|(new, &old)| (old, new)).collect();
        let sample_ids = indices.iter().map(|&i| self.sample_ids[i].clone()).collect();
        let triplets = self
            .data
            .iter()
            .filter_map(|(&count, (row, col))| new_col.get(&col).map(|&c| (row, c, count)));
        Self::from_triplets(self.feature_ids.clone(), sample_ids, triplets)
    }

    /// Subset the matrix to the named samples, ignoring IDs that are absent.
    pub fn retain_samples<S: AsRef<str>>(&self, sample_ids: &[S]) -> Result<Self> {
        let wanted: HashSet<&str> = sample_ids.iter().map(|s| s.as_ref()).collect();
        let indices: Vec<usize> = self
            .sample_ids
            .iter()
            .enumerate()
            .filter(|(_, sid)| wanted.contains(sid.as_str()))
            .map(|(i, _)| i)
            .collect();
        self.subset_samples(&indices)
    }

    /// Drop features with no counts in any sample.
    pub fn remove_empty_features(&self) -> Result<Self> {
        let keep: Vec<usize> = self
            .feature_occupancy()
            .iter()
            .enumerate()
            .filter(|(_, &n)| n > 0)
            .map(|(i, _)| i)
            .collect();
        if keep.len() == self.n_features() {
            return Ok(self.clone());
        }
        self.subset_features(&keep)
    }
}

fn is_biom_comment(field: &str) -> bool {
    field.starts_with("# ") || field.starts_with("#Constructed")
}

fn parse_count(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<u64>() {
        return Some(v);
    }
    let v: f64 = trimmed.parse().ok()?;
    if v >= 0.0 && v.fract() == 0.0 && v.is_finite() {
        Some(v as u64)
    } else {
        None
    }
}
