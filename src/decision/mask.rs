//! Below-threshold mask produced by the mislabel decision.

use indexmap::IndexMap;

/// Per-sample outcome of the probability threshold, over scored samples only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BelowThresholdMask {
    flags: IndexMap<String, bool>,
}

impl BelowThresholdMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sample_id: impl Into<String>, below: bool) {
        self.flags.insert(sample_id.into(), below);
    }

    /// `Some(true)` when the sample fell below threshold, `None` when unscored.
    pub fn get(&self, sample_id: &str) -> Option<bool> {
        self.flags.get(sample_id).copied()
    }

    pub fn is_below(&self, sample_id: &str) -> bool {
        self.get(sample_id).unwrap_or(false)
    }

    pub fn contains(&self, sample_id: &str) -> bool {
        self.flags.contains_key(sample_id)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.flags.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// Samples below threshold.
    pub fn below(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|(_, v)| *v).map(|(k, _)| k)
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for BelowThresholdMask {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        let mut mask = Self::new();
        for (sid, below) in iter {
            mask.insert(sid, below);
        }
        mask
    }
}
