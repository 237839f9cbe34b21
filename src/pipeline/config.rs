//! Pipeline configuration.

use crate::error::{MislabeledError, Result};
use crate::external::{
    BackendConfig, ClassifierConfig, CommandClassifier, CommandSourceTracker, SourceTrackerConfig,
};
use crate::table::prevalence_min_samples;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Thresholds, preprocessing and collaborators for a pipeline run.
///
/// Missing fields take the HMP SOP defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub description: Option<String>,
    /// Samples whose declared label scores below this are mislabeled.
    pub alleged_min_probability: f64,
    /// Samples whose declared environment explains less than this are contaminated.
    pub env_min_proportion: f64,
    /// Rarefaction depth for both classification and source tracking.
    pub sampling_depth: u64,
    /// Features must occur in this fraction of samples to be kept.
    pub min_prevalence_fraction: f64,
    /// Passed through to the classifier and source tracker.
    pub n_jobs: usize,
    /// Rarefaction seed.
    pub seed: u64,
    pub backend: Option<BackendConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            description: None,
            alleged_min_probability: 0.25,
            env_min_proportion: 0.6,
            sampling_depth: 1000,
            min_prevalence_fraction: 0.01,
            n_jobs: 1,
            seed: 42,
            backend: None,
        }
    }
}

impl PipelineConfig {
    /// Parse from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(MislabeledError::from)
    }

    /// Serialize to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(MislabeledError::from)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(MislabeledError::from)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(MislabeledError::from)
    }

    /// Load a `.json` file as JSON and anything else as YAML, then validate.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let config = if is_json {
            Self::from_json(&text)?
        } else {
            Self::from_yaml(&text)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check thresholds and depths.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("alleged_min_probability", self.alleged_min_probability),
            ("env_min_proportion", self.env_min_proportion),
            ("min_prevalence_fraction", self.min_prevalence_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MislabeledError::InvalidParameter(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.sampling_depth == 0 {
            return Err(MislabeledError::InvalidParameter(
                "sampling_depth must be positive".to_string(),
            ));
        }
        if self.n_jobs == 0 {
            return Err(MislabeledError::InvalidParameter(
                "n_jobs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Prevalence filter minimum for a table of `n_samples`, `None` to skip filtering.
    pub fn min_samples(&self, n_samples: usize) -> Option<usize> {
        prevalence_min_samples(n_samples, self.min_prevalence_fraction)
    }

    /// The configured collaborators.
    pub fn backend(&self) -> Result<&BackendConfig> {
        self.backend.as_ref().ok_or_else(|| {
            MislabeledError::InvalidParameter(
                "no backend configured; add a 'backend' section with a classifier and source_tracker"
                    .to_string(),
            )
        })
    }

    /// Example configuration that drives external programs.
    pub fn example() -> Self {
        let classifier = CommandClassifier {
            program: "mislabeled-classify".to_string(),
            cv_args: vec![
                "cv".into(),
                "--table".into(),
                "{table}".into(),
                "--labels".into(),
                "{labels}".into(),
                "--jobs".into(),
                "{jobs}".into(),
                "--output".into(),
                "{output}".into(),
            ],
            fit_args: vec![
                "fit".into(),
                "--table".into(),
                "{table}".into(),
                "--labels".into(),
                "{labels}".into(),
                "--model".into(),
                "{model}".into(),
            ],
            predict_args: vec![
                "predict".into(),
                "--table".into(),
                "{table}".into(),
                "--model".into(),
                "{model}".into(),
                "--output".into(),
                "{output}".into(),
            ],
        };
        let source_tracker = CommandSourceTracker {
            program: "sourcetracker2".to_string(),
            args: [
                "gibbs",
                "-i",
                "{table}",
                "-m",
                "{metadata}",
                "-o",
                "{output_dir}",
                "--source_sink_column",
                "SourceSink",
                "--source_category_column",
                "{label_column}",
                "--source_rarefaction_depth",
                "{source_depth}",
                "--sink_rarefaction_depth",
                "{sink_depth}",
                "--jobs",
                "{jobs}",
                "{loo_flag}",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            transpose_output: true,
            output_file: Some("mixing_proportions.txt".to_string()),
        };
        Self {
            description: Some("HMP SOP mislabeling and contamination detection".to_string()),
            backend: Some(BackendConfig {
                classifier: ClassifierConfig::Command(classifier),
                source_tracker: SourceTrackerConfig::Command(source_tracker),
            }),
            ..Self::default()
        }
    }
}
