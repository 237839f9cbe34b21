//! Collaborator selection from configuration.

use super::{
    Classifier, CommandClassifier, CommandModel, CommandSourceTracker, CrossValidated,
    PrecomputedClassifier, PrecomputedSourceTracker, Prediction, SampleLabels, SourceTracker,
    SourceTrackingRequest,
};
use crate::data::{CountMatrix, LabelMatrix};
use crate::error::{MislabeledError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How to obtain classification probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierConfig {
    /// Read probabilities exported from an earlier run.
    Precomputed { probabilities: PathBuf },
    Command(CommandClassifier),
}

/// How to obtain mixing proportions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceTrackerConfig {
    Precomputed {
        proportions: PathBuf,
        /// The file holds sources as rows.
        #[serde(default)]
        transpose_on_load: bool,
    },
    Command(CommandSourceTracker),
}

/// Collaborators used by a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub classifier: ClassifierConfig,
    pub source_tracker: SourceTrackerConfig,
}

impl BackendConfig {
    pub fn build(&self) -> Result<(ClassifierBackend, SourceTrackerBackend)> {
        Ok((
            ClassifierBackend::from_config(&self.classifier)?,
            SourceTrackerBackend::from_config(&self.source_tracker)?,
        ))
    }
}

/// A configured classifier.
#[derive(Debug, Clone)]
pub enum ClassifierBackend {
    Precomputed(PrecomputedClassifier),
    Command(CommandClassifier),
}

/// Model produced by a [`ClassifierBackend`].
#[derive(Debug)]
pub enum BackendModel {
    Precomputed,
    Command(Option<CommandModel>),
}

impl ClassifierBackend {
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        match config {
            ClassifierConfig::Precomputed { probabilities } => {
                log::info!("Classifier: stored probabilities from {}", probabilities.display());
                Ok(Self::Precomputed(PrecomputedClassifier::from_tsv(probabilities)?))
            }
            ClassifierConfig::Command(cmd) => {
                log::info!("Classifier: external program '{}'", cmd.program);
                Ok(Self::Command(cmd.clone()))
            }
        }
    }
}

impl Classifier for ClassifierBackend {
    type Model = BackendModel;

    fn classify_cv(
        &self,
        table: &CountMatrix,
        labels: &SampleLabels,
        n_jobs: usize,
    ) -> Result<CrossValidated<BackendModel>> {
        match self {
            Self::Precomputed(c) => {
                let cv = c.classify_cv(table, labels, n_jobs)?;
                Ok(CrossValidated {
                    model: BackendModel::Precomputed,
                    features: cv.features,
                    probabilities: cv.probabilities,
                })
            }
            Self::Command(c) => {
                let cv = c.classify_cv(table, labels, n_jobs)?;
                Ok(CrossValidated {
                    model: BackendModel::Command(cv.model),
                    features: cv.features,
                    probabilities: cv.probabilities,
                })
            }
        }
    }

    fn fit(&self, table: &CountMatrix, labels: &SampleLabels, n_jobs: usize) -> Result<BackendModel> {
        match self {
            Self::Precomputed(c) => c.fit(table, labels, n_jobs).map(|_| BackendModel::Precomputed),
            Self::Command(c) => c.fit(table, labels, n_jobs).map(BackendModel::Command),
        }
    }

    fn predict(&self, table: &CountMatrix, model: &BackendModel, n_jobs: usize) -> Result<Prediction> {
        match (self, model) {
            (Self::Precomputed(c), BackendModel::Precomputed) => c.predict(table, &(), n_jobs),
            (Self::Command(c), BackendModel::Command(m)) => c.predict(table, m, n_jobs),
            _ => Err(MislabeledError::external(
                "predict",
                "model was trained by a different classifier backend",
            )),
        }
    }
}

/// A configured source tracker.
#[derive(Debug, Clone)]
pub enum SourceTrackerBackend {
    Precomputed(PrecomputedSourceTracker),
    Command(CommandSourceTracker),
}

impl SourceTrackerBackend {
    pub fn from_config(config: &SourceTrackerConfig) -> Result<Self> {
        match config {
            SourceTrackerConfig::Precomputed {
                proportions,
                transpose_on_load,
            } => {
                log::info!("Source tracker: stored proportions from {}", proportions.display());
                Ok(Self::Precomputed(PrecomputedSourceTracker::from_tsv(
                    proportions,
                    *transpose_on_load,
                )?))
            }
            SourceTrackerConfig::Command(cmd) => {
                log::info!("Source tracker: external program '{}'", cmd.program);
                Ok(Self::Command(cmd.clone()))
            }
        }
    }
}

impl SourceTracker for SourceTrackerBackend {
    fn estimate_proportions(&self, request: &SourceTrackingRequest<'_>) -> Result<LabelMatrix> {
        match self {
            Self::Precomputed(t) => t.estimate_proportions(request),
            Self::Command(t) => t.estimate_proportions(request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_config_yaml() {
        let yaml = r#"
classifier:
  kind: command
  program: qiime
  cv_args: ["sample-classifier", "classify-samples", "--i-table", "{table}"]
source_tracker:
  kind: precomputed
  proportions: mixing_proportions.tsv
  transpose_on_load: true
"#;
        let config: BackendConfig = serde_yaml::from_str(yaml).unwrap();
        match &config.classifier {
            ClassifierConfig::Command(cmd) => {
                assert_eq!(cmd.program, "qiime");
                assert_eq!(cmd.cv_args.len(), 4);
                assert!(cmd.fit_args.is_empty());
            }
            other => panic!("unexpected classifier config {:?}", other),
        }
        assert_eq!(
            config.source_tracker,
            SourceTrackerConfig::Precomputed {
                proportions: PathBuf::from("mixing_proportions.tsv"),
                transpose_on_load: true,
            }
        );
    }

    #[test]
    fn test_missing_precomputed_file_is_error() {
        let config = ClassifierConfig::Precomputed {
            probabilities: PathBuf::from("/nonexistent/probabilities.tsv"),
        };
        assert!(ClassifierBackend::from_config(&config).is_err());
    }
}
