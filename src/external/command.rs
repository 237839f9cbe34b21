//! Collaborators that shell out to an external program.
//!
//! Each call writes its inputs as TSV into a fresh temporary directory, fills
//! the argument template, runs the program and reads the output matrix back.
//! Recognised placeholders:
//!
//! | placeholder      | value                                         |
//! |------------------|-----------------------------------------------|
//! | `{table}`        | feature table (`#OTU ID` TSV)                 |
//! | `{labels}`       | sample labels (`#SampleID` TSV)               |
//! | `{metadata}`     | source-tracking metadata (`#SampleID` TSV)    |
//! | `{label_column}` | name of the source label column               |
//! | `{model}`        | trained model path                            |
//! | `{output}`       | where the program must write its matrix       |
//! | `{output_dir}`   | directory the program creates for its output  |
//! | `{jobs}`         | requested parallelism                         |
//! | `{loo}`          | `true` or `false`                             |
//! | `{loo_flag}`     | `--loo`, or nothing at all                    |
//! | `{source_depth}` | source rarefaction depth                      |
//! | `{sink_depth}`   | sink rarefaction depth                        |
//!
//! `{loo_flag}` must be a whole argument; it is dropped from the argument
//! list when leave-one-out is off.

use super::{Classifier, CrossValidated, Prediction, SampleLabels, SourceTracker, SourceTrackingRequest};
use crate::data::format::SOURCE_SINK;
use crate::data::{CountMatrix, LabelMatrix, Metadata};
use crate::error::{MislabeledError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const LABEL_COLUMN: &str = "label";
const TABLE_FILE: &str = "table.tsv";
const METADATA_FILE: &str = "metadata.tsv";
const LOO_FLAG: &str = "--loo";

/// Classifier driven by an external program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandClassifier {
    pub program: String,
    /// Arguments for cross-validated classification.
    pub cv_args: Vec<String>,
    #[serde(default)]
    pub fit_args: Vec<String>,
    #[serde(default)]
    pub predict_args: Vec<String>,
}

/// A model file written by [`CommandClassifier::fit`].
///
/// The file lives until the model is dropped.
#[derive(Debug)]
pub struct CommandModel {
    _dir: TempDir,
    path: PathBuf,
}

impl CommandModel {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Classifier for CommandClassifier {
    type Model = Option<CommandModel>;

    fn classify_cv(
        &self,
        table: &CountMatrix,
        labels: &SampleLabels,
        n_jobs: usize,
    ) -> Result<CrossValidated<Self::Model>> {
        let work = work_dir("classify")?;
        let mut vars = Placeholders::new(work.path(), n_jobs);
        vars.set("table", write_table(work.path(), table)?);
        vars.set("labels", write_labels(work.path(), labels)?);

        run(&self.program, &vars.fill(&self.cv_args), "classify")?;
        let probabilities = LabelMatrix::from_tsv(vars.output())?;
        Ok(CrossValidated {
            model: None,
            features: table.feature_ids().to_vec(),
            probabilities,
        })
    }

    fn fit(&self, table: &CountMatrix, labels: &SampleLabels, n_jobs: usize) -> Result<Self::Model> {
        let work = work_dir("fit")?;
        let model_dir = work_dir("fit")?;
        let model_path = model_dir.path().join("model");

        let mut vars = Placeholders::new(work.path(), n_jobs);
        vars.set("table", write_table(work.path(), table)?);
        vars.set("labels", write_labels(work.path(), labels)?);
        vars.set("model", model_path.clone());

        run(&self.program, &vars.fill(&self.fit_args), "fit")?;
        Ok(Some(CommandModel {
            _dir: model_dir,
            path: model_path,
        }))
    }

    fn predict(&self, table: &CountMatrix, model: &Self::Model, n_jobs: usize) -> Result<Prediction> {
        let model = model
            .as_ref()
            .ok_or_else(|| MislabeledError::external("predict", "no trained model"))?;
        let work = work_dir("predict")?;
        let mut vars = Placeholders::new(work.path(), n_jobs);
        vars.set("table", write_table(work.path(), table)?);
        vars.set("model", model.path().to_path_buf());

        run(&self.program, &vars.fill(&self.predict_args), "predict")?;
        let probabilities = LabelMatrix::from_tsv(vars.output())?;
        Ok(Prediction::from_probabilities(probabilities))
    }
}

/// Source tracker driven by an external program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSourceTracker {
    pub program: String,
    pub args: Vec<String>,
    /// The program writes sources as rows and sinks as columns.
    #[serde(default)]
    pub transpose_output: bool,
    /// File the program writes inside `{output_dir}`. Without it the
    /// matrix is read from `{output}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
}

impl CommandSourceTracker {
    /// Arguments for one request, with `dir` as the work directory.
    pub fn render_args(&self, request: &SourceTrackingRequest<'_>, dir: &Path) -> Vec<String> {
        tracking_placeholders(request, dir).fill(&self.args)
    }

    fn output_path(&self, vars: &Placeholders) -> PathBuf {
        match &self.output_file {
            Some(name) => vars.output_dir().join(name),
            None => vars.output().to_path_buf(),
        }
    }
}

impl SourceTracker for CommandSourceTracker {
    fn estimate_proportions(&self, request: &SourceTrackingRequest<'_>) -> Result<LabelMatrix> {
        let work = work_dir("source tracking")?;
        write_table(work.path(), request.table)?;
        write_tracking_metadata(work.path(), request)?;
        let vars = tracking_placeholders(request, work.path());

        run(&self.program, &vars.fill(&self.args), "source tracking")?;
        let output = self.output_path(&vars);
        if self.transpose_output {
            LabelMatrix::from_tsv_transposed(output)
        } else {
            LabelMatrix::from_tsv(output)
        }
    }
}

fn tracking_placeholders(request: &SourceTrackingRequest<'_>, dir: &Path) -> Placeholders {
    let mut vars = Placeholders::new(dir, request.n_jobs);
    vars.set("table", dir.join(TABLE_FILE));
    vars.set("metadata", dir.join(METADATA_FILE));
    vars.set_text("label_column", request.label_column);
    vars.set_text("loo", &request.loo.to_string());
    vars.set_flag("loo_flag", request.loo.then_some(LOO_FLAG));
    vars.set_text("source_depth", &request.source_depth.to_string());
    vars.set_text("sink_depth", &request.sink_depth.to_string());
    vars
}

/// Metadata with the role column and the source label column.
fn write_tracking_metadata(dir: &Path, request: &SourceTrackingRequest<'_>) -> Result<PathBuf> {
    let mut metadata = Metadata::from_column(
        SOURCE_SINK,
        request
            .samples
            .iter()
            .map(|s| (s.sample_id.as_str(), s.role.as_str())),
    );
    metadata.set_column(
        request.label_column,
        request
            .samples
            .iter()
            .map(|s| (s.sample_id.as_str(), s.label.clone())),
    );
    let path = dir.join(METADATA_FILE);
    metadata.to_tsv(&path)?;
    Ok(path)
}

/// Template values for one call.
struct Placeholders {
    values: Vec<(&'static str, String)>,
    /// Whole-argument placeholders; `None` removes the argument.
    flags: Vec<(&'static str, Option<String>)>,
    output: PathBuf,
    output_dir: PathBuf,
}

impl Placeholders {
    fn new(dir: &Path, n_jobs: usize) -> Self {
        let output = dir.join("output.tsv");
        let output_dir = dir.join("output");
        let mut vars = Self {
            values: Vec::new(),
            flags: Vec::new(),
            output: output.clone(),
            output_dir: output_dir.clone(),
        };
        vars.set("output", output);
        vars.set("output_dir", output_dir);
        vars.set_text("jobs", &n_jobs.to_string());
        vars
    }

    fn set(&mut self, key: &'static str, path: PathBuf) {
        self.set_text(key, &path.display().to_string());
    }

    fn set_text(&mut self, key: &'static str, value: &str) {
        self.values.push((key, value.to_string()));
    }

    fn set_flag(&mut self, key: &'static str, value: Option<&str>) {
        self.flags.push((key, value.map(String::from)));
    }

    fn output(&self) -> &Path {
        &self.output
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn fill(&self, args: &[String]) -> Vec<String> {
        args.iter()
            .filter_map(|arg| {
                let flag = self
                    .flags
                    .iter()
                    .find(|(key, _)| arg.strip_prefix('{').and_then(|a| a.strip_suffix('}')) == Some(*key));
                match flag {
                    Some((_, value)) => value.clone(),
                    None => Some(self.values.iter().fold(arg.clone(), |acc, (key, value)| {
                        acc.replace(&format!("{{{}}}", key), value)
                    })),
                }
            })
            .collect()
    }
}

fn work_dir(procedure: &str) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("mislabeled-")
        .tempdir()
        .map_err(|e| MislabeledError::external(procedure, format!("cannot create work directory: {}", e)))
}

fn write_table(dir: &Path, table: &CountMatrix) -> Result<PathBuf> {
    let path = dir.join(TABLE_FILE);
    table.to_tsv(&path)?;
    Ok(path)
}

fn write_labels(dir: &Path, labels: &SampleLabels) -> Result<PathBuf> {
    let path = dir.join("labels.tsv");
    Metadata::from_column(LABEL_COLUMN, labels.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .to_tsv(&path)?;
    Ok(path)
}

fn run(program: &str, args: &[String], procedure: &str) -> Result<()> {
    log::debug!("Running {} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| MislabeledError::external(procedure, format!("failed to run '{}': {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("'{}' exited with {}", program, output.status)
        } else {
            stderr
        };
        return Err(MislabeledError::external(procedure, message));
    }
    Ok(())
}
