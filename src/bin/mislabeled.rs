//! mislabeled - sample mislabeling and contamination detection CLI
//!
//! Command-line interface for the HMP SOP mislabeling and contamination checks.

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use mislabeled::benchmark::{assess, inject_problems, InjectionConfig};
use mislabeled::data::{CountMatrix, Metadata, MislabeledFormat, SampleRecords};
use mislabeled::error::Result;
use mislabeled::pipeline::{Dataset, MislabelPipeline, PipelineConfig};
use mislabeled::table::InProcessTables;
use std::path::PathBuf;

/// Detect mislabeled and contaminated samples in microbiome feature tables
#[derive(Parser)]
#[command(name = "mislabeled")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log verbosity level
    #[arg(long, global = true, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Threshold and preprocessing overrides shared by both pipelines.
#[derive(clap::Args)]
struct Overrides {
    /// Mislabeled when the declared label's probability is below this
    #[arg(long)]
    alleged_min_probability: Option<f64>,

    /// Contaminated when the declared environment's proportion is below this
    #[arg(long)]
    env_min_proportion: Option<f64>,

    /// Rarefaction depth
    #[arg(long)]
    sampling_depth: Option<u64>,

    /// Parallel jobs passed to the classifier and source tracker
    #[arg(long)]
    jobs: Option<usize>,
}

impl Overrides {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(v) = self.alleged_min_probability {
            config.alleged_min_probability = v;
        }
        if let Some(v) = self.env_min_proportion {
            config.env_min_proportion = v;
        }
        if let Some(v) = self.sampling_depth {
            config.sampling_depth = v;
        }
        if let Some(v) = self.jobs {
            config.n_jobs = v;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Assess a dataset against itself
    Within {
        /// Path to feature table TSV
        #[arg(short, long)]
        table: PathBuf,

        /// Path to sample metadata TSV
        #[arg(short, long)]
        metadata: PathBuf,

        /// Metadata column holding the declared labels
        #[arg(long)]
        column: String,

        /// Path to pipeline configuration (YAML or JSON)
        #[arg(long)]
        config: PathBuf,

        /// Output path for the result table
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Assess a focus dataset against a reference dataset
    Against {
        /// Path to focus feature table TSV
        #[arg(long)]
        focus: PathBuf,

        /// Path to focus metadata TSV
        #[arg(long)]
        focus_metadata: PathBuf,

        /// Focus metadata column holding the declared labels
        #[arg(long)]
        focus_column: String,

        /// Path to reference feature table TSV
        #[arg(long)]
        reference: PathBuf,

        /// Path to reference metadata TSV
        #[arg(long)]
        reference_metadata: PathBuf,

        /// Reference metadata column holding the labels
        #[arg(long)]
        reference_column: String,

        /// Path to pipeline configuration (YAML or JSON)
        #[arg(long)]
        config: PathBuf,

        /// Output path for the result table
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Check that a result table has the required columns
    Validate {
        /// Path to result table
        artifact: PathBuf,
    },

    /// Summarize a result table
    Summarize {
        /// Path to result table
        artifact: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Inject known mislabels and contamination into a trusted dataset
    Simulate {
        /// Path to feature table TSV
        #[arg(short, long)]
        table: PathBuf,

        /// Path to sample metadata TSV
        #[arg(short, long)]
        metadata: PathBuf,

        /// Metadata column holding the labels
        #[arg(long)]
        column: String,

        /// Prefix for the output table and metadata
        #[arg(short, long)]
        output_prefix: PathBuf,

        /// Labels to keep (default: all)
        #[arg(long, value_delimiter = ',')]
        labels: Vec<String>,

        /// Samples kept per label
        #[arg(long, default_value = "50")]
        samples_per_label: usize,

        /// Samples relabelled per label
        #[arg(long, default_value = "2")]
        n_mislabel: usize,

        /// Samples contaminated per label
        #[arg(long, default_value = "2")]
        n_contaminate: usize,

        /// Minimum reads for a sample to be selected
        #[arg(long, default_value = "1000")]
        min_depth: u64,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Score a result table against injected truth
    Assess {
        /// Path to result table
        #[arg(short, long)]
        result: PathBuf,

        /// Path to metadata written by `simulate`
        #[arg(short, long)]
        truth: PathBuf,

        /// Label column used for the simulation
        #[arg(long)]
        column: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Generate an example pipeline configuration
    Example {
        /// Output path for the example YAML
        #[arg(short, long, default_value = "mislabeled.yaml")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(cli.log_level.to_level_filter())
        .format_module_path(false)
        .init();

    let result = match cli.command {
        Commands::Within {
            table,
            metadata,
            column,
            config,
            output,
            overrides,
        } => cmd_within(&table, &metadata, &column, &config, &output, &overrides),

        Commands::Against {
            focus,
            focus_metadata,
            focus_column,
            reference,
            reference_metadata,
            reference_column,
            config,
            output,
            overrides,
        } => cmd_against(
            (&focus, &focus_metadata, &focus_column),
            (&reference, &reference_metadata, &reference_column),
            &config,
            &output,
            &overrides,
        ),

        Commands::Validate { artifact } => cmd_validate(&artifact),

        Commands::Summarize { artifact, format } => cmd_summarize(&artifact, format),

        Commands::Simulate {
            table,
            metadata,
            column,
            output_prefix,
            labels,
            samples_per_label,
            n_mislabel,
            n_contaminate,
            min_depth,
            seed,
        } => {
            let injection = InjectionConfig::default()
                .with_labels(labels)
                .with_samples_per_label(samples_per_label)
                .with_problems(n_mislabel, n_contaminate)
                .with_min_depth(min_depth)
                .with_seed(seed);
            cmd_simulate(&table, &metadata, &column, &output_prefix, &injection)
        }

        Commands::Assess {
            result,
            truth,
            column,
            format,
        } => cmd_assess(&result, &truth, &column, format),

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn load_config(path: &PathBuf, overrides: &Overrides) -> Result<PipelineConfig> {
    info!("Loading pipeline configuration from {:?}", path);
    let mut config = PipelineConfig::from_path(path)?;
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn load_dataset(table_path: &PathBuf, metadata_path: &PathBuf) -> Result<(CountMatrix, Metadata)> {
    let table = CountMatrix::from_tsv(table_path)?;
    let metadata = Metadata::from_tsv(metadata_path)?;
    info!(
        "Loaded {:?}: {} features x {} samples",
        table_path,
        table.n_features(),
        table.n_samples()
    );
    Ok((table, metadata))
}

/// Run the within-dataset pipeline
fn cmd_within(
    table_path: &PathBuf,
    metadata_path: &PathBuf,
    column: &str,
    config_path: &PathBuf,
    output_path: &PathBuf,
    overrides: &Overrides,
) -> Result<()> {
    let config = load_config(config_path, overrides)?;
    let (classifier, tracker) = config.backend()?.build()?;
    let tables = InProcessTables::new(config.seed);
    let (table, metadata) = load_dataset(table_path, metadata_path)?;

    let records = MislabelPipeline::new(&config, &classifier, &tracker, &tables)
        .within(&Dataset::new(&table, &metadata, column))?;

    records.to_tsv(output_path)?;
    info!("Wrote {} samples to {:?}", records.len(), output_path);
    Ok(())
}

type DatasetPaths<'a> = (&'a PathBuf, &'a PathBuf, &'a str);

/// Run the against-dataset pipeline
fn cmd_against(
    focus: DatasetPaths<'_>,
    reference: DatasetPaths<'_>,
    config_path: &PathBuf,
    output_path: &PathBuf,
    overrides: &Overrides,
) -> Result<()> {
    let config = load_config(config_path, overrides)?;
    let (focus_table, focus_metadata) = load_dataset(focus.0, focus.1)?;
    let (reference_table, reference_metadata) = load_dataset(reference.0, reference.1)?;
    let (classifier, tracker) = config.backend()?.build()?;
    let tables = InProcessTables::new(config.seed);

    let records = MislabelPipeline::new(&config, &classifier, &tracker, &tables).against(
        &Dataset::new(&focus_table, &focus_metadata, focus.2),
        &Dataset::new(&reference_table, &reference_metadata, reference.2),
    )?;

    records.to_tsv(output_path)?;
    info!("Wrote {} focus samples to {:?}", records.len(), output_path);
    Ok(())
}

/// Validate a result table header and print its summary
fn cmd_validate(path: &PathBuf) -> Result<()> {
    MislabeledFormat::validate(path)?;
    let records = SampleRecords::from_tsv(path)?;
    println!("{:?} is a valid result table", path);
    print!("{}", records.summary());
    Ok(())
}

fn cmd_summarize(path: &PathBuf, format: OutputFormat) -> Result<()> {
    let summary = SampleRecords::from_tsv(path)?.summary();
    match format {
        OutputFormat::Text => print!("{}", summary),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}

/// Write a benchmark dataset with injected problems
fn cmd_simulate(
    table_path: &PathBuf,
    metadata_path: &PathBuf,
    column: &str,
    output_prefix: &PathBuf,
    injection: &InjectionConfig,
) -> Result<()> {
    let (table, metadata) = load_dataset(table_path, metadata_path)?;
    let data = inject_problems(&table, &metadata, column, injection)?;
    data.write(output_prefix)?;
    info!(
        "Wrote {} samples ({} mislabeled, {} contaminated) with prefix {:?}",
        data.table.n_samples(),
        data.mislabeled.len(),
        data.contaminated.len(),
        output_prefix
    );
    Ok(())
}

fn cmd_assess(result_path: &PathBuf, truth_path: &PathBuf, column: &str, format: OutputFormat) -> Result<()> {
    let records = SampleRecords::from_tsv(result_path)?;
    let truth = Metadata::from_tsv(truth_path)?;
    let assessment = assess(&records, &truth, column)?;
    match format {
        OutputFormat::Text => print!("{}", assessment),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&assessment)?),
    }
    Ok(())
}

/// Generate example pipeline configuration
fn cmd_example(output_path: &PathBuf) -> Result<()> {
    let yaml = format!(
        "# mislabeled pipeline configuration\n\
         # Thresholds follow the HMP SOP. Placeholders in program arguments are\n\
         # filled per call: {{table}} {{labels}} {{metadata}} {{label_column}}\n\
         # {{model}} {{output}} {{output_dir}} {{jobs}} {{loo}} {{source_depth}} {{sink_depth}}\n\
         # {{loo_flag}} is a whole argument: --loo, or dropped when leave-one-out is off.\n{}",
        PipelineConfig::example().to_yaml()?
    );

    std::fs::write(output_path, &yaml)?;
    info!("Wrote example configuration to {:?}", output_path);
    println!("{}", yaml);
    Ok(())
}
