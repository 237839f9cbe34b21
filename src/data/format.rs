//! Tab-separated artifact format for mislabeling results.
//!
//! ```text
//! #SampleID  env  alleged_probability  Mislabeled  corrected_label  SourceSink  min_proportion  Contaminated
//! ```
//!
//! Tri-state columns hold `True`, `False` or `Not applicable`; numeric
//! columns hold floats or `Not applicable`.

use crate::data::record::{SampleRecord, SampleRecords};
use crate::data::tristate::{TriState, NOT_APPLICABLE};
use crate::error::{MislabeledError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

pub const SAMPLE_ID_HEADER: &str = "#SampleID";
pub const ALLEGED_PROBABILITY: &str = "alleged_probability";
pub const MIN_PROPORTION: &str = "min_proportion";
pub const MISLABELED: &str = "Mislabeled";
pub const CONTAMINATED: &str = "Contaminated";
pub const CORRECTED_LABEL: &str = "corrected_label";
pub const SOURCE_SINK: &str = "SourceSink";

/// Columns every artifact must carry.
pub const REQUIRED_COLUMNS: [&str; 4] = [ALLEGED_PROBABILITY, MIN_PROPORTION, MISLABELED, CONTAMINATED];

const RESERVED_COLUMNS: [&str; 6] = [
    ALLEGED_PROBABILITY,
    MIN_PROPORTION,
    MISLABELED,
    CONTAMINATED,
    CORRECTED_LABEL,
    SOURCE_SINK,
];

/// Header checks for result tables.
pub struct MislabeledFormat;

impl MislabeledFormat {
    /// Required columns absent from a header.
    pub fn missing_columns<S: AsRef<str>>(header: &[S]) -> Vec<String> {
        REQUIRED_COLUMNS
            .iter()
            .filter(|req| !header.iter().any(|h| h.as_ref() == **req))
            .map(|s| s.to_string())
            .collect()
    }

    /// Whether the file's header carries every required column.
    pub fn sniff<P: AsRef<Path>>(path: P) -> Result<bool> {
        let header = Self::read_header(path.as_ref())?;
        Ok(Self::missing_columns(&header).is_empty())
    }

    /// Fail with [`MislabeledError::Format`] when required columns are missing.
    pub fn validate<P: AsRef<Path>>(path: P) -> Result<()> {
        let header = Self::read_header(path.as_ref())?;
        Self::validate_header(&header)
    }

    fn validate_header<S: AsRef<str>>(header: &[S]) -> Result<()> {
        let missing = Self::missing_columns(header);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MislabeledError::Format { missing })
        }
    }

    fn read_header(path: &Path) -> Result<Vec<String>> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut line = String::new();
        reader.read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).split('\t').map(String::from).collect())
    }
}

impl SampleRecords {
    /// Write the table as TSV.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_tsv(File::create(path)?)
    }

    /// Write the table as TSV to any writer.
    pub fn write_tsv<W: Write>(&self, writer: W) -> Result<()> {
        let mut out = csv::WriterBuilder::new().delimiter(b'\t').from_writer(writer);
        out.write_record([
            SAMPLE_ID_HEADER,
            self.label_column(),
            ALLEGED_PROBABILITY,
            MISLABELED,
            CORRECTED_LABEL,
            SOURCE_SINK,
            MIN_PROPORTION,
            CONTAMINATED,
        ])?;
        for (sid, r) in self.iter() {
            out.write_record([
                sid.to_string(),
                r.declared_label.clone(),
                format_number(r.alleged_probability),
                r.mislabeled.to_string(),
                r.corrected_label.clone().unwrap_or_else(|| NOT_APPLICABLE.to_string()),
                r.source_sink
                    .map(|role| role.to_string())
                    .unwrap_or_else(|| NOT_APPLICABLE.to_string()),
                format_number(r.min_proportion),
                r.contaminated.to_string(),
            ])?;
        }
        out.flush()?;
        Ok(())
    }

    /// Load and validate a result table from a TSV file.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read_tsv(File::open(path)?)
    }

    /// Load and validate a result table from any reader.
    ///
    /// The declared-label column is the first non-index column outside the
    /// reserved result columns. Unparsable numbers read back as missing.
    pub fn read_tsv<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .comment(None)
            .from_reader(reader);
        let header: Vec<String> = rdr.headers()?.iter().map(String::from).collect();
        MislabeledFormat::validate_header(&header)?;

        let position = |name: &str| header.iter().position(|h| h == name);
        let label_idx = header
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, h)| !RESERVED_COLUMNS.contains(&h.as_str()))
            .map(|(i, _)| i)
            .ok_or_else(|| MislabeledError::MissingColumn("declared label".to_string()))?;
        let extra = header.len() - 1 - RESERVED_COLUMNS.iter().filter(|&&c| position(c).is_some()).count();
        if extra > 1 {
            log::warn!(
                "Ignoring {} column(s) besides declared label '{}'",
                extra - 1,
                header[label_idx]
            );
        }

        let alleged_idx = position(ALLEGED_PROBABILITY);
        let mislabeled_idx = position(MISLABELED);
        let corrected_idx = position(CORRECTED_LABEL);
        let role_idx = position(SOURCE_SINK);
        let proportion_idx = position(MIN_PROPORTION);
        let contaminated_idx = position(CONTAMINATED);

        let mut records = SampleRecords::new(header[label_idx].clone());
        for row in rdr.records() {
            let row = row?;
            let sid = row.get(0).unwrap_or_default().to_string();
            if sid.starts_with("#q2:") {
                continue;
            }
            let field = |idx: Option<usize>| idx.and_then(|i| row.get(i)).unwrap_or(NOT_APPLICABLE);

            let record = SampleRecord {
                declared_label: row.get(label_idx).unwrap_or_default().to_string(),
                alleged_probability: parse_number(field(alleged_idx)),
                mislabeled: TriState::parse_lenient(field(mislabeled_idx)),
                corrected_label: parse_text(field(corrected_idx)),
                source_sink: field(role_idx).parse().ok(),
                min_proportion: parse_number(field(proportion_idx)),
                contaminated: TriState::parse_lenient(field(contaminated_idx)),
            };
            records.insert(sid, record)?;
        }
        Ok(records)
    }
}

fn format_number(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => v.to_string(),
        _ => NOT_APPLICABLE.to_string(),
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == NOT_APPLICABLE {
        None
    } else {
        Some(trimmed.to_string())
    }
}
