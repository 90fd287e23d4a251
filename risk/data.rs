//! # Data Loading Module
//!
//! This module is the entry point for the clinical dataset. It reads a
//! delimited file with polars, hands the text cells to the cleaner, and
//! assembles the feature frame and binary labels the rest of the pipeline
//! trains on.
//!
//! - Tolerant Input: the delimiter is sniffed from the header line unless the
//!   configuration pins it, and every column is read as text so that sentinel
//!   tokens never abort the parse.
//! - Explicit Schema: the feature list comes from `EstimatorConfig`, never from
//!   whatever columns the file happens to carry.

use crate::EstimatorError;
use crate::clean::{CleanTable, CleaningMode, SchemaError, clean_table};
use crate::config::EstimatorConfig;
use crate::patient::{FeatureRow, InputError};
use crate::types::FeatureFrame;
use log::{debug, info, warn};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Candidate separators in tie-break order.
const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Could not open dataset '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Dataset '{0}' is empty; a header line is required.")]
    Empty(PathBuf),
    #[error("Delimiter {0:?} is not a single-byte ASCII character.")]
    Delimiter(char),
    #[error("Failed to parse dataset '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },
}

/// The file exactly as read: header names and text cells, column-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub columns: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn nrows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }
}

/// Validated data ready for fitting.
#[derive(Debug)]
pub struct TrainingData {
    /// Features in canonical order; `NaN` marks a missing value.
    pub features: FeatureFrame,
    /// `1` when the recorded severity is above zero.
    pub labels: Array1<u8>,
    pub rows_read: usize,
    pub rows_without_target: usize,
    /// Configured features absent from the fitted schema, with the reason.
    pub dropped_features: Vec<String>,
}

impl TrainingData {
    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }
}

/// Collapses an ordinal diagnosis to presence (`1`) or absence (`0`).
pub fn binarize_severity(severity: f64) -> u8 {
    if severity > 0.0 { 1 } else { 0 }
}

/// Picks the candidate that occurs most often outside double quotes.
pub fn sniff_delimiter(header_line: &str) -> u8 {
    let mut counts = [0usize; DELIMITER_CANDIDATES.len()];
    let mut quoted = false;
    for byte in header_line.bytes() {
        if byte == b'"' {
            quoted = !quoted;
            continue;
        }
        if quoted {
            continue;
        }
        if let Some(slot) = DELIMITER_CANDIDATES.iter().position(|&c| c == byte) {
            counts[slot] += 1;
        }
    }
    let mut best = 0;
    for (slot, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = slot;
        }
    }
    if counts[best] == 0 {
        b','
    } else {
        DELIMITER_CANDIDATES[best]
    }
}

fn read_header_line(path: &Path) -> Result<String, LoadError> {
    let io_error = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_error)?;
    let mut line = String::new();
    BufReader::new(file).read_line(&mut line).map_err(io_error)?;
    if line.trim().is_empty() {
        return Err(LoadError::Empty(path.to_path_buf()));
    }
    Ok(line)
}

/// Reads a delimited file into a text table.
pub fn load_table(path: &Path, delimiter: Option<char>) -> Result<RawTable, LoadError> {
    let header = read_header_line(path)?;
    let separator = match delimiter {
        Some(c) if c.is_ascii() => c as u8,
        Some(c) => return Err(LoadError::Delimiter(c)),
        None => sniff_delimiter(&header),
    };
    info!(
        "Loading dataset from '{}' (delimiter {:?})",
        path.display(),
        separator as char
    );

    let parse_error = |source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    // Zero inference rows reads every column as text.
    let df = CsvReader::new(file)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(Some(0))
                .with_parse_options(CsvParseOptions::default().with_separator(separator)),
        )
        .finish()
        .map_err(parse_error)?;

    let headers: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    let mut columns = Vec::with_capacity(headers.len());
    for name in &headers {
        let text = df
            .column(name)
            .and_then(|column| column.cast(&DataType::String))
            .map_err(parse_error)?;
        let cells: Vec<Option<String>> = text
            .str()
            .map_err(parse_error)?
            .into_iter()
            .map(|cell| cell.map(str::to_string))
            .collect();
        columns.push(cells);
    }

    debug!("Read {} rows x {} columns", df.height(), headers.len());
    Ok(RawTable { headers, columns })
}

/// Loads, cleans and assembles the training set described by `config`.
pub fn load_training_data(config: &EstimatorConfig) -> Result<TrainingData, EstimatorError> {
    let raw = load_table(&config.data_path, config.delimiter)?;
    let table = clean_table(raw, config, CleaningMode::Training)?;
    Ok(assemble_training_data(&table, config)?)
}

/// Builds the feature frame and labels from a cleaned table.
pub fn assemble_training_data(
    table: &CleanTable,
    config: &EstimatorConfig,
) -> Result<TrainingData, SchemaError> {
    let target = table.target().ok_or_else(|| SchemaError::MissingColumns {
        missing: config.target_columns.clone(),
    })?;

    let labeled_rows: Vec<usize> = target
        .iter()
        .enumerate()
        .filter_map(|(row, value)| value.map(|_| row))
        .collect();
    let rows_without_target = table.nrows() - labeled_rows.len();
    if labeled_rows.is_empty() {
        return Err(SchemaError::NoLabeledRows);
    }
    if rows_without_target > 0 {
        warn!("Dropping {rows_without_target} rows with no recorded diagnosis");
    }

    let mut dropped_features: Vec<String> = table.report().empty_features.clone();
    let mut schema: Vec<&str> = Vec::new();
    for spec in &config.features {
        let Some(values) = table.column(&spec.name) else {
            if !dropped_features.contains(&spec.name) {
                dropped_features.push(spec.name.clone());
            }
            continue;
        };
        if labeled_rows.iter().all(|&row| values[row].is_none()) {
            warn!(
                "Feature '{}' has no values among labeled rows; dropping it",
                spec.name
            );
            dropped_features.push(spec.name.clone());
            continue;
        }
        schema.push(spec.name.as_str());
    }
    if schema.is_empty() {
        return Err(SchemaError::NoUsableFeatures);
    }

    let columns: Vec<&[Option<f64>]> = schema
        .iter()
        .filter_map(|name| table.column(name))
        .collect();
    let values = Array2::from_shape_fn((labeled_rows.len(), columns.len()), |(r, c)| {
        columns[c][labeled_rows[r]].unwrap_or(f64::NAN)
    });
    let labels: Array1<u8> = labeled_rows
        .iter()
        .map(|&row| target[row].map_or(0, binarize_severity))
        .collect();

    let names: Vec<String> = schema.iter().map(|s| s.to_string()).collect();
    let features = FeatureFrame::new(names, values).map_err(|_| SchemaError::NoUsableFeatures)?;

    info!(
        "Assembled {} labeled rows with {} features",
        features.nrows(),
        features.ncols()
    );
    Ok(TrainingData {
        features,
        labels,
        rows_read: table.nrows(),
        rows_without_target,
        dropped_features,
    })
}

/// Reads a file of patients to score. Absent feature columns are left missing.
pub fn load_scoring_rows(
    path: &Path,
    config: &EstimatorConfig,
) -> Result<Vec<FeatureRow>, EstimatorError> {
    let raw = load_table(path, config.delimiter)?;
    let table = clean_table(raw, config, CleaningMode::Scoring)?;

    let absent: Vec<&str> = config
        .features
        .iter()
        .map(|spec| spec.name.as_str())
        .filter(|name| table.column(name).is_none())
        .collect();
    if !absent.is_empty() {
        warn!("Scoring file lacks {absent:?}; those values will be imputed");
    }

    let mut rows = Vec::with_capacity(table.nrows());
    for row in 0..table.nrows() {
        let values: Vec<Option<f64>> = config
            .features
            .iter()
            .map(|spec| table.column(&spec.name).and_then(|column| column[row]))
            .collect();
        let feature_row =
            FeatureRow::from_values(values, config).map_err(|source| InputError::InvalidRow {
                row: row + 1,
                source: Box::new(source),
            })?;
        rows.push(feature_row);
    }
    Ok(rows)
}
