//! Column normalization and numeric coercion for raw tables.

use crate::config::EstimatorConfig;
use crate::data::RawTable;
use itertools::Itertools;
use log::{debug, warn};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Required columns are missing after name normalization: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },
    #[error("No row carries a diagnosis value; nothing to train on.")]
    NoLabeledRows,
    #[error("Every configured feature column is empty; nothing to train on.")]
    NoUsableFeatures,
}

/// Whether the table will be trained on (target and required features
/// enforced) or only scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleaningMode {
    Training,
    Scoring,
}

/// Columns the cleaner removed, by reason.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleaningReport {
    pub administrative: Vec<String>,
    pub unrecognized: Vec<String>,
    pub duplicates: Vec<String>,
    /// Features with no parseable value at all.
    pub empty_features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct CleanColumn {
    name: String,
    values: Vec<Option<f64>>,
}

/// A table of canonical, numeric columns. `None` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanTable {
    columns: Vec<CleanColumn>,
    target: Option<CleanColumn>,
    nrows: usize,
    report: CleaningReport,
}

impl CleanTable {
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn target(&self) -> Option<&[Option<f64>]> {
        self.target.as_ref().map(|c| c.values.as_slice())
    }

    pub fn report(&self) -> &CleaningReport {
        &self.report
    }
}

/// Decodes one text cell of canonical column `column` into a number.
pub fn coerce_cell(cell: Option<&str>, column: &str, config: &EstimatorConfig) -> Option<f64> {
    let text = cell?.trim();
    if config.is_missing_token(text) {
        return None;
    }
    if let Some(code) = config
        .categories
        .get(column)
        .and_then(|codes| codes.get(&text.to_lowercase()))
    {
        return Some(*code);
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn clean_table(
    raw: RawTable,
    config: &EstimatorConfig,
    mode: CleaningMode,
) -> Result<CleanTable, SchemaError> {
    let nrows = raw.nrows();
    let mut report = CleaningReport::default();
    let mut features: Vec<CleanColumn> = Vec::new();
    let mut targets: Vec<CleanColumn> = Vec::new();

    for (header, cells) in raw.headers.iter().zip(raw.columns) {
        let name = config.canonical_column_name(header);
        if config.is_admin(&name) {
            report.administrative.push(name);
            continue;
        }
        let is_target = config.is_target(&name);
        if !is_target && config.feature(&name).is_none() {
            report.unrecognized.push(name);
            continue;
        }
        let claimed = if is_target { &targets } else { &features };
        let already_claimed = claimed.iter().any(|c| c.name == name);
        if already_claimed {
            warn!("Column '{header}' duplicates '{name}'; keeping the first occurrence");
            report.duplicates.push(header.clone());
            continue;
        }

        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|cell| coerce_cell(cell.as_deref(), &name, config))
            .collect();
        let column = CleanColumn { name, values };
        if is_target {
            targets.push(column);
        } else {
            features.push(column);
        }
    }

    // Target names are ranked by configuration, not by file position.
    let target = config.target_columns.iter().find_map(|wanted| {
        let index = targets.iter().position(|c| &c.name == wanted)?;
        Some(targets.swap_remove(index))
    });
    if let Some(chosen) = &target {
        for other in &targets {
            warn!(
                "Using '{}' as the diagnosis column; ignoring '{}'",
                chosen.name, other.name
            );
        }
    }

    if mode == CleaningMode::Training {
        let mut missing: Vec<String> = config
            .features
            .iter()
            .filter(|spec| spec.required && !features.iter().any(|c| c.name == spec.name))
            .map(|spec| spec.name.clone())
            .collect();
        if target.is_none() {
            missing.push(config.target_columns.iter().join(" or "));
        }
        if !missing.is_empty() {
            return Err(SchemaError::MissingColumns { missing });
        }
    }

    features.retain(|column| {
        let empty = column.values.iter().all(Option::is_none);
        if empty {
            warn!("Column '{}' has no numeric values; dropping it", column.name);
            report.empty_features.push(column.name.clone());
        }
        !empty
    });

    if !report.administrative.is_empty() {
        debug!("Dropped administrative columns: {:?}", report.administrative);
    }
    if !report.unrecognized.is_empty() {
        warn!("Ignoring unrecognized columns: {:?}", report.unrecognized);
    }

    Ok(CleanTable {
        columns: features,
        target,
        nrows,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(headers: &[&str], rows: &[Vec<&str>]) -> RawTable {
        let columns: Vec<Vec<Option<String>>> = (0..headers.len())
            .map(|c| {
                rows.iter()
                    .map(|row| {
                        let cell = row[c];
                        if cell.is_empty() { None } else { Some(cell.to_string()) }
                    })
                    .collect()
            })
            .collect();
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            columns,
        }
    }

    #[test]
    fn coerces_sentinels_categories_and_garbage() {
        let config = EstimatorConfig::default();
        assert_eq!(coerce_cell(Some(" 42 "), "age", &config), Some(42.0));
        assert_eq!(coerce_cell(Some("?"), "age", &config), None);
        assert_eq!(coerce_cell(Some("NULL"), "age", &config), None);
        assert_eq!(coerce_cell(Some("nan"), "age", &config), None);
        assert_eq!(coerce_cell(Some("abc"), "age", &config), None);
        assert_eq!(coerce_cell(Some("inf"), "age", &config), None);
        assert_eq!(coerce_cell(None, "age", &config), None);
        assert_eq!(coerce_cell(Some("Male"), "sex", &config), Some(1.0));
        assert_eq!(coerce_cell(Some("TRUE"), "fbs", &config), Some(1.0));
        assert_eq!(coerce_cell(Some("asymptomatic"), "cp", &config), Some(3.0));
        assert_eq!(coerce_cell(Some("reversable defect"), "thal", &config), Some(7.0));
        assert_eq!(coerce_cell(Some("flat"), "slope", &config), Some(1.0));
        // Category tokens only apply to their own column.
        assert_eq!(coerce_cell(Some("male"), "age", &config), None);
    }

    #[test]
    fn normalizes_names_and_drops_administrative_columns() {
        let config = EstimatorConfig::default();
        let table = raw(
            &["ID", " Age ", "Dataset", "thalch", "comment", "num"],
            &[vec!["1", "63", "Cleveland", "150", "x", "0"]],
        );
        let clean = clean_table(table, &config, CleaningMode::Scoring).unwrap();
        assert_eq!(clean.column_names(), vec!["age", "thalach"]);
        assert_eq!(clean.report().administrative, vec!["id", "dataset"]);
        assert_eq!(clean.report().unrecognized, vec!["comment"]);
        assert_eq!(clean.target(), Some(&[Some(0.0)][..]));
    }

    #[test]
    fn first_synonym_wins() {
        let config = EstimatorConfig::default();
        let table = raw(&["thalach", "thalch"], &[vec!["150", "99"]]);
        let clean = clean_table(table, &config, CleaningMode::Scoring).unwrap();
        assert_eq!(clean.column("thalach"), Some(&[Some(150.0)][..]));
        assert_eq!(clean.report().duplicates, vec!["thalch"]);
    }

    #[test]
    fn training_requires_target_and_features() {
        let config = EstimatorConfig::default();
        let headers = config.feature_names();
        let row: Vec<&str> = headers.iter().map(|_| "1").collect();
        let table = raw(&headers, &[row]);
        let err = clean_table(table, &config, CleaningMode::Training).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingColumns {
                missing: vec!["num or target".to_string()]
            }
        );
        assert!(err.to_string().contains("num or target"));
    }

    #[test]
    fn target_alias_is_accepted() {
        let config = EstimatorConfig::default();
        let mut headers = config.feature_names();
        headers.push("Target");
        let row: Vec<&str> = headers.iter().map(|_| "1").collect();
        let clean = clean_table(raw(&headers, &[row]), &config, CleaningMode::Training).unwrap();
        assert_eq!(clean.target(), Some(&[Some(1.0)][..]));
        assert_eq!(clean.column_names().len(), 13);
    }

    #[test]
    fn num_outranks_target_regardless_of_column_order() {
        let config = EstimatorConfig::default();
        let mut headers = config.feature_names();
        headers.extend(["target", "num"]);
        let mut row: Vec<&str> = config.feature_names().iter().map(|_| "1").collect();
        row.extend(["0", "3"]);
        let clean = clean_table(raw(&headers, &[row]), &config, CleaningMode::Training).unwrap();
        assert_eq!(clean.target(), Some(&[Some(3.0)][..]));
    }

    #[test]
    fn all_missing_feature_is_dropped() {
        let config = EstimatorConfig::default();
        let table = raw(&["age", "ca"], &[vec!["50", "?"], vec!["60", ""]]);
        let clean = clean_table(table, &config, CleaningMode::Scoring).unwrap();
        assert_eq!(clean.column_names(), vec!["age"]);
        assert_eq!(clean.report().empty_features, vec!["ca"]);
    }
}
