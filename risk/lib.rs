#![deny(dead_code)]
#![deny(unused_imports)]

pub mod cache;
pub mod clean;
pub mod config;
pub mod data;
pub mod forest;
pub mod model;
pub mod patient;
pub mod preprocess;
pub mod tier;
pub mod types;

use thiserror::Error;

/// Every failure the estimator can surface, grouped by the stage that raised it.
#[derive(Error, Debug)]
pub enum EstimatorError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Load(#[from] data::LoadError),
    #[error(transparent)]
    Schema(#[from] clean::SchemaError),
    #[error(transparent)]
    Preprocess(#[from] preprocess::PreprocessError),
    #[error(transparent)]
    Forest(#[from] forest::ForestError),
    #[error(transparent)]
    Input(#[from] patient::InputError),
    #[error("Failed to write predictions: {0}")]
    Output(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
