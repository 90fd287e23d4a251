use crate::EstimatorError;
use crate::config::{EstimatorConfig, ForestConfig};
use crate::data::{TrainingData, load_training_data};
use crate::forest::{RandomForest, class_of};
use crate::patient::FeatureRow;
use crate::preprocess::{MeanImputer, StandardScaler, impute_and_scale};
use crate::tier::RiskAssessment;
use crate::types::FeatureFrame;
use itertools::Itertools;
use log::info;
use ndarray::Array1;
use std::fmt;

/// What happened during the one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub rows_read: usize,
    pub rows_without_target: usize,
    pub rows_used: usize,
    pub positives: usize,
    pub negatives: usize,
    pub features: Vec<String>,
    pub dropped_features: Vec<String>,
    pub imputed_values: usize,
    pub training_accuracy: f64,
    pub n_trees: usize,
    pub max_depth: usize,
}

impl fmt::Display for TrainingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Rows: {} read, {} without diagnosis, {} used for training",
            self.rows_read, self.rows_without_target, self.rows_used
        )?;
        writeln!(f, "Labels: {} with disease, {} without", self.positives, self.negatives)?;
        writeln!(f, "Features ({}): {}", self.features.len(), self.features.iter().join(", "))?;
        if !self.dropped_features.is_empty() {
            writeln!(f, "Dropped features: {}", self.dropped_features.iter().join(", "))?;
        }
        writeln!(f, "Imputed values: {}", self.imputed_values)?;
        writeln!(f, "Forest: {} trees, max depth {}", self.n_trees, self.max_depth)?;
        write!(f, "Training accuracy: {:.2}%", self.training_accuracy * 100.0)
    }
}

/// The imputer, scaler and forest fitted together, plus the column order they
/// share. Immutable once built.
#[derive(Debug, Clone)]
pub struct FittedPipeline {
    schema: Vec<String>,
    imputer: MeanImputer,
    scaler: StandardScaler,
    forest: RandomForest,
    summary: TrainingSummary,
}

/// A fitted pipeline together with the exact matrix its forest was fitted on.
#[derive(Debug)]
pub struct TrainingOutcome {
    pub pipeline: FittedPipeline,
    pub design: FeatureFrame,
}

impl FittedPipeline {
    pub fn fit(
        data: &TrainingData,
        forest_config: &ForestConfig,
    ) -> Result<TrainingOutcome, EstimatorError> {
        let frame = &data.features;
        let imputer = MeanImputer::fit(frame)?;
        let imputed = imputer.transform(frame)?;
        let scaler = StandardScaler::fit(&imputed)?;
        let design = scaler.transform(&imputed)?;

        info!(
            "Fitting {} trees (max depth {}) on {} rows x {} features",
            forest_config.n_trees,
            forest_config.max_depth,
            design.nrows(),
            design.ncols()
        );
        let forest = RandomForest::fit(design.values(), data.labels.view(), forest_config)?;

        let predicted = forest.predict(design.values())?;
        let correct = predicted
            .iter()
            .zip(data.labels.iter())
            .filter(|(p, y)| p == y)
            .count();
        let positives = data.positives();
        let summary = TrainingSummary {
            rows_read: data.rows_read,
            rows_without_target: data.rows_without_target,
            rows_used: frame.nrows(),
            positives,
            negatives: frame.nrows() - positives,
            features: frame.columns().to_vec(),
            dropped_features: data.dropped_features.clone(),
            imputed_values: frame.missing_count(),
            training_accuracy: correct as f64 / frame.nrows() as f64,
            n_trees: forest.n_trees(),
            max_depth: forest_config.max_depth,
        };
        info!(
            "Training accuracy {:.2}% on {} rows",
            summary.training_accuracy * 100.0,
            summary.rows_used
        );

        Ok(TrainingOutcome {
            pipeline: Self {
                schema: frame.columns().to_vec(),
                imputer,
                scaler,
                forest,
                summary,
            },
            design,
        })
    }

    /// Imputes, scales and scores every row of `frame`.
    pub fn predict_proba(&self, frame: &FeatureFrame) -> Result<Array1<f64>, EstimatorError> {
        let design = impute_and_scale(&self.imputer, &self.scaler, frame)?;
        Ok(self.forest.predict_proba(design.values())?)
    }

    pub fn assess(&self, row: &FeatureRow) -> Result<RiskAssessment, EstimatorError> {
        let frame = row.to_frame(&self.schema);
        let probability = self.predict_proba(&frame)?[0];
        Ok(RiskAssessment::new(probability, class_of(probability)))
    }

    pub fn assess_all(&self, rows: &[FeatureRow]) -> Result<Vec<RiskAssessment>, EstimatorError> {
        rows.iter().map(|row| self.assess(row)).collect()
    }

    /// Feature names in the order the artifacts were fitted on.
    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    pub fn imputer(&self) -> &MeanImputer {
        &self.imputer
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    pub fn summary(&self) -> &TrainingSummary {
        &self.summary
    }
}

/// Loads the configured dataset and fits the whole pipeline.
pub fn train(config: &EstimatorConfig) -> Result<FittedPipeline, EstimatorError> {
    let data = load_training_data(config)?;
    let outcome = FittedPipeline::fit(&data, &config.forest)?;
    Ok(outcome.pipeline)
}
