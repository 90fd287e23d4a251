//! # Imputation and Standardization
//!
//! Both transformers are fitted exactly once on the training frame and then
//! applied, unchanged, to the training frame itself and to every inference
//! row. Each remembers the column names it was fitted on and refuses a frame
//! whose columns differ by name or order.

use crate::types::FeatureFrame;
use ndarray::{Array1, Array2, Axis};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreprocessError {
    #[error("Input columns {found:?} do not match the fitted columns {expected:?}")]
    AttributeMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("Cannot fit on a frame with no rows.")]
    EmptyData,
    #[error("Column '{0}' has no observed values to fit on.")]
    EmptyColumn(String),
    #[error("Column '{0}' still contains missing values; impute before scaling.")]
    UnexpectedMissing(String),
}

fn check_columns(expected: &[String], frame: &FeatureFrame) -> Result<(), PreprocessError> {
    if frame.columns() != expected {
        return Err(PreprocessError::AttributeMismatch {
            expected: expected.to_vec(),
            found: frame.columns().to_vec(),
        });
    }
    Ok(())
}

/// Replaces missing entries with the training-time column mean.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanImputer {
    columns: Vec<String>,
    means: Array1<f64>,
}

impl MeanImputer {
    pub fn fit(frame: &FeatureFrame) -> Result<Self, PreprocessError> {
        if frame.nrows() == 0 {
            return Err(PreprocessError::EmptyData);
        }
        let mut means = Array1::zeros(frame.ncols());
        for (j, name) in frame.columns().iter().enumerate() {
            let (sum, count) = frame
                .column(j)
                .iter()
                .filter(|v| !v.is_nan())
                .fold((0.0, 0usize), |(sum, count), &v| (sum + v, count + 1));
            if count == 0 {
                return Err(PreprocessError::EmptyColumn(name.clone()));
            }
            means[j] = sum / count as f64;
        }
        Ok(Self {
            columns: frame.columns().to_vec(),
            means,
        })
    }

    pub fn transform(&self, frame: &FeatureFrame) -> Result<FeatureFrame, PreprocessError> {
        check_columns(&self.columns, frame)?;
        let mut values = frame.values().to_owned();
        for (mut column, &mean) in values.axis_iter_mut(Axis(1)).zip(self.means.iter()) {
            column.mapv_inplace(|v| if v.is_nan() { mean } else { v });
        }
        Ok(frame.with_values(values))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }
}

/// Centers each column on its training mean and divides by its population
/// standard deviation. Zero-variance columns map to a constant `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    columns: Vec<String>,
    means: Array1<f64>,
    stds: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(frame: &FeatureFrame) -> Result<Self, PreprocessError> {
        if frame.nrows() == 0 {
            return Err(PreprocessError::EmptyData);
        }
        let values = frame.values();
        if let Some(j) = (0..frame.ncols()).find(|&j| values.column(j).iter().any(|v| v.is_nan()))
        {
            return Err(PreprocessError::UnexpectedMissing(frame.columns()[j].clone()));
        }
        let n = frame.nrows() as f64;
        let means = values.sum_axis(Axis(0)) / n;
        let mut stds = Array1::zeros(frame.ncols());
        for (j, &mean) in means.iter().enumerate() {
            let column = values.column(j);
            let first = column[0];
            if column.iter().all(|&v| v == first) {
                continue;
            }
            let variance = column.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            // Rounding noise in the mean of a constant column is not spread.
            if std > f64::EPSILON * mean.abs().max(1.0) {
                stds[j] = std;
            }
        }
        Ok(Self {
            columns: frame.columns().to_vec(),
            means,
            stds,
        })
    }

    pub fn transform(&self, frame: &FeatureFrame) -> Result<FeatureFrame, PreprocessError> {
        check_columns(&self.columns, frame)?;
        let input = frame.values();
        for (j, name) in self.columns.iter().enumerate() {
            if input.column(j).iter().any(|v| v.is_nan()) {
                return Err(PreprocessError::UnexpectedMissing(name.clone()));
            }
        }
        let mut values: Array2<f64> = input.to_owned();
        for (mut column, (&mean, &std)) in values
            .axis_iter_mut(Axis(1))
            .zip(self.means.iter().zip(self.stds.iter()))
        {
            if std > 0.0 {
                column.mapv_inplace(|v| (v - mean) / std);
            } else {
                column.fill(0.0);
            }
        }
        Ok(frame.with_values(values))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    pub fn stds(&self) -> &Array1<f64> {
        &self.stds
    }
}

/// Applies a fitted imputer and scaler in sequence.
pub fn impute_and_scale(
    imputer: &MeanImputer,
    scaler: &StandardScaler,
    frame: &FeatureFrame,
) -> Result<FeatureFrame, PreprocessError> {
    let imputed = imputer.transform(frame)?;
    let scaled = scaler.transform(&imputed)?;
    debug_assert!(scaled.values().iter().all(|v| v.is_finite()));
    Ok(scaled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn frame(names: &[&str], values: Array2<f64>) -> FeatureFrame {
        FeatureFrame::new(names.iter().map(|s| s.to_string()).collect(), values).unwrap()
    }

    #[test]
    fn imputer_uses_observed_mean() {
        let train = frame(&["a", "b"], array![[1.0, f64::NAN], [3.0, 4.0], [f64::NAN, 8.0]]);
        let imputer = MeanImputer::fit(&train).unwrap();
        assert_abs_diff_eq!(imputer.means()[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(imputer.means()[1], 6.0, epsilon = 1e-12);

        let filled = imputer.transform(&train).unwrap();
        assert_eq!(filled.missing_count(), 0);
        assert_abs_diff_eq!(filled.values()[[0, 1]], 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(filled.values()[[2, 0]], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(filled.values()[[1, 0]], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn imputer_fit_is_idempotent() {
        let train = frame(&["a", "b"], array![[1.0, f64::NAN], [3.0, 4.0], [f64::NAN, 8.0]]);
        let first = MeanImputer::fit(&train).unwrap();
        let second = MeanImputer::fit(&train).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn imputer_rejects_empty_column() {
        let train = frame(&["a", "b"], array![[1.0, f64::NAN], [2.0, f64::NAN]]);
        assert_eq!(
            MeanImputer::fit(&train).unwrap_err(),
            PreprocessError::EmptyColumn("b".to_string())
        );
    }

    #[test]
    fn reordered_columns_are_an_attribute_mismatch() {
        let train = frame(&["a", "b"], array![[1.0, 2.0], [3.0, 4.0]]);
        let imputer = MeanImputer::fit(&train).unwrap();
        let scaler = StandardScaler::fit(&train).unwrap();
        let swapped = frame(&["b", "a"], array![[2.0, 1.0]]);
        assert!(matches!(
            imputer.transform(&swapped),
            Err(PreprocessError::AttributeMismatch { .. })
        ));
        assert!(matches!(
            scaler.transform(&swapped),
            Err(PreprocessError::AttributeMismatch { .. })
        ));
        let narrower = frame(&["a"], array![[1.0]]);
        assert!(matches!(
            imputer.transform(&narrower),
            Err(PreprocessError::AttributeMismatch { .. })
        ));
    }

    #[test]
    fn scaler_standardizes_with_population_std() {
        let train = frame(&["a"], array![[1.0], [2.0], [3.0], [4.0]]);
        let scaler = StandardScaler::fit(&train).unwrap();
        assert_abs_diff_eq!(scaler.means()[0], 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(scaler.stds()[0], 1.25_f64.sqrt(), epsilon = 1e-12);

        let scaled = scaler.transform(&train).unwrap();
        let column = scaled.column(0);
        assert_abs_diff_eq!(column.sum(), 0.0, epsilon = 1e-12);
        let variance = column.iter().map(|v| v * v).sum::<f64>() / 4.0;
        assert_abs_diff_eq!(variance, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_variance_column_scales_to_zero() {
        let train = frame(&["a", "flat"], array![[1.0, 5.0], [3.0, 5.0]]);
        let scaler = StandardScaler::fit(&train).unwrap();
        assert_eq!(scaler.stds()[1], 0.0);

        let row = frame(&["a", "flat"], array![[2.0, 9.0]]);
        let scaled = scaler.transform(&row).unwrap();
        assert_eq!(scaled.values()[[0, 1]], 0.0);
        assert_abs_diff_eq!(scaled.values()[[0, 0]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn inexact_constant_column_scales_to_zero() {
        for (value, n) in [(0.1, 3), (0.7, 3), (1.1, 6), (56.7, 3), (56.7, 6), (56.7, 7)] {
            let train = frame(&["flat"], Array2::from_elem((n, 1), value));
            let scaler = StandardScaler::fit(&train).unwrap();
            assert_eq!(scaler.stds()[0], 0.0, "value {value} repeated {n} times");

            let scaled = scaler.transform(&train).unwrap();
            assert!(scaled.values().iter().all(|&v| v == 0.0));
            let row = frame(&["flat"], array![[value + 1.0]]);
            assert_eq!(scaler.transform(&row).unwrap().values()[[0, 0]], 0.0);
        }
    }

    #[test]
    fn small_but_real_spread_is_kept() {
        let train = frame(&["a"], array![[1.0], [1.0 + 1e-6], [1.0 - 1e-6]]);
        let scaler = StandardScaler::fit(&train).unwrap();
        assert!(scaler.stds()[0] > 0.0);
    }

    #[test]
    fn scaler_refuses_missing_values() {
        let train = frame(&["a"], array![[1.0], [f64::NAN]]);
        assert_eq!(
            StandardScaler::fit(&train).unwrap_err(),
            PreprocessError::UnexpectedMissing("a".to_string())
        );
    }

    #[test]
    fn scaler_fit_is_idempotent() {
        let train = frame(&["a", "b"], array![[1.0, 10.0], [2.0, 30.0], [6.0, 20.0]]);
        assert_eq!(
            StandardScaler::fit(&train).unwrap(),
            StandardScaler::fit(&train).unwrap()
        );
    }

    #[test]
    fn chained_transform_fills_then_scales() {
        let train = frame(&["a"], array![[0.0], [f64::NAN], [4.0]]);
        let imputer = MeanImputer::fit(&train).unwrap();
        let imputed = imputer.transform(&train).unwrap();
        let scaler = StandardScaler::fit(&imputed).unwrap();
        let out = impute_and_scale(&imputer, &scaler, &train).unwrap();
        assert_abs_diff_eq!(out.values()[[1, 0]], 0.0, epsilon = 1e-12);
        assert!(out.values()[[2, 0]] > 0.0);
    }
}
