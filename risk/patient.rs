//! Patient attributes as entered by a user, and their validated numeric row.

use crate::config::EstimatorConfig;
use crate::types::FeatureFrame;
use clap::ValueEnum;
use ndarray::Array2;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("{feature} = {value} is outside the accepted range [{min}, {max}].")]
    OutOfRange {
        feature: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{feature} must be a finite number.")]
    NonFinite { feature: String },
    #[error("Configured feature '{feature}' is not one of the patient form fields.")]
    UnsupportedFeature { feature: String },
    #[error("Expected {expected} feature values, got {found}.")]
    LengthMismatch { expected: usize, found: usize },
    #[error("Row {row}: {source}")]
    InvalidRow {
        row: usize,
        #[source]
        source: Box<InputError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Sex {
    Female,
    Male,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChestPain {
    Typical,
    Atypical,
    NonAnginal,
    Asymptomatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RestingEcg {
    Normal,
    StTAbnormality,
    LvHypertrophy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StSlope {
    Upsloping,
    Flat,
    Downsloping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Thalassemia {
    Normal,
    FixedDefect,
    Reversible,
}

impl Sex {
    pub fn code(self) -> f64 {
        match self {
            Sex::Female => 0.0,
            Sex::Male => 1.0,
        }
    }
}

impl ChestPain {
    pub fn code(self) -> f64 {
        match self {
            ChestPain::Typical => 0.0,
            ChestPain::Atypical => 1.0,
            ChestPain::NonAnginal => 2.0,
            ChestPain::Asymptomatic => 3.0,
        }
    }
}

impl RestingEcg {
    pub fn code(self) -> f64 {
        match self {
            RestingEcg::Normal => 0.0,
            RestingEcg::StTAbnormality => 1.0,
            RestingEcg::LvHypertrophy => 2.0,
        }
    }
}

impl StSlope {
    pub fn code(self) -> f64 {
        match self {
            StSlope::Upsloping => 0.0,
            StSlope::Flat => 1.0,
            StSlope::Downsloping => 2.0,
        }
    }
}

impl Thalassemia {
    pub fn code(self) -> f64 {
        match self {
            Thalassemia::Normal => 3.0,
            Thalassemia::FixedDefect => 6.0,
            Thalassemia::Reversible => 7.0,
        }
    }
}

/// The 13 clinical inputs. `None` means "not measured"; it is imputed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientRecord {
    pub age: Option<f64>,
    pub sex: Option<Sex>,
    pub chest_pain: Option<ChestPain>,
    pub resting_bp: Option<f64>,
    pub cholesterol: Option<f64>,
    pub fasting_blood_sugar: Option<bool>,
    pub resting_ecg: Option<RestingEcg>,
    pub max_heart_rate: Option<f64>,
    pub exercise_angina: Option<bool>,
    pub st_depression: Option<f64>,
    pub st_slope: Option<StSlope>,
    pub vessels: Option<f64>,
    pub thalassemia: Option<Thalassemia>,
}

/// The canonical names a `PatientRecord` can supply.
pub const RECORD_FEATURES: [&str; 13] = [
    "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg", "thalach", "exang", "oldpeak",
    "slope", "ca", "thal",
];

fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

impl PatientRecord {
    /// Numeric value for a canonical feature name.
    pub fn value_of(&self, feature: &str) -> Option<f64> {
        match feature {
            "age" => self.age,
            "sex" => self.sex.map(Sex::code),
            "cp" => self.chest_pain.map(ChestPain::code),
            "trestbps" => self.resting_bp,
            "chol" => self.cholesterol,
            "fbs" => self.fasting_blood_sugar.map(flag),
            "restecg" => self.resting_ecg.map(RestingEcg::code),
            "thalach" => self.max_heart_rate,
            "exang" => self.exercise_angina.map(flag),
            "oldpeak" => self.st_depression,
            "slope" => self.st_slope.map(StSlope::code),
            "ca" => self.vessels,
            "thal" => self.thalassemia.map(Thalassemia::code),
            _ => None,
        }
    }

    pub fn to_feature_row(&self, config: &EstimatorConfig) -> Result<FeatureRow, InputError> {
        if let Some(spec) = config
            .features
            .iter()
            .find(|spec| !RECORD_FEATURES.contains(&spec.name.as_str()))
        {
            return Err(InputError::UnsupportedFeature {
                feature: spec.name.clone(),
            });
        }
        let values = config
            .features
            .iter()
            .map(|spec| self.value_of(&spec.name))
            .collect();
        FeatureRow::from_values(values, config)
    }
}

/// A range-checked row aligned with the configured feature list.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    names: Vec<String>,
    values: Vec<Option<f64>>,
}

impl FeatureRow {
    pub fn from_values(
        values: Vec<Option<f64>>,
        config: &EstimatorConfig,
    ) -> Result<Self, InputError> {
        if values.len() != config.features.len() {
            return Err(InputError::LengthMismatch {
                expected: config.features.len(),
                found: values.len(),
            });
        }
        for (spec, value) in config.features.iter().zip(&values) {
            let Some(value) = *value else { continue };
            if !value.is_finite() {
                return Err(InputError::NonFinite {
                    feature: spec.name.clone(),
                });
            }
            if !spec.contains(value) {
                return Err(InputError::OutOfRange {
                    feature: spec.name.clone(),
                    value,
                    min: spec.min,
                    max: spec.max,
                });
            }
        }
        Ok(Self {
            names: config.features.iter().map(|f| f.name.clone()).collect(),
            values,
        })
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.values[i])
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// Lays the row out in `schema` order. Names the row lacks become missing.
    pub fn to_frame(&self, schema: &[String]) -> FeatureFrame {
        let values = Array2::from_shape_fn((1, schema.len()), |(_, j)| {
            self.value(&schema[j]).unwrap_or(f64::NAN)
        });
        FeatureFrame::new(schema.to_vec(), values)
            .expect("row width always equals schema length")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

impl fmt::Display for FeatureRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            match value {
                Some(v) => writeln!(f, "  {name:<10} {v}")?,
                None => writeln!(f, "  {name:<10} (missing, imputed)")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_patient() -> PatientRecord {
        PatientRecord {
            age: Some(55.0),
            sex: Some(Sex::Male),
            chest_pain: Some(ChestPain::Asymptomatic),
            resting_bp: Some(120.0),
            cholesterol: Some(200.0),
            fasting_blood_sugar: Some(false),
            resting_ecg: Some(RestingEcg::Normal),
            max_heart_rate: Some(150.0),
            exercise_angina: Some(false),
            st_depression: Some(1.0),
            st_slope: Some(StSlope::Flat),
            vessels: Some(0.0),
            thalassemia: Some(Thalassemia::Normal),
        }
    }

    #[test]
    fn record_maps_to_canonical_codes() {
        let config = EstimatorConfig::default();
        let row = scenario_patient().to_feature_row(&config).unwrap();
        let values: Vec<Option<f64>> = row.iter().map(|(_, v)| v).collect();
        let expected = [55.0, 1.0, 3.0, 120.0, 200.0, 0.0, 0.0, 150.0, 0.0, 1.0, 1.0, 0.0, 3.0];
        assert_eq!(values, expected.iter().map(|&v| Some(v)).collect::<Vec<_>>());
        assert_eq!(row.missing_count(), 0);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let config = EstimatorConfig::default();
        let record = PatientRecord {
            age: Some(15.0),
            ..scenario_patient()
        };
        assert_eq!(
            record.to_feature_row(&config).unwrap_err(),
            InputError::OutOfRange {
                feature: "age".to_string(),
                value: 15.0,
                min: 20.0,
                max: 100.0
            }
        );
        let record = PatientRecord {
            st_depression: Some(10.5),
            ..scenario_patient()
        };
        assert!(record.to_feature_row(&config).is_err());
        let record = PatientRecord {
            cholesterol: Some(f64::NAN),
            ..scenario_patient()
        };
        assert!(matches!(
            record.to_feature_row(&config),
            Err(InputError::NonFinite { .. })
        ));
    }

    #[test]
    fn boundaries_of_ranges_are_accepted() {
        let config = EstimatorConfig::default();
        let record = PatientRecord {
            age: Some(20.0),
            resting_bp: Some(200.0),
            cholesterol: Some(100.0),
            max_heart_rate: Some(220.0),
            st_depression: Some(0.0),
            ..scenario_patient()
        };
        assert!(record.to_feature_row(&config).is_ok());
    }

    #[test]
    fn omitted_fields_stay_missing_in_frame() {
        let config = EstimatorConfig::default();
        let record = PatientRecord {
            vessels: None,
            ..scenario_patient()
        };
        let row = record.to_feature_row(&config).unwrap();
        assert_eq!(row.missing_count(), 1);

        let schema: Vec<String> = ["thal", "ca", "age"].iter().map(|s| s.to_string()).collect();
        let frame = row.to_frame(&schema);
        assert_eq!(frame.columns(), schema.as_slice());
        assert_eq!(frame.values()[[0, 0]], 3.0);
        assert!(frame.values()[[0, 1]].is_nan());
        assert_eq!(frame.values()[[0, 2]], 55.0);
    }

    #[test]
    fn unknown_configured_feature_is_reported() {
        let mut config = EstimatorConfig::default();
        config.features[0].name = "years".to_string();
        assert_eq!(
            scenario_patient().to_feature_row(&config).unwrap_err(),
            InputError::UnsupportedFeature {
                feature: "years".to_string()
            }
        );

        let mut config = EstimatorConfig::default();
        let mut bmi = config.features[0].clone();
        bmi.name = "bmi".to_string();
        config.features.push(bmi);
        assert!(matches!(
            scenario_patient().to_feature_row(&config),
            Err(InputError::UnsupportedFeature { feature }) if feature == "bmi"
        ));
    }

    #[test]
    fn every_record_feature_maps_to_a_value() {
        let record = scenario_patient();
        for name in RECORD_FEATURES {
            assert!(record.value_of(name).is_some(), "{name}");
        }
        let config = EstimatorConfig::default();
        assert_eq!(config.feature_names(), RECORD_FEATURES.to_vec());
    }

    #[test]
    fn length_mismatch_is_reported() {
        let config = EstimatorConfig::default();
        assert_eq!(
            FeatureRow::from_values(vec![Some(1.0)], &config).unwrap_err(),
            InputError::LengthMismatch {
                expected: 13,
                found: 1
            }
        );
    }
}
