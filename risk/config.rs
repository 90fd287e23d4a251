//! # Estimator Configuration
//!
//! The feature list, clinical ranges, column-name tolerances and forest
//! hyperparameters are all fixed here in one validated struct. The defaults
//! reproduce the Cleveland heart-disease layout; a TOML file may override any
//! subset of fields.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The dataset read when no path is supplied.
pub const DEFAULT_DATA_PATH: &str = "heart_disease_uci.csv";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// One canonical input attribute and the range a user may enter for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub label: String,
    pub min: f64,
    pub max: f64,
    /// Whether the training file must carry this column.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl FeatureSpec {
    fn new(name: &str, label: &str, min: f64, max: f64) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            min,
            max,
            required: true,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Hyperparameters of the bagged tree ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Features examined per split. `None` uses the square root of the feature count.
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 5,
            min_samples_split: 2,
            max_features: None,
            seed: 42,
        }
    }
}

impl ForestConfig {
    /// Resolves the per-split feature budget for a matrix with `n_features` columns.
    pub fn features_per_split(&self, n_features: usize) -> usize {
        let wanted = self
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().floor() as usize);
        wanted.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub data_path: PathBuf,
    /// Field separator; sniffed from the header line when unset.
    pub delimiter: Option<char>,
    /// Canonical features, in the order every matrix is laid out.
    pub features: Vec<FeatureSpec>,
    /// Accepted names for the severity column, tried in order.
    pub target_columns: Vec<String>,
    pub admin_columns: Vec<String>,
    /// Tokens (compared case-insensitively) that denote a missing value.
    pub missing_tokens: Vec<String>,
    /// Lowercase column-name variant -> canonical name.
    pub synonyms: BTreeMap<String, String>,
    /// Canonical column -> lowercase token -> numeric code.
    pub categories: BTreeMap<String, BTreeMap<String, f64>>,
    pub forest: ForestConfig,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        let features = vec![
            FeatureSpec::new("age", "Age (years)", 20.0, 100.0),
            FeatureSpec::new("sex", "Sex (0 = female, 1 = male)", 0.0, 1.0),
            FeatureSpec::new("cp", "Chest pain type", 0.0, 3.0),
            FeatureSpec::new("trestbps", "Resting blood pressure (mmHg)", 80.0, 200.0),
            FeatureSpec::new("chol", "Serum cholesterol (mg/dl)", 100.0, 600.0),
            FeatureSpec::new("fbs", "Fasting blood sugar > 120 mg/dl", 0.0, 1.0),
            FeatureSpec::new("restecg", "Resting ECG result", 0.0, 2.0),
            FeatureSpec::new("thalach", "Maximum heart rate (bpm)", 60.0, 220.0),
            FeatureSpec::new("exang", "Exercise-induced angina", 0.0, 1.0),
            FeatureSpec::new("oldpeak", "ST depression", 0.0, 10.0),
            FeatureSpec::new("slope", "ST segment slope", 0.0, 2.0),
            FeatureSpec::new("ca", "Major vessels coloured by fluoroscopy", 0.0, 3.0),
            FeatureSpec::new("thal", "Thalassemia", 3.0, 7.0),
        ];

        let synonyms = [
            ("thalch", "thalach"),
            ("max_heart_rate", "thalach"),
            ("max_hr", "thalach"),
            ("chest_pain_type", "cp"),
            ("chest_pain", "cp"),
            ("resting_bp", "trestbps"),
            ("resting_blood_pressure", "trestbps"),
            ("trestbp", "trestbps"),
            ("cholesterol", "chol"),
            ("serum_cholesterol", "chol"),
            ("fasting_blood_sugar", "fbs"),
            ("rest_ecg", "restecg"),
            ("resting_ecg", "restecg"),
            ("exercise_angina", "exang"),
            ("exercise_induced_angina", "exang"),
            ("st_depression", "oldpeak"),
            ("st_slope", "slope"),
            ("num_major_vessels", "ca"),
            ("major_vessels", "ca"),
            ("thalassemia", "thal"),
            ("gender", "sex"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        let boolean = code_table(&[("false", 0.0), ("true", 1.0), ("no", 0.0), ("yes", 1.0)]);
        let mut categories = BTreeMap::new();
        categories.insert(
            "sex".to_string(),
            code_table(&[("female", 0.0), ("male", 1.0), ("f", 0.0), ("m", 1.0)]),
        );
        categories.insert(
            "cp".to_string(),
            code_table(&[
                ("typical angina", 0.0),
                ("atypical angina", 1.0),
                ("non-anginal", 2.0),
                ("non-anginal pain", 2.0),
                ("asymptomatic", 3.0),
            ]),
        );
        categories.insert("fbs".to_string(), boolean.clone());
        categories.insert("exang".to_string(), boolean);
        categories.insert(
            "restecg".to_string(),
            code_table(&[
                ("normal", 0.0),
                ("st-t abnormality", 1.0),
                ("lv hypertrophy", 2.0),
            ]),
        );
        categories.insert(
            "slope".to_string(),
            code_table(&[("upsloping", 0.0), ("flat", 1.0), ("downsloping", 2.0)]),
        );
        categories.insert(
            "thal".to_string(),
            code_table(&[
                ("normal", 3.0),
                ("fixed defect", 6.0),
                ("reversable defect", 7.0),
                ("reversible defect", 7.0),
            ]),
        );

        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            delimiter: None,
            features,
            target_columns: vec!["num".to_string(), "target".to_string()],
            admin_columns: ["id", "dataset", "url", "source"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            missing_tokens: ["?", "nan", "null"].iter().map(|s| s.to_string()).collect(),
            synonyms,
            categories,
            forest: ForestConfig::default(),
        }
    }
}

fn code_table(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs
        .iter()
        .map(|&(token, code)| (token.to_string(), code))
        .collect()
}

impl EstimatorConfig {
    /// Reads a TOML file; fields it omits keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise returns the validated defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.features.is_empty() {
            return Err(ConfigError::Invalid("the feature list is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for spec in &self.features {
            if spec.name.trim().is_empty() || spec.name != spec.name.trim().to_lowercase() {
                return Err(ConfigError::Invalid(format!(
                    "feature name '{}' must be non-empty, trimmed and lowercase",
                    spec.name
                )));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "feature '{}' is listed twice",
                    spec.name
                )));
            }
            if !(spec.min.is_finite() && spec.max.is_finite()) || spec.min > spec.max {
                return Err(ConfigError::Invalid(format!(
                    "feature '{}' has an invalid range [{}, {}]",
                    spec.name, spec.min, spec.max
                )));
            }
        }
        if self.target_columns.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one target column name is required".to_string(),
            ));
        }
        if let Some(name) = self
            .target_columns
            .iter()
            .find(|name| seen.contains(name.as_str()))
        {
            return Err(ConfigError::Invalid(format!(
                "'{name}' cannot be both a feature and the target"
            )));
        }
        if self.forest.n_trees == 0 {
            return Err(ConfigError::Invalid("forest.n_trees must be positive".to_string()));
        }
        if self.forest.max_depth == 0 {
            return Err(ConfigError::Invalid("forest.max_depth must be positive".to_string()));
        }
        if self.forest.min_samples_split < 2 {
            return Err(ConfigError::Invalid(
                "forest.min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.forest.max_features == Some(0) {
            return Err(ConfigError::Invalid(
                "forest.max_features must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureSpec> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Lowercases, trims and maps a raw header to its canonical name.
    pub fn canonical_column_name(&self, raw: &str) -> String {
        let normalized = raw.trim().to_lowercase();
        match self.synonyms.get(&normalized) {
            Some(canonical) => canonical.clone(),
            None => normalized,
        }
    }

    pub fn is_missing_token(&self, token: &str) -> bool {
        let token = token.trim();
        token.is_empty()
            || self
                .missing_tokens
                .iter()
                .any(|sentinel| sentinel.eq_ignore_ascii_case(token))
    }

    pub fn is_target(&self, name: &str) -> bool {
        self.target_columns.iter().any(|t| t == name)
    }

    pub fn is_admin(&self, name: &str) -> bool {
        self.admin_columns.iter().any(|a| a == name)
    }
}
