#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use cardiorisk::cache::{DatasetSource, ModelCache};
use cardiorisk::config::EstimatorConfig;
use cardiorisk::data::load_scoring_rows;
use cardiorisk::model::FittedPipeline;
use cardiorisk::patient::{ChestPain, PatientRecord, RestingEcg, Sex, StSlope, Thalassemia};
use cardiorisk::tier::{RiskAssessment, RiskTier};
use clap::{Args, CommandFactory, Parser, Subcommand};
use env_logger::Env;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

#[derive(Args)]
pub struct ModelArgs {
    /// Training dataset (CSV or other delimited text). Overrides the config file.
    #[arg(long, value_name = "PATH")]
    pub data: Option<PathBuf>,

    /// TOML file overriding feature ranges, column tolerances or forest settings
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl ModelArgs {
    fn resolve(&self) -> Result<EstimatorConfig, Box<dyn std::error::Error>> {
        let mut config = EstimatorConfig::resolve(self.config.as_deref())?;
        if let Some(data) = &self.data {
            config.data_path = data.clone();
        }
        Ok(config)
    }
}

fn train(config: EstimatorConfig) -> Result<Arc<FittedPipeline>, Box<dyn std::error::Error>> {
    let cache = ModelCache::new(DatasetSource::new(config));
    Ok(cache.get_or_train()?)
}

#[derive(Args)]
pub struct PredictArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Age in years
    #[arg(long)]
    pub age: Option<f64>,

    #[arg(long, value_enum)]
    pub sex: Option<Sex>,

    /// Chest pain type
    #[arg(long, value_enum)]
    pub cp: Option<ChestPain>,

    /// Resting blood pressure (mm Hg)
    #[arg(long)]
    pub trestbps: Option<f64>,

    /// Serum cholesterol (mg/dl)
    #[arg(long)]
    pub chol: Option<f64>,

    /// Fasting blood sugar above 120 mg/dl
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub fbs: Option<bool>,

    /// Resting electrocardiographic result
    #[arg(long, value_enum)]
    pub restecg: Option<RestingEcg>,

    /// Maximum heart rate achieved
    #[arg(long)]
    pub thalach: Option<f64>,

    /// Exercise induced angina
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub exang: Option<bool>,

    /// ST depression induced by exercise relative to rest
    #[arg(long)]
    pub oldpeak: Option<f64>,

    /// Slope of the peak exercise ST segment
    #[arg(long, value_enum)]
    pub slope: Option<StSlope>,

    /// Number of major vessels colored by fluoroscopy (0-3)
    #[arg(long)]
    pub ca: Option<f64>,

    #[arg(long, value_enum)]
    pub thal: Option<Thalassemia>,
}

impl PredictArgs {
    fn record(&self) -> PatientRecord {
        PatientRecord {
            age: self.age,
            sex: self.sex,
            chest_pain: self.cp,
            resting_bp: self.trestbps,
            cholesterol: self.chol,
            fasting_blood_sugar: self.fbs,
            resting_ecg: self.restecg,
            max_heart_rate: self.thalach,
            exercise_angina: self.exang,
            st_depression: self.oldpeak,
            st_slope: self.slope,
            vessels: self.ca,
            thalassemia: self.thal,
        }
    }
}

#[derive(Args)]
pub struct BatchArgs {
    /// Delimited file of patients to score (no diagnosis column needed)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    #[arg(long, value_name = "PATH", default_value = "predictions.tsv")]
    pub output: PathBuf,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Parser)]
#[command(
    name = "cardiorisk",
    about = "Heart disease risk estimation from routine clinical attributes",
    long_about = "Trains a random forest on a heart-disease dataset at startup and scores \
                 patients into low, moderate or high risk tiers."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the pipeline and report what was learned
    #[command(about = "Train the model and print a training summary")]
    Train(ModelArgs),

    /// Score a single patient
    #[command(about = "Estimate heart disease risk for one patient")]
    Predict(PredictArgs),

    /// Score every row of a file
    #[command(about = "Score a file of patients (outputs: predictions.tsv)")]
    Batch(BatchArgs),

    /// List the accepted inputs and their clinical ranges
    #[command(about = "Show the input attributes and their accepted ranges")]
    Ranges {
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

fn run_train(args: ModelArgs) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = train(args.resolve()?)?;
    println!("{}", pipeline.summary());
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.model.resolve()?;
    // Validate before paying for training.
    let row = args.record().to_feature_row(&config)?;
    let pipeline = train(config)?;
    let assessment = pipeline.assess(&row)?;

    println!("Patient:");
    print!("{row}");
    println!();
    println!("Probability of heart disease: {:.4}", assessment.probability);
    println!("Predicted class: {}", assessment.predicted_class);
    println!("{assessment}");
    println!("{}", assessment.tier.advice());
    Ok(())
}

#[derive(Serialize)]
struct PredictionRecord {
    row: usize,
    probability: f64,
    predicted_class: u8,
    tier: RiskTier,
}

fn save_predictions(
    assessments: &[RiskAssessment],
    output_path: &Path,
) -> Result<(), cardiorisk::EstimatorError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(output_path)?;
    for (index, assessment) in assessments.iter().enumerate() {
        writer.serialize(PredictionRecord {
            row: index + 1,
            probability: assessment.probability,
            predicted_class: assessment.predicted_class,
            tier: assessment.tier,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn run_batch(args: BatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.model.resolve()?;
    println!("Loading patients from: {}", args.input.display());
    let rows = load_scoring_rows(&args.input, &config)?;
    println!("Loaded {} patients for scoring", rows.len());

    let pipeline = train(config)?;
    let assessments = pipeline.assess_all(&rows)?;
    save_predictions(&assessments, &args.output)?;

    for tier in [RiskTier::High, RiskTier::Moderate, RiskTier::Low] {
        let count = assessments.iter().filter(|a| a.tier == tier).count();
        println!("{:<20} {count}", tier.headline());
    }
    println!("Predictions saved to: {}", args.output.display());
    Ok(())
}

fn run_ranges(config: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = EstimatorConfig::resolve(config.as_deref())?;
    println!("{:<10} {:>8} {:>8}  description", "feature", "min", "max");
    for spec in &config.features {
        println!(
            "{:<10} {:>8} {:>8}  {}",
            spec.name, spec.min, spec.max, spec.label
        );
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Train(args)) => run_train(args),
        Some(Commands::Predict(args)) => run_predict(args),
        Some(Commands::Batch(args)) => run_batch(args),
        Some(Commands::Ranges { config }) => run_ranges(config),
        None => {
            Cli::command().print_help().expect("print help");
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
