//! Lazily trained, process-wide model.
//!
//! The first caller to need a prediction trains the pipeline; everyone else
//! waits on the same guard and then shares the finished artifacts. A failed
//! training run leaves the cache empty so a later call can try again.

use crate::EstimatorError;
use crate::config::EstimatorConfig;
use crate::model::{FittedPipeline, train};
use log::{debug, info};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Something that can produce a fitted pipeline on demand.
pub trait ArtifactSource: Send + Sync {
    fn build(&self) -> Result<FittedPipeline, EstimatorError>;
}

/// Trains from the dataset named in the configuration.
#[derive(Debug, Clone)]
pub struct DatasetSource {
    config: EstimatorConfig,
}

impl DatasetSource {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }
}

impl ArtifactSource for DatasetSource {
    fn build(&self) -> Result<FittedPipeline, EstimatorError> {
        info!(
            "Training risk model from '{}'",
            self.config.data_path.display()
        );
        train(&self.config)
    }
}

pub struct ModelCache<S: ArtifactSource> {
    source: S,
    init_guard: Mutex<()>,
    pipeline: OnceLock<Arc<FittedPipeline>>,
}

impl<S: ArtifactSource> ModelCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            init_guard: Mutex::new(()),
            pipeline: OnceLock::new(),
        }
    }

    /// Returns the cached pipeline, training it first if nobody has yet.
    pub fn get_or_train(&self) -> Result<Arc<FittedPipeline>, EstimatorError> {
        if let Some(pipeline) = self.pipeline.get() {
            return Ok(Arc::clone(pipeline));
        }
        // A panicking trainer never stored anything, so the guard is still usable.
        let _guard = self
            .init_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(pipeline) = self.pipeline.get() {
            debug!("Model was trained by a concurrent caller");
            return Ok(Arc::clone(pipeline));
        }
        let pipeline = Arc::new(self.source.build()?);
        let _ = self.pipeline.set(Arc::clone(&pipeline));
        Ok(pipeline)
    }

    /// The cached pipeline, if training has already succeeded.
    pub fn get(&self) -> Option<Arc<FittedPipeline>> {
        self.pipeline.get().cloned()
    }

    pub fn is_trained(&self) -> bool {
        self.pipeline.get().is_some()
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
