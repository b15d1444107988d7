//! Error type shared by every module of the crate.

use thiserror::Error;

/// Top-level error for dataset construction, solver runs and configuration.
///
/// Validation problems of a solver/dataset pairing are *not* errors: they are
/// reported through [`Skip`](crate::solver::Skip) so a harness can exclude the
/// combination instead of aborting.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Framework not supported: {0}")]
    UnsupportedFramework(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Solver {0} has no objective; call set_objective before run")]
    NotConfigured(String),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;
