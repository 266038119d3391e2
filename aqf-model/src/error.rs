use aqf_store::StoreError;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by training and forecasting.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Fewer readings than a forecast needs.
    #[error("insufficient history: need at least {required} readings, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("no training pairs")]
    EmptyTrainingSet,

    /// Step `step` (1-based) of the horizon produced NaN or infinity.
    #[error("model produced a non-finite prediction at step {step}")]
    NonFinitePrediction { step: usize },

    /// The timestamp of step `step` (1-based) is outside the calendar range.
    #[error("forecast timestamp at step {step} is out of range")]
    TimestampOverflow { step: usize },

    #[error("model error: {0}")]
    Model(#[from] candle_core::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("artifact I/O error: {0}")]
    ArtifactIo(#[from] std::io::Error),

    #[error("artifact manifest error: {0}")]
    ArtifactManifest(#[from] serde_json::Error),

    #[error("no model artifact found in {}", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("newest model artifact was trained at {trained_at}, older than {max_age_hours}h")]
    ArtifactStale {
        trained_at: DateTime<Utc>,
        max_age_hours: i64,
    },
}

pub type Result<T> = std::result::Result<T, ForecastError>;
