//! Sequence model and forecaster for hourly air quality history.
//!
//! - [`network`]: the LSTM network, its training loop and weight I/O
//! - [`forecaster`]: training on a history and autoregressive decoding
//! - [`artifact`]: saving trained models and forecasting from the newest one

pub mod artifact;
mod error;
pub mod forecaster;
pub mod network;

pub use error::{ForecastError, Result};
pub use forecaster::{forecast, forecast_store, Forecast, ForecastConfig, ForecastRow};
pub use network::{ModelConfig, NextStep, SequenceModel, TrainingConfig};
