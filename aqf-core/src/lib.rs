//! Core types for air quality collection and forecasting.
//!
//! - [`reading`]: the persisted hourly [`Reading`] and its feature vector
//! - [`measurement`]: raw air pollution payloads and numeric coercion
//! - [`category`]: AQI index to category labels
//! - [`source`]: the [`PollutionSource`] seam and, with the `api` feature,
//!   the OpenWeatherMap client

pub mod category;
pub mod error;
pub mod measurement;
pub mod reading;
pub mod source;

pub use category::AqiCategory;
pub use error::{CoercionWarning, FetchError};
pub use measurement::Measurement;
pub use reading::{FeatureVector, HourSlot, Reading, FEATURE_COUNT, FEATURE_NAMES};
pub use source::{Coordinates, PollutionSource};
