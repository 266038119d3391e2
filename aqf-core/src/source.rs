use crate::error::FetchError;
use crate::measurement::Measurement;
use serde::{Deserialize, Serialize};
use std::future::Future;

#[cfg(feature = "api")]
use crate::measurement::parse_pollution_body;
#[cfg(feature = "api")]
use reqwest::Client;
#[cfg(feature = "api")]
use std::time::Duration;

/// Base URL of the OpenWeatherMap API.
pub const OPENWEATHER_BASE_URL: &str = "http://api.openweathermap.org";

#[cfg(feature = "api")]
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Fixed geographic coordinates of the sampled location.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Default for Coordinates {
    /// Rostov-on-Don.
    fn default() -> Self {
        Coordinates {
            lat: 47.222531,
            lon: 39.718705,
        }
    }
}

/// Anything that can produce the current air pollution measurement.
pub trait PollutionSource {
    fn fetch(&self) -> impl Future<Output = Result<Measurement, FetchError>> + Send;
}

/// Client for the OpenWeatherMap `air_pollution` endpoint.
#[cfg(feature = "api")]
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
    coordinates: Coordinates,
}

#[cfg(feature = "api")]
impl OpenWeatherClient {
    pub fn new(api_key: impl Into<String>, coordinates: Coordinates) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(OpenWeatherClient {
            client,
            base_url: OPENWEATHER_BASE_URL.to_string(),
            api_key: api_key.into(),
            coordinates,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }
}

#[cfg(feature = "api")]
impl PollutionSource for OpenWeatherClient {
    async fn fetch(&self) -> Result<Measurement, FetchError> {
        let url = format!("{}/data/2.5/air_pollution", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", self.coordinates.lat.to_string()),
                ("lon", self.coordinates.lon.to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Source(format!("bad response status: {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.without_url().to_string()))?;
        parse_pollution_body(&body)
    }
}
