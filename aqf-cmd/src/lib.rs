//! Command implementations for the AQF CLI.
//!
//! Provides subcommands for hourly air quality collection, one-off
//! snapshots, model training and multi-step forecasting.

use clap::Subcommand;
use std::path::PathBuf;
use std::time::Duration;

pub mod collect;
pub mod forecast;
pub mod snapshot;

use aqf_core::source::OPENWEATHER_BASE_URL;

#[derive(Subcommand)]
pub enum Command {
    /// Fetch a measurement every hour and append it to the record store
    Collect {
        /// Path of the record store CSV
        #[arg(short, long, default_value = "air_quality_history.csv")]
        store: PathBuf,

        /// Path of the checkpoint file holding the last measurement time
        #[arg(short, long, default_value = "last_time.txt")]
        checkpoint: PathBuf,

        #[command(flatten)]
        source: SourceArgs,

        /// Hours added to the measurement UTC time before storing
        #[arg(long, default_value_t = 3, allow_negative_numbers = true)]
        utc_offset_hours: i32,

        /// Fetch attempts per cycle
        #[arg(long, default_value_t = 5)]
        max_attempts: u32,

        /// Seconds to wait between failed attempts
        #[arg(long, default_value_t = 60)]
        retry_delay_secs: u64,
    },

    /// Fetch the current measurement once and print it
    Snapshot {
        #[command(flatten)]
        source: SourceArgs,

        /// Hours added to the measurement UTC time
        #[arg(long, default_value_t = 3, allow_negative_numbers = true)]
        utc_offset_hours: i32,
    },

    /// Train a model on the record store and save it to a model directory
    Train(forecast::TrainArgs),

    /// Forecast the next steps of every feature from the record store
    Forecast(forecast::ForecastArgs),
}

/// Where measurements come from.
#[derive(clap::Args, Debug, Clone)]
pub struct SourceArgs {
    /// OpenWeatherMap API key
    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Latitude of the sampled location
    #[arg(long, default_value_t = 47.222531, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude of the sampled location
    #[arg(long, default_value_t = 39.718705, allow_negative_numbers = true)]
    pub lon: f64,

    /// Base URL of the measurement API
    #[arg(long, default_value = OPENWEATHER_BASE_URL)]
    pub base_url: String,
}

impl SourceArgs {
    pub fn client(&self) -> anyhow::Result<aqf_core::source::OpenWeatherClient> {
        let coordinates = aqf_core::Coordinates {
            lat: self.lat,
            lon: self.lon,
        };
        Ok(aqf_core::source::OpenWeatherClient::new(self.api_key.clone(), coordinates)?
            .with_base_url(self.base_url.clone()))
    }
}

pub async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Collect {
            store,
            checkpoint,
            source,
            utc_offset_hours,
            max_attempts,
            retry_delay_secs,
        } => {
            let config = collect::CollectorConfig {
                store_path: store,
                checkpoint_path: checkpoint,
                utc_offset_hours,
                max_attempts,
                retry_delay: Duration::from_secs(retry_delay_secs),
            };
            collect::run_collect(source.client()?, config).await
        }
        Command::Snapshot {
            source,
            utc_offset_hours,
        } => snapshot::run_snapshot(&source.client()?, utc_offset_hours).await,
        Command::Train(args) => forecast::run_train(args).await,
        Command::Forecast(args) => forecast::run_forecast(args).await,
    }
}
