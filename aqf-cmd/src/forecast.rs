//! Training and forecasting commands.
//!
//! Training is CPU-bound, so it runs on the blocking pool.

use aqf_core::FEATURE_NAMES;
use aqf_model::artifact;
use aqf_model::forecaster::{self, DEFAULT_HORIZON, DEFAULT_WINDOW};
use aqf_model::{Forecast, ForecastConfig, TrainingConfig};
use aqf_store::RecordStore;
use chrono::{TimeDelta, Utc};
use clap::Args;
use log::info;
use std::path::{Path, PathBuf};

/// Options shared by training and forecasting.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Path of the record store CSV
    #[arg(short, long, default_value = "air_quality_history.csv")]
    pub store: PathBuf,

    /// Number of past readings fed to the model
    #[arg(short, long, default_value_t = DEFAULT_WINDOW)]
    pub window: usize,

    #[arg(long, default_value_t = 50)]
    pub epochs: usize,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,
}

impl ModelArgs {
    fn config(&self) -> ForecastConfig {
        ForecastConfig {
            window: self.window,
            training: TrainingConfig {
                epochs: self.epochs,
                batch_size: self.batch_size,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Directory receiving the weights and manifest
    #[arg(short = 'd', long, default_value = "models")]
    pub model_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ForecastArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Number of future steps
    #[arg(long, default_value_t = DEFAULT_HORIZON)]
    pub horizon: usize,

    /// Hours between forecast timestamps
    #[arg(long, default_value_t = 24)]
    pub step_hours: i64,

    /// Use the newest saved model in this directory instead of retraining
    #[arg(short = 'd', long)]
    pub model_dir: Option<PathBuf>,

    /// Oldest acceptable saved model, in hours
    #[arg(long, default_value_t = 24)]
    pub max_age_hours: i64,

    /// Also write the forecast as CSV
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Convert an hour count from the command line, rejecting values chrono cannot hold.
fn hours(value: i64, flag: &str) -> anyhow::Result<TimeDelta> {
    TimeDelta::try_hours(value).ok_or_else(|| anyhow::anyhow!("{} is out of range: {}", flag, value))
}

fn load_history(path: &Path) -> anyhow::Result<Vec<aqf_core::Reading>> {
    let store = RecordStore::open_existing(path)?;
    let readings = store.readings()?;
    info!("loaded {} readings from {}", readings.len(), path.display());
    Ok(readings)
}

pub async fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    let config = args.model.config();
    let readings = load_history(&args.model.store)?;
    let manifest = tokio::task::spawn_blocking(move || -> anyhow::Result<PathBuf> {
        let trained = forecaster::train(&readings, &config)?;
        Ok(artifact::save(&args.model_dir, &trained, &config, Utc::now())?)
    })
    .await??;
    println!("Saved model to {}", manifest.display());
    Ok(())
}

pub async fn run_forecast(args: ForecastArgs) -> anyhow::Result<()> {
    anyhow::ensure!(args.step_hours > 0, "--step-hours must be positive");
    let mut config = args.model.config();
    config.horizon = args.horizon;
    config.step = hours(args.step_hours, "--step-hours")?;

    let readings = load_history(&args.model.store)?;
    let model_dir = args.model_dir.clone();
    let max_age = hours(args.max_age_hours, "--max-age-hours")?;
    let forecast = tokio::task::spawn_blocking(move || -> anyhow::Result<Forecast> {
        match model_dir {
            Some(dir) => {
                let saved = artifact::load_latest(&dir, max_age, Utc::now())?;
                Ok(artifact::forecast_with(&saved, &readings, config.horizon, config.step)?)
            }
            None => Ok(forecaster::forecast(&readings, &config)?),
        }
    })
    .await??;

    print!("{}", render_table(&forecast));
    if let Some(output) = &args.output {
        write_csv(output, &forecast)?;
        info!("wrote forecast to {}", output.display());
    }
    Ok(())
}

/// Fixed-width table, one row per step.
pub fn render_table(forecast: &Forecast) -> String {
    let mut out = format!("{:<20}", "Date");
    for name in FEATURE_NAMES {
        out.push_str(&format!("{:>10}", name));
    }
    out.push('\n');
    for row in &forecast.rows {
        out.push_str(&format!("{:<20}", row.timestamp.format("%Y-%m-%d %H:%M").to_string()));
        for value in row.values {
            out.push_str(&format!("{:>10.2}", value));
        }
        out.push('\n');
    }
    if let Some(mse) = forecast.holdout_mse {
        out.push_str(&format!("held-out mse (scaled): {:.6}\n", mse));
    }
    out
}

pub fn write_csv(path: &Path, forecast: &Forecast) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec!["Date"];
    header.extend(FEATURE_NAMES);
    writer.write_record(&header)?;
    for row in &forecast.rows {
        let mut record = vec![row.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()];
        record.extend(row.values.iter().map(|v| format!("{:.4}", v)));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
