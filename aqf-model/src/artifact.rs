//! Persisted models, so inference can run without retraining.
//!
//! Each training run writes a pair of files into the model directory:
//!
//! - `model-<stamp>.safetensors`: network weights
//! - `model-<stamp>.json`: an [`ArtifactManifest`] with the fitted scaler
//!
//! Loading picks the manifest with the newest `trained_at`.

use crate::error::{ForecastError, Result};
use crate::forecaster::{decode, dated_rows, Forecast, ForecastConfig, Trained};
use crate::network::{ModelConfig, SequenceModel};
use aqf_core::Reading;
use aqf_data::pipeline::feature_matrix;
use aqf_data::scaling::MinMaxScaler;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_VERSION: u32 = 1;

const STAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub format_version: u32,
    pub trained_at: DateTime<Utc>,
    pub window: usize,
    pub model: ModelConfig,
    pub scaler: MinMaxScaler,
    pub last_observed: NaiveDateTime,
    pub training_pairs: usize,
    pub holdout_mse: Option<f64>,
    /// Weights file name, relative to the manifest.
    pub weights: String,
}

pub struct ModelArtifact {
    pub manifest: ArtifactManifest,
    pub model: SequenceModel,
}

impl fmt::Debug for ModelArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelArtifact")
            .field("manifest", &self.manifest)
            .field("model", &self.model)
            .finish()
    }
}

/// Write `trained` into `dir`, returning the manifest path.
pub fn save(
    dir: impl AsRef<Path>,
    trained: &Trained,
    config: &ForecastConfig,
    trained_at: DateTime<Utc>,
) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let stamp = trained_at.format(STAMP_FORMAT).to_string();
    let weights = format!("model-{}.safetensors", stamp);
    trained.model.save(dir.join(&weights))?;

    let manifest = ArtifactManifest {
        format_version: MANIFEST_VERSION,
        trained_at,
        window: config.window,
        model: *trained.model.config(),
        scaler: trained.scaler.clone(),
        last_observed: trained.last_observed,
        training_pairs: trained.report.pairs,
        holdout_mse: trained.holdout_mse,
        weights,
    };
    let manifest_path = dir.join(format!("model-{}.json", stamp));
    fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;
    log::info!("saved model artifact {}", manifest_path.display());
    Ok(manifest_path)
}

fn read_manifest(path: &Path) -> Option<ArtifactManifest> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("cannot read {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str::<ArtifactManifest>(&content) {
        Ok(m) if m.format_version == MANIFEST_VERSION => Some(m),
        Ok(m) => {
            log::warn!(
                "ignoring {}: unsupported format version {}",
                path.display(),
                m.format_version
            );
            None
        }
        Err(e) => {
            log::warn!("ignoring {}: {}", path.display(), e);
            None
        }
    }
}

/// Load the newest artifact in `dir`.
///
/// Fails with [`ForecastError::ArtifactMissing`] when there is none and with
/// [`ForecastError::ArtifactStale`] when it is older than `max_age` at `now`.
pub fn load_latest(dir: impl AsRef<Path>, max_age: TimeDelta, now: DateTime<Utc>) -> Result<ModelArtifact> {
    let dir = dir.as_ref();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ForecastError::ArtifactMissing(dir.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    let mut newest: Option<ArtifactManifest> = None;
    for entry in entries {
        let path = entry?.path();
        let is_manifest = path.extension().is_some_and(|ext| ext == "json")
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("model-"));
        if !is_manifest {
            continue;
        }
        if let Some(manifest) = read_manifest(&path) {
            if newest.as_ref().map_or(true, |n| manifest.trained_at > n.trained_at) {
                newest = Some(manifest);
            }
        }
    }

    let manifest = newest.ok_or_else(|| ForecastError::ArtifactMissing(dir.to_path_buf()))?;
    if now - manifest.trained_at > max_age {
        return Err(ForecastError::ArtifactStale {
            trained_at: manifest.trained_at,
            max_age_hours: max_age.num_hours(),
        });
    }
    let model = SequenceModel::load(&manifest.model, dir.join(&manifest.weights))?;
    log::info!(
        "loaded model trained at {} on {} pairs",
        manifest.trained_at,
        manifest.training_pairs
    );
    Ok(ModelArtifact { manifest, model })
}

/// Forecast with a stored model and scaler; only the last `window`
/// readings are needed.
pub fn forecast_with(
    artifact: &ModelArtifact,
    readings: &[Reading],
    horizon: usize,
    step: TimeDelta,
) -> Result<Forecast> {
    let window = artifact.manifest.window;
    let last_observed = readings.iter().map(|r| r.timestamp()).max();
    let last_observed = match last_observed {
        Some(ts) if readings.len() >= window => ts,
        _ => {
            return Err(ForecastError::InsufficientHistory {
                required: window,
                available: readings.len(),
            })
        }
    };
    let raw = feature_matrix(readings);
    let scaler = &artifact.manifest.scaler;
    let seed = scaler.transform(&raw[raw.len() - window..]);
    let predictions = decode(&artifact.model, &seed, horizon)?;
    let rows = dated_rows(&predictions, scaler, last_observed, step)?;
    Ok(Forecast {
        last_observed,
        rows,
        holdout_mse: artifact.manifest.holdout_mse,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecaster::train;
    use crate::network::TrainingConfig;
    use chrono::{NaiveDate, TimeZone};

    fn readings(count: usize) -> Vec<Reading> {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..count)
            .map(|i| {
                let ts = start + TimeDelta::hours(i as i64);
                Reading {
                    date: ts.date(),
                    time: ts.time(),
                    aqi: 1 + (i % 4) as u32,
                    pm10: 12,
                    pm2_5: 20 + (i % 6) as u32,
                    no2: 3,
                    so2: 1,
                    co: 240 + (i % 9) as u32,
                    o3: 55,
                }
            })
            .collect()
    }

    fn config() -> ForecastConfig {
        ForecastConfig {
            window: 5,
            model: ModelConfig {
                lstm_hidden: [8, 4],
            },
            training: TrainingConfig {
                epochs: 2,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_missing_dir_is_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_latest(dir.path().join("models"), TimeDelta::hours(24), at(0)).unwrap_err();
        assert!(matches!(err, ForecastError::ArtifactMissing(_)));

        let err = load_latest(dir.path(), TimeDelta::hours(24), at(0)).unwrap_err();
        assert!(matches!(err, ForecastError::ArtifactMissing(_)));
    }

    #[test]
    fn test_save_then_load_newest() {
        let dir = tempfile::tempdir().unwrap();
        let history = readings(20);
        let trained = train(&history, &config()).unwrap();
        save(dir.path(), &trained, &config(), at(1)).unwrap();
        save(dir.path(), &trained, &config(), at(3)).unwrap();

        let artifact = load_latest(dir.path(), TimeDelta::hours(24), at(4)).unwrap();
        assert_eq!(artifact.manifest.trained_at, at(3));
        assert_eq!(artifact.manifest.window, 5);
        assert_eq!(artifact.manifest.scaler, trained.scaler);

        let forecast = forecast_with(&artifact, &history, 7, TimeDelta::days(1)).unwrap();
        assert_eq!(forecast.rows.len(), 7);
        assert_eq!(forecast.last_observed, history.last().unwrap().timestamp());
    }

    #[test]
    fn test_debug_shows_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let trained = train(&readings(20), &config()).unwrap();
        save(dir.path(), &trained, &config(), at(0)).unwrap();
        let artifact = load_latest(dir.path(), TimeDelta::hours(24), at(1)).unwrap();
        let text = format!("{:?}", artifact);
        assert!(text.starts_with("ModelArtifact"));
        assert!(text.contains("trained_at"));
        assert!(text.contains("lstm_hidden: [8, 4]"));
    }

    #[test]
    fn test_stale_artifact_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let trained = train(&readings(20), &config()).unwrap();
        save(dir.path(), &trained, &config(), at(0)).unwrap();
        let err = load_latest(dir.path(), TimeDelta::hours(2), at(5)).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::ArtifactStale {
                max_age_hours: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_artifact_forecast_needs_a_full_window() {
        let dir = tempfile::tempdir().unwrap();
        let trained = train(&readings(20), &config()).unwrap();
        save(dir.path(), &trained, &config(), at(0)).unwrap();
        let artifact = load_latest(dir.path(), TimeDelta::hours(24), at(1)).unwrap();
        let err = forecast_with(&artifact, &readings(4), 7, TimeDelta::days(1)).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientHistory {
                required: 5,
                available: 4
            }
        ));
    }
}
