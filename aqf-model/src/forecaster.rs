//! Multi-step forecasting from the stored history.
//!
//! Training runs the pipeline end to end: prepare → windows → fit on the
//! training prefix → score the held-out suffix. Forecasting then decodes
//! autoregressively from the last `window` scaled rows, feeding each
//! prediction back in as the newest row.

use crate::error::{ForecastError, Result};
use crate::network::{ModelConfig, NextStep, SequenceModel, TrainingConfig, TrainingReport};
use aqf_core::{FeatureVector, Reading, FEATURE_NAMES};
use aqf_data::pipeline::prepare;
use aqf_data::scaling::MinMaxScaler;
use aqf_data::windows::{make_windows, TRAIN_FRACTION};
use aqf_store::RecordStore;
use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::Path;

pub const DEFAULT_WINDOW: usize = 30;
pub const DEFAULT_HORIZON: usize = 7;

#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub window: usize,
    pub horizon: usize,
    pub train_fraction: f64,
    /// Spacing between forecast timestamps. One day, although the store
    /// samples hourly.
    pub step: TimeDelta,
    pub model: ModelConfig,
    pub training: TrainingConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            horizon: DEFAULT_HORIZON,
            train_fraction: TRAIN_FRACTION,
            step: TimeDelta::days(1),
            model: ModelConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

/// One forecast step in original units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    pub timestamp: NaiveDateTime,
    /// Ordered as [`FEATURE_NAMES`].
    pub values: FeatureVector,
}

impl ForecastRow {
    pub fn get(&self, feature: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|&name| name == feature)
            .map(|idx| self.values[idx])
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Forecast {
    pub last_observed: NaiveDateTime,
    pub rows: Vec<ForecastRow>,
    /// MSE on the held-out pairs in scaled space, if any were held out.
    pub holdout_mse: Option<f64>,
}

/// A model trained on a history, ready to decode from its newest window.
pub struct Trained {
    pub model: SequenceModel,
    pub scaler: MinMaxScaler,
    pub last_observed: NaiveDateTime,
    pub seed: Vec<FeatureVector>,
    pub report: TrainingReport,
    pub holdout_mse: Option<f64>,
}

pub fn train(readings: &[Reading], config: &ForecastConfig) -> Result<Trained> {
    let required = config.window + 1;
    let insufficient = ForecastError::InsufficientHistory {
        required,
        available: readings.len(),
    };
    if config.window == 0 || readings.len() < required {
        return Err(insufficient);
    }
    let prepared = prepare(readings).ok_or(insufficient)?;

    let windows = make_windows(&prepared.matrix, config.window);
    let (train_x, train_y) = windows.training(config.train_fraction);
    log::info!(
        "training on {} of {} windows (window {}, {} epochs)",
        train_x.len(),
        windows.len(),
        config.window,
        config.training.epochs
    );

    let mut model = SequenceModel::new(&config.model)?;
    let report = model.fit(train_x, train_y, &config.training)?;

    let (hold_x, hold_y) = windows.holdout(config.train_fraction);
    let holdout_mse = if hold_x.is_empty() {
        None
    } else {
        Some(model.evaluate(hold_x, hold_y)?)
    };
    log::info!(
        "training loss {:.6}, held-out mse {}",
        report.final_loss,
        holdout_mse.map_or("n/a".to_string(), |m| format!("{:.6}", m))
    );

    let seed = prepared.matrix[prepared.matrix.len() - config.window..].to_vec();
    Ok(Trained {
        model,
        scaler: prepared.scaler,
        last_observed: prepared.last_observed,
        seed,
        report,
        holdout_mse,
    })
}

/// Predict `horizon` steps, sliding the window over each prediction.
pub fn decode<M: NextStep>(
    model: &M,
    seed: &[FeatureVector],
    horizon: usize,
) -> Result<Vec<FeatureVector>> {
    let mut window: VecDeque<FeatureVector> = seed.iter().copied().collect();
    let mut predictions = Vec::with_capacity(horizon);
    for _ in 0..horizon {
        let input: Vec<FeatureVector> = window.iter().copied().collect();
        let next = model.predict(&input)?;
        predictions.push(next);
        window.pop_front();
        window.push_back(next);
    }
    Ok(predictions)
}

/// Undo scaling and stamp each step `last_observed + k * step`.
pub fn dated_rows(
    predictions: &[FeatureVector],
    scaler: &MinMaxScaler,
    last_observed: NaiveDateTime,
    step: TimeDelta,
) -> Result<Vec<ForecastRow>> {
    let mut rows = Vec::with_capacity(predictions.len());
    let mut timestamp = last_observed;
    for (idx, prediction) in predictions.iter().enumerate() {
        let values = scaler.inverse_row(prediction);
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::NonFinitePrediction { step: idx + 1 });
        }
        timestamp = timestamp
            .checked_add_signed(step)
            .ok_or(ForecastError::TimestampOverflow { step: idx + 1 })?;
        rows.push(ForecastRow { timestamp, values });
    }
    Ok(rows)
}

/// Retrain from scratch on `readings` and forecast `config.horizon` steps.
pub fn forecast(readings: &[Reading], config: &ForecastConfig) -> Result<Forecast> {
    let trained = train(readings, config)?;
    let predictions = decode(&trained.model, &trained.seed, config.horizon)?;
    let rows = dated_rows(
        &predictions,
        &trained.scaler,
        trained.last_observed,
        config.step,
    )?;
    Ok(Forecast {
        last_observed: trained.last_observed,
        rows,
        holdout_mse: trained.holdout_mse,
    })
}

/// Forecast from a snapshot of the record store at `path`.
pub fn forecast_store(path: impl AsRef<Path>, config: &ForecastConfig) -> Result<Forecast> {
    let store = RecordStore::open_existing(path)?;
    forecast(&store.readings()?, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqf_core::FEATURE_COUNT;
    use chrono::NaiveDate;

    /// Predicts the newest row plus 0.1 in every column.
    struct Drift;

    impl NextStep for Drift {
        fn predict(&self, window: &[FeatureVector]) -> Result<FeatureVector> {
            let last = window.last().copied().unwrap_or([0.0; FEATURE_COUNT]);
            Ok(last.map(|v| v + 0.1))
        }
    }

    /// Fails the test if the window ever changes length.
    struct FixedWidth(usize);

    impl NextStep for FixedWidth {
        fn predict(&self, window: &[FeatureVector]) -> Result<FeatureVector> {
            assert_eq!(window.len(), self.0);
            Ok([f64::NAN; FEATURE_COUNT])
        }
    }

    fn hourly_readings(count: usize) -> Vec<Reading> {
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
                    aqi: 1 + (i % 5) as u32,
                    pm10: 10 + (i % 7) as u32,
                    pm2_5: 20 + (i % 3) as u32,
                    no2: 4,
                    so2: 2 + (i % 2) as u32,
                    co: 250 + i as u32,
                    o3: 60 + (i % 11) as u32,
                }
            })
            .collect()
    }

    fn quick_config() -> ForecastConfig {
        ForecastConfig {
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

    #[test]
    fn test_decode_feeds_predictions_back() {
        let seed = vec![[0.0; FEATURE_COUNT]; 3];
        let predictions = decode(&Drift, &seed, 4).unwrap();
        let first: Vec<f64> = predictions.iter().map(|p| p[0]).collect();
        let expected = [0.1, 0.2, 0.3, 0.4];
        for (a, b) in first.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_decode_keeps_window_width() {
        let seed = vec![[0.5; FEATURE_COUNT]; 30];
        assert_eq!(decode(&FixedWidth(30), &seed, 7).unwrap().len(), 7);
    }

    #[test]
    fn test_dated_rows_step_and_inverse() {
        let scaler = MinMaxScaler {
            mins: [0.0; FEATURE_COUNT],
            maxs: [10.0; FEATURE_COUNT],
        };
        let last = NaiveDate::from_ymd_opt(2024, 5, 31)
            .unwrap()
            .and_hms_opt(23, 0, 0)
            .unwrap();
        let rows = dated_rows(&[[0.5; FEATURE_COUNT]; 3], &scaler, last, TimeDelta::days(1)).unwrap();
        let stamps: Vec<String> = rows.iter().map(|r| r.timestamp.to_string()).collect();
        assert_eq!(
            stamps,
            vec![
                "2024-06-01 23:00:00",
                "2024-06-02 23:00:00",
                "2024-06-03 23:00:00"
            ]
        );
        assert_eq!(rows[0].get("PM2.5"), Some(5.0));
        assert_eq!(rows[0].get("NH3"), None);
    }

    #[test]
    fn test_dated_rows_rejects_non_finite() {
        let scaler = MinMaxScaler {
            mins: [0.0; FEATURE_COUNT],
            maxs: [1.0; FEATURE_COUNT],
        };
        let last = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let predictions = [[0.5; FEATURE_COUNT], [f64::NAN; FEATURE_COUNT]];
        let err = dated_rows(&predictions, &scaler, last, TimeDelta::days(1)).unwrap_err();
        assert!(matches!(err, ForecastError::NonFinitePrediction { step: 2 }));
    }

    #[test]
    fn test_dated_rows_rejects_out_of_range_step() {
        let scaler = MinMaxScaler {
            mins: [0.0; FEATURE_COUNT],
            maxs: [1.0; FEATURE_COUNT],
        };
        let last = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let huge = TimeDelta::try_hours(2_000_000_000_000).unwrap();
        let err = dated_rows(&[[0.5; FEATURE_COUNT]; 2], &scaler, last, huge).unwrap_err();
        assert!(matches!(err, ForecastError::TimestampOverflow { step: 1 }));
    }

    #[test]
    fn test_forty_hours_yield_seven_daily_rows() {
        let readings = hourly_readings(40);
        let config = quick_config();
        let trained = train(&readings, &config).unwrap();
        assert_eq!(trained.report.pairs, 9);
        assert_eq!(trained.seed.len(), 30);
        assert!(trained.holdout_mse.is_some());

        let forecast = forecast(&readings, &config).unwrap();
        assert_eq!(forecast.rows.len(), 7);
        let last = readings.last().unwrap().timestamp();
        assert_eq!(forecast.last_observed, last);
        for (k, row) in forecast.rows.iter().enumerate() {
            assert_eq!(row.timestamp, last + TimeDelta::days(k as i64 + 1));
        }
    }

    #[test]
    fn test_short_history_is_insufficient() {
        let err = forecast(&hourly_readings(30), &quick_config()).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientHistory {
                required: 31,
                available: 30
            }
        ));
    }

    #[test]
    fn test_minimum_history_trains_on_single_pair() {
        let trained = train(&hourly_readings(31), &quick_config()).unwrap();
        assert_eq!(trained.report.pairs, 1);
        assert!(trained.holdout_mse.is_none());
    }

    #[test]
    fn test_forecast_store_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = forecast_store(dir.path().join("missing.csv"), &quick_config()).unwrap_err();
        assert!(matches!(err, ForecastError::Store(_)));
    }
}
