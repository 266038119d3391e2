//! Hourly collection loop.
//!
//! Each cycle fetches the current measurement with bounded retries, appends
//! it to the record store unless its hour is already recorded, updates the
//! checkpoint, then sleeps until the next top of the hour. Failures never
//! end the loop.

use aqf_core::{FetchError, Measurement, PollutionSource, Reading};
use aqf_store::{AppendOutcome, Checkpoint, RecordStore, StoreError};
use aqf_utils::schedule::{duration_until_next_hour, next_top_of_hour};
use chrono::Utc;
use log::{error, info, warn};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub store_path: PathBuf,
    pub checkpoint_path: PathBuf,
    /// Offset applied to measurement timestamps before they are stored.
    pub utc_offset_hours: i32,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("air_quality_history.csv"),
            checkpoint_path: PathBuf::from("last_time.txt"),
            utc_offset_hours: 3,
            max_attempts: 5,
            retry_delay: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CycleOutcome {
    Written,
    Duplicate,
    /// Every attempt failed; nothing was appended.
    Exhausted,
    /// A measurement was fetched but the store could not be written.
    StoreFailed,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub attempts: u32,
}

pub struct Collector<S> {
    source: S,
    store: RecordStore,
    checkpoint: Checkpoint,
    config: CollectorConfig,
}

impl<S: PollutionSource> Collector<S> {
    pub fn new(source: S, config: CollectorConfig) -> Result<Self, StoreError> {
        let store = RecordStore::open(&config.store_path)?;
        let checkpoint = Checkpoint::new(&config.checkpoint_path);
        Ok(Self {
            source,
            store,
            checkpoint,
            config,
        })
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    async fn attempt(&self) -> Result<(Measurement, Reading), FetchError> {
        let measurement = self.source.fetch().await?;
        let (reading, _warnings) = measurement.to_reading(self.config.utc_offset_hours)?;
        Ok((measurement, reading))
    }

    /// Fetch with up to `max_attempts` tries, sleeping `retry_delay` between them.
    ///
    /// Returns the converted measurement, if any, and the number of attempts made.
    pub async fn fetch_with_retry(&self) -> (Option<(Measurement, Reading)>, u32) {
        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            info!("collection attempt {}/{}", attempt, max_attempts);
            match self.attempt().await {
                Ok(fetched) => return (Some(fetched), attempt),
                Err(e) if attempt < max_attempts => {
                    warn!(
                        "attempt {}/{} failed: {}; retrying in {}s",
                        attempt,
                        max_attempts,
                        e,
                        self.config.retry_delay.as_secs()
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => {
                    warn!("attempt {}/{} failed: {}", attempt, max_attempts, e);
                }
            }
        }
        (None, max_attempts)
    }

    fn record(&mut self, measurement: &Measurement, reading: &Reading) -> Result<AppendOutcome, StoreError> {
        let outcome = self.store.append(reading)?;
        if outcome == AppendOutcome::Written {
            if let Err(e) = self.checkpoint.write(measurement.dt) {
                warn!("failed to update checkpoint {}: {}", self.checkpoint.path().display(), e);
            }
        }
        Ok(outcome)
    }

    /// One fetch-and-append cycle.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let (fetched, attempts) = self.fetch_with_retry().await;
        let Some((measurement, reading)) = fetched else {
            error!("collection failed after {} attempts; skipping this cycle", attempts);
            return CycleReport {
                outcome: CycleOutcome::Exhausted,
                attempts,
            };
        };

        let outcome = match self.record(&measurement, &reading) {
            Ok(AppendOutcome::Written) => {
                info!("saved reading for {} {}", reading.date, reading.time);
                CycleOutcome::Written
            }
            Ok(AppendOutcome::Duplicate) => {
                info!(
                    "reading for {} {:02}:00 already recorded; skipping",
                    reading.date,
                    reading.slot().hour
                );
                CycleOutcome::Duplicate
            }
            Err(e) => {
                error!("failed to append reading to {}: {}", self.store.path().display(), e);
                CycleOutcome::StoreFailed
            }
        };
        CycleReport { outcome, attempts }
    }

    /// Run cycles on the hour until `shutdown` resolves.
    pub async fn run_until<F: Future<Output = ()>>(mut self, shutdown: F) {
        info!(
            "collector started; store {}, checkpoint {}",
            self.store.path().display(),
            self.checkpoint.path().display()
        );
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = self.run_cycle() => {}
            }

            let now = Utc::now();
            info!("waiting until {}", next_top_of_hour(now));
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(duration_until_next_hour(now)) => {}
            }
        }
        info!("collector shutting down");
    }
}

/// Collect until Ctrl-C.
pub async fn run_collect<S: PollutionSource>(source: S, config: CollectorConfig) -> anyhow::Result<()> {
    let collector = Collector::new(source, config)?;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    collector.run_until(shutdown).await;
    Ok(())
}
