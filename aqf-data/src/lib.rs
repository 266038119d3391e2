//! Feature preparation for air quality forecasting.
//!
//! This crate turns stored readings into the scaled feature matrix and the
//! (window, next step) pairs the sequence model trains on.

/// Reversible per-feature min-max scaling.
pub mod scaling {
    use aqf_core::{FeatureVector, FEATURE_COUNT};
    use serde::{Deserialize, Serialize};

    /// Maps every feature column linearly onto `[0, 1]` using the range
    /// observed when fitting.
    ///
    /// A constant column has no range; its values map to 0 and invert back
    /// to the constant.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct MinMaxScaler {
        pub mins: FeatureVector,
        pub maxs: FeatureVector,
    }

    impl MinMaxScaler {
        /// Fit on a feature matrix. Returns `None` for an empty matrix.
        pub fn fit(matrix: &[FeatureVector]) -> Option<Self> {
            let first = matrix.first()?;
            let mut mins = *first;
            let mut maxs = *first;
            for row in &matrix[1..] {
                for col in 0..FEATURE_COUNT {
                    mins[col] = mins[col].min(row[col]);
                    maxs[col] = maxs[col].max(row[col]);
                }
            }
            Some(Self { mins, maxs })
        }

        fn scale(&self, col: usize) -> f64 {
            let range = self.maxs[col] - self.mins[col];
            if range == 0.0 {
                1.0
            } else {
                range
            }
        }

        /// Indices of columns whose fitted min equals their max.
        pub fn degenerate_columns(&self) -> Vec<usize> {
            (0..FEATURE_COUNT)
                .filter(|&col| self.maxs[col] == self.mins[col])
                .collect()
        }

        pub fn transform_row(&self, row: &FeatureVector) -> FeatureVector {
            let mut out = [0.0; FEATURE_COUNT];
            for col in 0..FEATURE_COUNT {
                out[col] = (row[col] - self.mins[col]) / self.scale(col);
            }
            out
        }

        pub fn inverse_row(&self, row: &FeatureVector) -> FeatureVector {
            let mut out = [0.0; FEATURE_COUNT];
            for col in 0..FEATURE_COUNT {
                out[col] = row[col] * self.scale(col) + self.mins[col];
            }
            out
        }

        pub fn transform(&self, matrix: &[FeatureVector]) -> Vec<FeatureVector> {
            matrix.iter().map(|row| self.transform_row(row)).collect()
        }

        pub fn inverse_transform(&self, matrix: &[FeatureVector]) -> Vec<FeatureVector> {
            matrix.iter().map(|row| self.inverse_row(row)).collect()
        }
    }

}

/// Sliding windows over a feature matrix.
pub mod windows {
    use aqf_core::FeatureVector;

    /// Share of (window, target) pairs used for training; the rest is held out.
    pub const TRAIN_FRACTION: f64 = 0.9;

    /// Every window of `window` consecutive rows paired with the row after it.
    #[derive(Debug, Clone, PartialEq)]
    pub struct WindowSet {
        pub window: usize,
        pub inputs: Vec<Vec<FeatureVector>>,
        pub targets: Vec<FeatureVector>,
    }

    /// Build `matrix.len() - window` pairs in index order.
    ///
    /// Pair `i` has input `matrix[i..i + window]` and target `matrix[i + window]`.
    /// A matrix no longer than the window yields no pairs.
    pub fn make_windows(matrix: &[FeatureVector], window: usize) -> WindowSet {
        let count = if window == 0 {
            0
        } else {
            matrix.len().saturating_sub(window)
        };
        let mut inputs = Vec::with_capacity(count);
        let mut targets = Vec::with_capacity(count);
        for i in 0..count {
            inputs.push(matrix[i..i + window].to_vec());
            targets.push(matrix[i + window]);
        }
        WindowSet {
            window,
            inputs,
            targets,
        }
    }

    impl WindowSet {
        pub fn len(&self) -> usize {
            self.targets.len()
        }

        pub fn is_empty(&self) -> bool {
            self.targets.is_empty()
        }

        /// Number of leading pairs that form the training subset.
        ///
        /// `floor(len * fraction)`, but never zero while pairs exist.
        pub fn split_index(&self, fraction: f64) -> usize {
            if self.is_empty() {
                return 0;
            }
            let split = (self.len() as f64 * fraction).floor() as usize;
            split.clamp(1, self.len())
        }

        pub fn training(&self, fraction: f64) -> (&[Vec<FeatureVector>], &[FeatureVector]) {
            let split = self.split_index(fraction);
            (&self.inputs[..split], &self.targets[..split])
        }

        pub fn holdout(&self, fraction: f64) -> (&[Vec<FeatureVector>], &[FeatureVector]) {
            let split = self.split_index(fraction);
            (&self.inputs[split..], &self.targets[split..])
        }
    }

}

/// Loading readings into a scaled feature matrix.
pub mod pipeline {
    use crate::scaling::MinMaxScaler;
    use aqf_core::{FeatureVector, Reading};
    use chrono::NaiveDateTime;

    /// The scaled history plus what is needed to undo the scaling.
    #[derive(Debug, Clone)]
    pub struct Prepared {
        /// Scaled feature rows, oldest first.
        pub matrix: Vec<FeatureVector>,
        pub scaler: MinMaxScaler,
        /// Timestamp of the most recent reading.
        pub last_observed: NaiveDateTime,
    }

    /// Feature rows of `readings` in timestamp order, unscaled.
    pub fn feature_matrix(readings: &[Reading]) -> Vec<FeatureVector> {
        let mut sorted = readings.to_vec();
        sorted.sort_by_key(|r| r.timestamp());
        sorted.iter().map(|r| r.features()).collect()
    }

    /// Sort readings, select features and fit the scaler on the whole history.
    ///
    /// Returns `None` when there are no readings.
    pub fn prepare(readings: &[Reading]) -> Option<Prepared> {
        let last_observed = readings.iter().map(|r| r.timestamp()).max()?;
        let raw = feature_matrix(readings);
        let scaler = MinMaxScaler::fit(&raw)?;
        let degenerate = scaler.degenerate_columns();
        if !degenerate.is_empty() {
            log::debug!("constant feature columns {:?} scale to 0", degenerate);
        }
        Some(Prepared {
            matrix: scaler.transform(&raw),
            scaler,
            last_observed,
        })
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::{NaiveDate, NaiveTime};

        fn reading(hour: u32, aqi: u32) -> Reading {
            Reading {
                date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
                aqi,
                pm10: 10,
                pm2_5: 20,
                no2: hour,
                so2: 1,
                co: 200,
                o3: 50,
            }
        }

        #[test]
        fn test_prepare_sorts_and_reports_last_timestamp() {
            let readings = vec![reading(12, 5), reading(10, 1), reading(11, 3)];
            let prepared = prepare(&readings).unwrap();
            let aqi: Vec<f64> = prepared.matrix.iter().map(|row| row[0]).collect();
            assert_eq!(aqi, vec![0.0, 0.5, 1.0]);
            assert_eq!(prepared.last_observed.to_string(), "2024-05-01 12:00:00");
            assert_eq!(prepared.scaler.mins[0], 1.0);
            assert_eq!(prepared.scaler.maxs[0], 5.0);
        }

        #[test]
        fn test_prepare_empty_is_none() {
            assert!(prepare(&[]).is_none());
        }
    }
}
