//! Two stacked LSTM layers feeding a linear head.
//!
//! Input is a batch of windows shaped `(batch, window, FEATURE_COUNT)` in
//! scaled space; output is the next feature vector per window, shaped
//! `(batch, FEATURE_COUNT)`.

use crate::error::{ForecastError, Result};
use aqf_core::{FeatureVector, FEATURE_COUNT};
use candle_core::{DType, Device, Tensor};
use candle_nn::{
    linear, lstm, AdamW, LSTMConfig, Linear, Module, Optimizer, ParamsAdamW, VarBuilder, VarMap,
    LSTM, RNN,
};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Layer widths of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub lstm_hidden: [usize; 2],
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            lstm_hidden: [64, 32],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Reshuffle the training pairs before every epoch.
    pub shuffle: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 16,
            learning_rate: 1e-3,
            shuffle: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrainingReport {
    pub epochs: usize,
    pub pairs: usize,
    /// Mean batch loss of the last epoch.
    pub final_loss: f64,
}

/// Anything that maps a window of feature vectors to the next one.
pub trait NextStep {
    fn predict(&self, window: &[FeatureVector]) -> Result<FeatureVector>;
}

pub struct SequenceModel {
    config: ModelConfig,
    varmap: VarMap,
    first: LSTM,
    second: LSTM,
    head: Linear,
    device: Device,
}

impl fmt::Debug for SequenceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceModel")
            .field("config", &self.config)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl SequenceModel {
    /// A freshly initialised, untrained model.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let [h1, h2] = config.lstm_hidden;
        let first = lstm(FEATURE_COUNT, h1, LSTMConfig::default(), vb.pp("lstm1"))?;
        let second = lstm(h1, h2, LSTMConfig::default(), vb.pp("lstm2"))?;
        let head = linear(h2, FEATURE_COUNT, vb.pp("head"))?;
        Ok(Self {
            config: *config,
            varmap,
            first,
            second,
            head,
            device,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let states = self.first.seq(xs)?;
        let hidden = self.first.states_to_tensor(&states)?;
        let states = self.second.seq(&hidden)?;
        let last = states
            .last()
            .ok_or_else(|| candle_core::Error::Msg("empty input window".to_string()))?;
        self.head.forward(last.h())
    }

    fn windows_tensor(&self, windows: &[&[FeatureVector]]) -> candle_core::Result<Tensor> {
        let steps = windows.first().map_or(0, |w| w.len());
        let data: Vec<f32> = windows
            .iter()
            .flat_map(|w| w.iter())
            .flat_map(|row| row.iter().map(|&v| v as f32))
            .collect();
        Tensor::from_vec(data, (windows.len(), steps, FEATURE_COUNT), &self.device)
    }

    fn rows_tensor(&self, rows: &[&FeatureVector]) -> candle_core::Result<Tensor> {
        let data: Vec<f32> = rows
            .iter()
            .flat_map(|row| row.iter().map(|&v| v as f32))
            .collect();
        Tensor::from_vec(data, (rows.len(), FEATURE_COUNT), &self.device)
    }

    fn predict_batch(&self, windows: &[&[FeatureVector]]) -> Result<Vec<FeatureVector>> {
        let xs = self.windows_tensor(windows)?;
        let out = self.forward(&xs)?.to_vec2::<f32>()?;
        Ok(out
            .into_iter()
            .map(|row| {
                let mut v = [0.0; FEATURE_COUNT];
                for (dst, src) in v.iter_mut().zip(row) {
                    *dst = src as f64;
                }
                v
            })
            .collect())
    }

    /// Minimise MSE between predicted and true next steps with Adam.
    pub fn fit(
        &mut self,
        inputs: &[Vec<FeatureVector>],
        targets: &[FeatureVector],
        config: &TrainingConfig,
    ) -> Result<TrainingReport> {
        if inputs.is_empty() || inputs.len() != targets.len() {
            return Err(ForecastError::EmptyTrainingSet);
        }
        let params = ParamsAdamW {
            lr: config.learning_rate,
            weight_decay: 0.0,
            ..Default::default()
        };
        let mut opt = AdamW::new(self.varmap.all_vars(), params)?;
        let mut order: Vec<usize> = (0..inputs.len()).collect();
        let mut rng = rand::thread_rng();
        let mut final_loss = f64::NAN;

        for epoch in 1..=config.epochs {
            if config.shuffle {
                order.shuffle(&mut rng);
            }
            let mut total = 0.0;
            let mut batches = 0usize;
            for chunk in order.chunks(config.batch_size.max(1)) {
                let windows: Vec<&[FeatureVector]> =
                    chunk.iter().map(|&i| inputs[i].as_slice()).collect();
                let rows: Vec<&FeatureVector> = chunk.iter().map(|&i| &targets[i]).collect();
                let xs = self.windows_tensor(&windows)?;
                let ys = self.rows_tensor(&rows)?;
                let loss = candle_nn::loss::mse(&self.forward(&xs)?, &ys)?;
                opt.backward_step(&loss)?;
                total += loss.to_scalar::<f32>()? as f64;
                batches += 1;
            }
            final_loss = total / batches as f64;
            log::debug!("epoch {}/{}: loss {:.6}", epoch, config.epochs, final_loss);
        }

        Ok(TrainingReport {
            epochs: config.epochs,
            pairs: inputs.len(),
            final_loss,
        })
    }

    /// Mean squared error over `inputs`/`targets`, in scaled space.
    pub fn evaluate(&self, inputs: &[Vec<FeatureVector>], targets: &[FeatureVector]) -> Result<f64> {
        if inputs.is_empty() || inputs.len() != targets.len() {
            return Err(ForecastError::EmptyTrainingSet);
        }
        let mut squared = 0.0;
        for (chunk_x, chunk_y) in inputs.chunks(64).zip(targets.chunks(64)) {
            let windows: Vec<&[FeatureVector]> = chunk_x.iter().map(|w| w.as_slice()).collect();
            let predicted = self.predict_batch(&windows)?;
            for (p, t) in predicted.iter().zip(chunk_y) {
                squared += p
                    .iter()
                    .zip(t)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>();
            }
        }
        Ok(squared / (inputs.len() * FEATURE_COUNT) as f64)
    }

    /// Write the weights as safetensors.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.varmap.save(path)?;
        Ok(())
    }

    /// Build a model with `config` and overwrite its weights from `path`.
    pub fn load(config: &ModelConfig, path: impl AsRef<Path>) -> Result<Self> {
        let mut model = Self::new(config)?;
        model.varmap.load(path)?;
        Ok(model)
    }
}

impl NextStep for SequenceModel {
    fn predict(&self, window: &[FeatureVector]) -> Result<FeatureVector> {
        let mut out = self.predict_batch(&[window])?;
        out.pop()
            .ok_or_else(|| ForecastError::Model(candle_core::Error::Msg("empty prediction".into())))
    }
}
