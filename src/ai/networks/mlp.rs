use std::path::Path;

use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::DefaultRecorder;
use burn::tensor::TensorData;
use serde::{Deserialize, Serialize};

use crate::ai::approximator::{FitSample, FunctionApproximator};
use crate::ai::networks::{QNetwork, QNetworkConfig};
use crate::error::CheckpointError;

type InferBackend = NdArray<f32>;
type TrainBackend = Autodiff<InferBackend>;

/// Network shape and optimizer settings for [`MlpApproximator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpSettings {
    pub hidden_dim: usize,
    pub learning_rate: f64,
}

impl Default for MlpSettings {
    fn default() -> Self {
        MlpSettings {
            hidden_dim: 64,
            learning_rate: 1e-3,
        }
    }
}

/// [`FunctionApproximator`] backed by a burn MLP trained with Adam on the CPU.
pub struct MlpApproximator {
    network: QNetwork<TrainBackend>,
    optimizer: OptimizerAdaptor<Adam, QNetwork<TrainBackend>, TrainBackend>,
    config: QNetworkConfig,
    learning_rate: f64,
    device: <TrainBackend as Backend>::Device,
}

impl MlpApproximator {
    pub fn new(input_dim: usize, num_actions: usize, settings: &MlpSettings) -> Self {
        let device = Default::default();
        let config =
            QNetworkConfig::new(input_dim, num_actions).with_hidden_dim(settings.hidden_dim);
        MlpApproximator {
            network: config.init(&device),
            optimizer: AdamConfig::new().init(),
            config,
            learning_rate: settings.learning_rate,
            device,
        }
    }

    fn input_tensor<B: Backend>(rows: &[&[f32]], dim: usize, device: &B::Device) -> Tensor<B, 2> {
        let mut flat = Vec::with_capacity(rows.len() * dim);
        for row in rows {
            flat.extend_from_slice(row);
        }
        Tensor::<B, 1>::from_data(TensorData::from(flat.as_slice()), device)
            .reshape([rows.len() as i32, dim as i32])
    }

    /// Save network weights to `dir/<name>`.
    pub fn save_file(&self, dir: &Path, name: &str) -> Result<(), CheckpointError> {
        let recorder = DefaultRecorder::default();
        self.network
            .clone()
            .valid()
            .save_file(dir.join(name), &recorder)
            .map_err(|e| CheckpointError::ModelSave(e.to_string()))
    }

    /// Load network weights written by [`MlpApproximator::save_file`].
    pub fn load_file(&mut self, dir: &Path, name: &str) -> Result<(), CheckpointError> {
        let recorder = DefaultRecorder::default();
        let network: QNetwork<TrainBackend> = self
            .config
            .init(&self.device)
            .load_file(dir.join(name), &recorder, &self.device)
            .map_err(|e| CheckpointError::ModelLoad(e.to_string()))?;
        self.network = network;
        Ok(())
    }
}

impl FunctionApproximator for MlpApproximator {
    type Snapshot = QNetwork<TrainBackend>;

    fn num_actions(&self) -> usize {
        self.config.num_actions
    }

    fn predict(&self, features: &[f32]) -> Vec<f32> {
        self.predict_batch(&[features.to_vec()])
            .pop()
            .unwrap_or_default()
    }

    fn predict_batch(&self, batch: &[Vec<f32>]) -> Vec<Vec<f32>> {
        if batch.is_empty() {
            return Vec::new();
        }
        let rows: Vec<&[f32]> = batch.iter().map(Vec::as_slice).collect();
        let input =
            Self::input_tensor::<InferBackend>(&rows, self.config.input_dim, &self.device);
        let output = self.network.valid().forward(input);
        let flat: Vec<f32> = output.into_data().iter::<f32>().collect();
        flat.chunks(self.config.num_actions)
            .map(<[f32]>::to_vec)
            .collect()
    }

    fn fit(&mut self, batch: &[FitSample]) -> f32 {
        if batch.is_empty() {
            return 0.0;
        }
        let batch_size = batch.len();
        let num_actions = self.config.num_actions;

        let rows: Vec<&[f32]> = batch.iter().map(|s| s.features.as_slice()).collect();
        let input =
            Self::input_tensor::<TrainBackend>(&rows, self.config.input_dim, &self.device);
        let q_all = self.network.forward(input);

        // One-hot mask [B, A] picks Q(s, a) for the taken action
        let mut mask_data = vec![0.0f32; batch_size * num_actions];
        for (i, sample) in batch.iter().enumerate() {
            mask_data[i * num_actions + sample.action] = 1.0;
        }
        let mask = Tensor::<TrainBackend, 1>::from_data(
            TensorData::from(mask_data.as_slice()),
            &self.device,
        )
        .reshape([batch_size as i32, num_actions as i32]);
        let q_taken = (q_all * mask).sum_dim(1);

        let target_data: Vec<f32> = batch.iter().map(|s| s.target).collect();
        let targets = Tensor::<TrainBackend, 1>::from_data(
            TensorData::from(target_data.as_slice()),
            &self.device,
        )
        .reshape([batch_size as i32, 1]);

        let diff = q_taken - targets;
        let loss = (diff.clone() * diff).mean();
        let loss_val = loss
            .clone()
            .into_data()
            .iter::<f32>()
            .next()
            .unwrap_or(f32::NAN);

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.network);
        self.network = self
            .optimizer
            .step(self.learning_rate, self.network.clone(), grads);

        loss_val
    }

    fn clone_parameters(&self) -> Self::Snapshot {
        self.network.clone()
    }

    fn load_parameters(&mut self, snapshot: Self::Snapshot) {
        self.network = snapshot;
    }
}
