use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;

/// Fully connected Q-network.
///
/// ```text
/// Input:  [batch, input_dim]
/// FC1:    input_dim -> hidden_dim, ReLU
/// FC2:    hidden_dim -> hidden_dim, ReLU
/// FC3:    hidden_dim -> num_actions  (one Q-value per action)
/// ```
#[derive(Module, Debug)]
pub struct QNetwork<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
    relu: Relu,
}

#[derive(Config, Debug)]
pub struct QNetworkConfig {
    pub input_dim: usize,
    pub num_actions: usize,
    #[config(default = 64)]
    pub hidden_dim: usize,
}

impl QNetworkConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> QNetwork<B> {
        QNetwork {
            fc1: LinearConfig::new(self.input_dim, self.hidden_dim).init(device),
            fc2: LinearConfig::new(self.hidden_dim, self.hidden_dim).init(device),
            fc3: LinearConfig::new(self.hidden_dim, self.num_actions).init(device),
            relu: Relu::new(),
        }
    }
}

impl<B: Backend> QNetwork<B> {
    /// Forward pass: `[batch, input_dim]` -> `[batch, num_actions]`.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.relu.forward(self.fc1.forward(input));
        let x = self.relu.forward(self.fc2.forward(x));
        self.fc3.forward(x)
    }
}
