mod mlp;
mod q_network;

pub use mlp::{MlpApproximator, MlpSettings};
pub use q_network::{QNetwork, QNetworkConfig};
