/// One regression example for a per-action Q predictor: move the output at
/// `action` for input `features` toward `target`. Other outputs are untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct FitSample {
    pub features: Vec<f32>,
    pub action: usize,
    pub target: f32,
}

/// Differentiable mapping from dense state features to one Q-value per action.
///
/// Action indices refer to the owning learner's action alphabet.
pub trait FunctionApproximator {
    /// Opaque copy of the parameters, used to sync a target network.
    type Snapshot;

    /// Width of the output layer.
    fn num_actions(&self) -> usize;

    fn predict(&self, features: &[f32]) -> Vec<f32>;

    fn predict_batch(&self, batch: &[Vec<f32>]) -> Vec<Vec<f32>> {
        batch.iter().map(|features| self.predict(features)).collect()
    }

    /// One optimization step over the whole batch. Returns the batch loss.
    fn fit(&mut self, batch: &[FitSample]) -> f32;

    fn clone_parameters(&self) -> Self::Snapshot;

    fn load_parameters(&mut self, snapshot: Self::Snapshot);
}
