use ndarray::{Array2, ArrayView2};
use rand::Rng;

use crate::preprocess::Features;

pub mod history;
pub mod layers;
pub mod loss;
pub mod neural_net;
pub mod optim;

pub use history::History;

/// Loss and accuracy of a model over a labelled set
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluation {
    pub loss: f64,
    pub accuracy: f64,
}

pub trait Model {
    fn fit<R: Rng + ?Sized>(
        &mut self,
        train: &Features,
        validation: Option<&Features>,
        rng: &mut R,
    ) -> History;
    fn evaluate(&self, inputs: &ArrayView2<f32>, target: &ArrayView2<f32>) -> Evaluation;
    fn predict(&self, inputs: &ArrayView2<f32>) -> Array2<f32>;

    /// Evaluate a whole feature set; `None` when it holds no rows
    fn evaluate_features(&self, features: &Features) -> Option<Evaluation> {
        if features.is_empty() {
            return None;
        }
        Some(self.evaluate(&features.x.view(), &features.y.view()))
    }
}
