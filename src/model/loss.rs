use ndarray::{ArrayView2, Axis, Zip};

use crate::preprocess::argmax;

const CLIP: f32 = 1e-7;

/// Mean categorical cross-entropy of a batch of probabilities against one-hot targets.
/// Probabilities are clipped to [1e-7, 1 - 1e-7] so a confident miss stays finite
pub fn cross_entropy(predictions: &ArrayView2<f32>, target: &ArrayView2<f32>) -> f64 {
    if predictions.nrows() == 0 {
        return 0f64;
    }

    let mut total = 0f64;
    Zip::from(predictions).and(target).for_each(|&p, &t| {
        if t != 0f32 {
            total -= t as f64 * (p.clamp(CLIP, 1f32 - CLIP) as f64).ln();
        }
    });

    total / predictions.nrows() as f64
}

/// Number of rows whose most probable class is the target class
pub fn correct(predictions: &ArrayView2<f32>, target: &ArrayView2<f32>) -> usize {
    predictions
        .axis_iter(Axis(0))
        .zip(target.axis_iter(Axis(0)))
        .filter(|(p, t)| argmax(p.view()) == argmax(t.view()))
        .count()
}

/// Fraction of rows classified correctly
pub fn accuracy(predictions: &ArrayView2<f32>, target: &ArrayView2<f32>) -> f64 {
    if predictions.nrows() == 0 {
        return 0f64;
    }

    correct(predictions, target) as f64 / predictions.nrows() as f64
}
