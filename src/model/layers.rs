use ndarray::{Array, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::distributions::{Bernoulli, Distribution, Uniform};
use rand::Rng;
use serde::Deserialize;

#[derive(clap::ValueEnum, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivationFunction {
    #[value(name = "relu")]
    ReLU,
    Sigmoid,
    Tanh,
    Linear,
    #[value(name = "leakyrelu")]
    LeakyReLU,
}

#[derive(clap::ValueEnum, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InitMethod {
    Default,
    Xavier,
}

pub fn activation(name: ActivationFunction, z: f32) -> f32 {
    match name {
        ActivationFunction::ReLU => z.max(0f32),
        ActivationFunction::Sigmoid => (1f32 + (-z).exp()).recip(),
        ActivationFunction::Tanh => z.tanh(),
        ActivationFunction::Linear => z,
        ActivationFunction::LeakyReLU => z.max(0.01 * z),
    }
}

pub fn delta_activation(name: ActivationFunction, z: f32) -> f32 {
    match name {
        ActivationFunction::ReLU => {
            if z > 0f32 {
                1f32
            } else {
                0f32
            }
        }
        ActivationFunction::Sigmoid => activation(name, z) * (1f32 - activation(name, z)),
        ActivationFunction::Tanh => 1f32 - activation(name, z) * activation(name, z),
        ActivationFunction::Linear => 1f32,
        ActivationFunction::LeakyReLU => {
            if z > 0f32 {
                1f32
            } else {
                0.01f32
            }
        }
    }
}

/// A fully-connected layer computing `x W + b`
#[derive(Clone, Debug)]
pub struct Dense {
    pub weights: Array2<f32>, // (inputs, outputs)
    pub bias: Array1<f32>,
}

/// Gradients of a loss with respect to a dense layer and its input
pub struct DenseGrads {
    pub input: Array2<f32>,
    pub weights: Array2<f32>,
    pub bias: Array1<f32>,
}

impl Dense {
    pub fn new<R: Rng + ?Sized>(
        inputs: usize,
        outputs: usize,
        init: InitMethod,
        rng: &mut R,
    ) -> Dense {
        match init {
            // Glorot uniform, what Keras uses for Dense layers
            InitMethod::Xavier => {
                let limit = (6f32 / (inputs + outputs) as f32).sqrt();
                let dist = Uniform::new_inclusive(-limit, limit);
                Dense {
                    weights: Array::from_shape_simple_fn((inputs, outputs), || dist.sample(rng)),
                    bias: Array1::zeros(outputs),
                }
            }
            InitMethod::Default => {
                let dist = Uniform::new(-0.3f32, 0.3f32);
                Dense {
                    weights: Array::from_shape_simple_fn((inputs, outputs), || dist.sample(rng)),
                    bias: Array1::ones(outputs),
                }
            }
        }
    }

    pub fn inputs(&self) -> usize {
        self.weights.nrows()
    }

    pub fn outputs(&self) -> usize {
        self.weights.ncols()
    }

    pub fn num_params(&self) -> usize {
        self.weights.len() + self.bias.len()
    }

    pub fn forward(&self, inputs: &ArrayView2<f32>) -> Array2<f32> {
        inputs.dot(&self.weights) + &self.bias
    }

    /// `grad` is the gradient of the loss WRT this layer's output, already averaged over the batch
    pub fn backward(&self, inputs: &ArrayView2<f32>, grad: &ArrayView2<f32>) -> DenseGrads {
        DenseGrads {
            input: grad.dot(&self.weights.t()),
            weights: inputs.t().dot(grad),
            bias: grad.sum_axis(Axis(0)),
        }
    }
}

/// Inverted dropout: zero each unit with probability `rate` while training
/// and scale the survivors by `1 / (1 - rate)`
#[derive(Clone, Copy, Debug)]
pub struct Dropout {
    rate: f64,
}

impl Dropout {
    /// `rate` has to be in [0, 1)
    pub fn new(rate: f64) -> Option<Dropout> {
        if (0.0..1.0).contains(&rate) {
            Some(Dropout { rate })
        } else {
            None
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Sample a keep mask, already scaled, with the given shape
    pub fn mask<R: Rng + ?Sized>(&self, shape: (usize, usize), rng: &mut R) -> Array2<f32> {
        if self.rate == 0.0 {
            return Array2::ones(shape);
        }

        let keep = Bernoulli::new(1.0 - self.rate).expect("rate checked in Dropout::new");
        let scale = (1.0 / (1.0 - self.rate)) as f32;

        Array::from_shape_simple_fn(shape, || if keep.sample(rng) { scale } else { 0f32 })
    }
}

/// Softmax function - Convert scores into a probability distribution
pub fn softmax(scores: ArrayView1<f32>) -> Array1<f32> {
    let max = scores.fold(f32::NEG_INFINITY, |m, &x| m.max(x));
    // Shift by the max so exp never overflows
    let shifted = scores.mapv(|x| (x - max).exp());
    let sum = shifted.sum();

    shifted / sum
}

/// Row-wise softmax of a batch of scores
pub fn softmax_rows(scores: &ArrayView2<f32>) -> Array2<f32> {
    let mut probs = Array2::zeros(scores.raw_dim());

    for (mut out, row) in probs.axis_iter_mut(Axis(0)).zip(scores.axis_iter(Axis(0))) {
        out.assign(&softmax(row));
    }

    probs
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn softmax_is_a_distribution() {
        let probs = softmax(array![1000.0, 1001.0, 999.0].view());

        assert!((probs.sum() - 1.0).abs() < 1e-6);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!(probs[1] > probs[0] && probs[0] > probs[2]);
    }

    #[test]
    fn xavier_weights_stay_within_limit() {
        let mut rng = StdRng::seed_from_u64(0);
        let layer = Dense::new(784, 1024, InitMethod::Xavier, &mut rng);
        let limit = (6f32 / (784 + 1024) as f32).sqrt();

        assert_eq!(layer.num_params(), 784 * 1024 + 1024);
        assert!(layer.weights.iter().all(|w| w.abs() <= limit));
        assert!(layer.bias.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn dense_backward_matches_finite_differences() {
        let mut rng = StdRng::seed_from_u64(3);
        let layer = Dense::new(3, 2, InitMethod::Default, &mut rng);
        let x = array![[0.5f32, -1.0, 2.0], [1.5, 0.25, -0.75]];
        // loss = sum of outputs, so dL/dout is all ones
        let grad = Array2::ones((2, 2));

        let grads = layer.backward(&x.view(), &grad.view());

        let eps = 1e-2f32;
        let mut bumped = layer.clone();
        bumped.weights[[1, 0]] += eps;
        let numeric = (bumped.forward(&x.view()).sum() - layer.forward(&x.view()).sum()) / eps;

        assert!((numeric - grads.weights[[1, 0]]).abs() < 1e-2);
        assert_eq!(grads.bias, array![2f32, 2.0]);
        assert_eq!(grads.input.dim(), (2, 3));
    }

    #[test]
    fn dropout_mask_keeps_expected_fraction() {
        let mut rng = StdRng::seed_from_u64(11);
        let dropout = Dropout::new(0.4).unwrap();

        let mask = dropout.mask((200, 200), &mut rng);
        let kept = mask.iter().filter(|&&m| m > 0.0).count() as f64 / mask.len() as f64;

        assert!((kept - 0.6).abs() < 0.02);
        assert!(mask.iter().all(|&m| m == 0.0 || (m - 1.0 / 0.6).abs() < 1e-6));
    }

    #[test]
    fn dropout_rate_must_be_below_one() {
        assert!(Dropout::new(1.0).is_none());
        assert!(Dropout::new(-0.1).is_none());
        assert!(Dropout::new(0.0).is_some());
    }

    #[test]
    fn relu_derivative_is_a_step() {
        assert_eq!(delta_activation(ActivationFunction::ReLU, -2.0), 0.0);
        assert_eq!(delta_activation(ActivationFunction::ReLU, 2.0), 1.0);
        assert_eq!(activation(ActivationFunction::ReLU, -2.0), 0.0);
    }
}
