use ndarray::{Array, Dimension, Ix1, Ix2, Zip};

use super::layers::{Dense, DenseGrads};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdamConfig {
    pub learning_rate: f32,
    pub beta_1: f32,
    pub beta_2: f32,
    /// Keeps the update finite when the second moment is ~0
    pub epsilon: f32,
}

impl Default for AdamConfig {
    fn default() -> Self {
        AdamConfig {
            learning_rate: 0.001,
            beta_1: 0.9,
            beta_2: 0.999,
            epsilon: 1e-7,
        }
    }
}

struct Moments<D: Dimension> {
    moment_1: Array<f32, D>,
    moment_2: Array<f32, D>,
}

impl<D: Dimension> Moments<D> {
    fn zeros_like(param: &Array<f32, D>) -> Self {
        Moments {
            moment_1: Array::zeros(param.raw_dim()),
            moment_2: Array::zeros(param.raw_dim()),
        }
    }
}

/// Adam optimizer as described in [Adam: A Method for Stochastic Optimization](https://arxiv.org/pdf/1412.6980.pdf).
/// One pair of moments is kept per weight matrix and per bias vector
pub struct Adam {
    config: AdamConfig,
    time: i32,
    state: Vec<(Moments<Ix2>, Moments<Ix1>)>,
}

impl Adam {
    pub fn new(config: AdamConfig) -> Adam {
        Adam {
            config,
            time: 0,
            state: vec![],
        }
    }

    /// Number of updates performed so far
    pub fn time(&self) -> i32 {
        self.time
    }

    /// Apply one update to every layer. `grads[i]` belongs to `layers[i]`
    pub fn step(&mut self, layers: &mut [Dense], grads: &[DenseGrads]) {
        assert_eq!(layers.len(), grads.len(), "one gradient per layer");

        if self.state.is_empty() {
            self.state = layers
                .iter()
                .map(|layer| {
                    (
                        Moments::zeros_like(&layer.weights),
                        Moments::zeros_like(&layer.bias),
                    )
                })
                .collect();
        }

        self.time += 1;
        let correction_1 = 1.0 - self.config.beta_1.powi(self.time);
        let correction_2 = 1.0 - self.config.beta_2.powi(self.time);

        let layer_states = layers.iter_mut().zip(grads).zip(self.state.iter_mut());
        for ((layer, grad), (w_state, b_state)) in layer_states {
            update::<Ix2>(
                &self.config,
                correction_1,
                correction_2,
                &mut layer.weights,
                &grad.weights,
                w_state,
            );
            update::<Ix1>(
                &self.config,
                correction_1,
                correction_2,
                &mut layer.bias,
                &grad.bias,
                b_state,
            );
        }
    }
}

fn update<D: Dimension>(
    config: &AdamConfig,
    correction_1: f32,
    correction_2: f32,
    param: &mut Array<f32, D>,
    grad: &Array<f32, D>,
    state: &mut Moments<D>,
) {
    let AdamConfig {
        learning_rate,
        beta_1,
        beta_2,
        epsilon,
    } = *config;

    Zip::from(param)
        .and(grad)
        .and(&mut state.moment_1)
        .and(&mut state.moment_2)
        .for_each(|theta, &g, m, v| {
            *m = beta_1 * *m + (1.0 - beta_1) * g;
            *v = beta_2 * *v + (1.0 - beta_2) * g * g;

            let m_hat = *m / correction_1;
            let v_hat = *v / correction_2;

            *theta -= learning_rate * m_hat / (v_hat.sqrt() + epsilon);
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn layer() -> Dense {
        Dense {
            weights: array![[1.0f32, -1.0], [0.5, 0.0]],
            bias: array![0.0f32, 0.0],
        }
    }

    #[test]
    fn first_step_moves_each_param_by_learning_rate() {
        let mut layers = vec![layer()];
        let grads = vec![DenseGrads {
            input: Array2::zeros((1, 2)),
            weights: array![[2.0f32, -3.0], [0.5, 0.0]],
            bias: array![1.0f32, -1.0],
        }];
        let mut adam = Adam::new(AdamConfig::default());

        adam.step(&mut layers, &grads);

        // With bias correction the first update is lr * sign(g)
        let w = &layers[0].weights;
        assert!((w[[0, 0]] - (1.0 - 0.001)).abs() < 1e-5);
        assert!((w[[0, 1]] - (-1.0 + 0.001)).abs() < 1e-5);
        assert!((w[[1, 0]] - (0.5 - 0.001)).abs() < 1e-5);
        assert_eq!(w[[1, 1]], 0.0);
        assert!((layers[0].bias[0] + 0.001).abs() < 1e-5);
        assert_eq!(adam.time(), 1);
    }

    #[test]
    fn repeated_steps_keep_descending() {
        // minimise (w - 3)^2 for a single weight
        let mut layers = vec![Dense {
            weights: array![[0.0f32]],
            bias: array![0.0f32],
        }];
        let mut adam = Adam::new(AdamConfig {
            learning_rate: 0.1,
            ..AdamConfig::default()
        });

        for _ in 0..500 {
            let w = layers[0].weights[[0, 0]];
            let grads = vec![DenseGrads {
                input: Array2::zeros((1, 1)),
                weights: array![[2.0 * (w - 3.0)]],
                bias: array![0.0f32],
            }];
            adam.step(&mut layers, &grads);
        }

        assert!((layers[0].weights[[0, 0]] - 3.0).abs() < 0.1);
    }
}
