use crate::error::{Error, Result};
use crate::preprocess::{argmax, Features};
use ndarray::{s, Array2, ArrayView1, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use super::history::{History, ACCURACY, LOSS, VAL_ACCURACY, VAL_LOSS};
use super::layers::{
    activation, delta_activation, softmax_rows, ActivationFunction, Dense, Dropout, InitMethod,
};
use super::loss::{correct, cross_entropy};
use super::optim::{Adam, AdamConfig};
use super::{Evaluation, Model};

/// Hyperparameters of a network and its training run
#[derive(Clone, Debug, PartialEq)]
pub struct NetConfig {
    pub layer_structure: Vec<usize>, // e.g. [784, 1024, 10]
    pub activation_function: ActivationFunction,
    pub init_method: InitMethod,
    pub dropout: f64, // applied after every hidden layer
    pub num_epochs: usize,
    pub batch_size: usize,
    pub optimizer: AdamConfig,
}

impl Default for NetConfig {
    fn default() -> Self {
        NetConfig {
            layer_structure: vec![784, 1024, 10],
            activation_function: ActivationFunction::ReLU,
            init_method: InitMethod::Xavier,
            dropout: 0.4,
            num_epochs: 10,
            batch_size: 256,
            optimizer: AdamConfig::default(),
        }
    }
}

/// Represents a neural net: dense layers with an activation and dropout on
/// every hidden layer, and a softmax on the output layer
pub struct NeuralNet {
    pub layers: Vec<Dense>,
    pub num_epochs: usize, // Training hyperparams
    pub batch_size: usize,
    pub activation_function: ActivationFunction,
    pub dropout: Dropout,
    optimizer: Adam,
}

// What a training forward pass keeps around for backprop
struct Pass {
    hidden: Vec<Array2<f32>>, // the input of every layer, hidden[0] is the batch itself
    hidden_linear: Vec<Array2<f32>>, // non-activated outputs of the hidden layers
    masks: Vec<Array2<f32>>,
    scores: Array2<f32>,
}

impl NeuralNet {
    /// Construct a new neural net according to the specified hyperparams
    pub fn new<R: Rng + ?Sized>(config: &NetConfig, rng: &mut R) -> Result<NeuralNet> {
        let structure = &config.layer_structure;
        if structure.len() < 2 {
            return Err(Error::Config(format!(
                "a network needs an input and an output width, got {:?}",
                structure
            )));
        }
        if structure.contains(&0) {
            return Err(Error::Config(format!(
                "layer widths must be non-zero, got {:?}",
                structure
            )));
        }
        if config.batch_size == 0 {
            return Err(Error::Config("batch size must be non-zero".to_string()));
        }
        let dropout = Dropout::new(config.dropout).ok_or_else(|| {
            Error::Config(format!("dropout rate {} is not in [0, 1)", config.dropout))
        })?;

        let layers = structure
            .windows(2)
            .map(|pair| Dense::new(pair[0], pair[1], config.init_method, rng))
            .collect();

        Ok(NeuralNet {
            layers,
            num_epochs: config.num_epochs,
            batch_size: config.batch_size,
            activation_function: config.activation_function,
            dropout,
            optimizer: Adam::new(config.optimizer),
        })
    }

    pub fn num_params(&self) -> usize {
        self.layers.iter().map(Dense::num_params).sum()
    }

    pub fn input_width(&self) -> usize {
        self.layers[0].inputs()
    }

    /// A table of the layers, their output shapes and parameter counts
    pub fn summary(&self) -> String {
        let rule = "_".repeat(65);
        let double = "=".repeat(65);
        let mut rows = vec![];
        let last = self.layers.len() - 1;

        for (idx, layer) in self.layers.iter().enumerate() {
            let name = match idx {
                0 => "dense".to_string(),
                _ => format!("dense_{}", idx),
            };
            rows.push((format!("{} (Dense)", name), layer.outputs(), layer.num_params()));

            if idx != last && self.dropout.rate() > 0.0 {
                let name = match idx {
                    0 => "dropout".to_string(),
                    _ => format!("dropout_{}", idx),
                };
                rows.push((format!("{} (Dropout)", name), layer.outputs(), 0));
            }
        }

        let mut out = String::from("Model: \"sequential\"\n");
        out += &format!("{}\n", rule);
        out += &format!(" {:<28}{:<26}{}\n", "Layer (type)", "Output Shape", "Param #");
        out += &format!("{}\n", double);
        for (name, width, params) in rows {
            out += &format!(" {:<28}{:<26}{}\n", name, format!("(None, {})", width), params);
        }
        out += &format!("{}\n", double);
        out += &format!("Total params: {}\n", self.num_params());
        out += &format!("Trainable params: {}\n", self.num_params());
        out += "Non-trainable params: 0\n";
        out += &rule;

        out
    }

    // Perform a forward pass of the network on some input, sampling dropout masks
    fn forward_train<R: Rng + ?Sized>(&self, inputs: &ArrayView2<f32>, rng: &mut R) -> Pass {
        let mut hidden = vec![inputs.to_owned()];
        let mut hidden_linear = vec![];
        let mut masks = vec![];
        let last = self.layers.len() - 1;

        for layer in &self.layers[..last] {
            let lin_output = layer.forward(&hidden[hidden.len() - 1].view());
            let mask = self.dropout.mask(lin_output.dim(), rng);
            let activated = lin_output.mapv(|x| activation(self.activation_function, x)) * &mask;

            hidden.push(activated);
            hidden_linear.push(lin_output);
            masks.push(mask);
        }

        let scores = self.layers[last].forward(&hidden[last].view());

        Pass {
            hidden,
            hidden_linear,
            masks,
            scores,
        }
    }

    // The output layer scores, without dropout
    fn scores(&self, inputs: &ArrayView2<f32>) -> Array2<f32> {
        let last = self.layers.len() - 1;
        let mut output = inputs.to_owned();

        for layer in &self.layers[..last] {
            output = layer
                .forward(&output.view())
                .mapv_into(|x| activation(self.activation_function, x));
        }

        self.layers[last].forward(&output.view())
    }

    /// Calculate the gradients using backprop and perform an optimizer step.
    /// `grad` is the gradient of the loss WRT the output scores
    fn backward_and_update(&mut self, pass: Pass, grad: Array2<f32>) {
        let Pass {
            hidden,
            hidden_linear,
            masks,
            ..
        } = pass;
        let last = self.layers.len() - 1;
        let mut grads = Vec::with_capacity(self.layers.len());
        let mut grad_help = grad;

        for idx in (0..self.layers.len()).rev() {
            // Hidden layers: undo the dropout scaling and the activation
            if idx != last {
                let step_mat =
                    hidden_linear[idx].mapv(|x| delta_activation(self.activation_function, x));
                grad_help = grad_help * &masks[idx] * step_mat;
            }

            let mut layer_grads = self.layers[idx].backward(&hidden[idx].view(), &grad_help.view());
            grad_help = std::mem::take(&mut layer_grads.input);
            grads.push(layer_grads);
        }

        grads.reverse();
        self.optimizer.step(&mut self.layers, &grads);
    }

    fn train_batch<R: Rng + ?Sized>(
        &mut self,
        input_batch: &ArrayView2<f32>,
        target_batch: &ArrayView2<f32>,
        rng: &mut R,
    ) -> (f64, usize) {
        let pass = self.forward_train(input_batch, rng);
        let predictions = softmax_rows(&pass.scores.view());

        let loss = cross_entropy(&predictions.view(), target_batch);
        let hits = correct(&predictions.view(), target_batch);

        // Softmax + cross-entropy gradient, averaged over the batch
        let grad = (predictions - target_batch) / input_batch.nrows() as f32;
        self.backward_and_update(pass, grad);

        (loss, hits)
    }

    /// Most probable class of a single flattened image
    pub fn predict_class(&self, image: ArrayView1<f32>) -> usize {
        let batch = image.insert_axis(Axis(0));
        let probs = self.predict(&batch);
        argmax(probs.row(0))
    }

    pub fn optimizer(&self) -> &Adam {
        &self.optimizer
    }
}

impl Model for NeuralNet {
    /// Fit the model to the training features, shuffling every epoch.
    /// Returns the per-epoch history of loss and accuracy (used for plotting)
    fn fit<R: Rng + ?Sized>(
        &mut self,
        train: &Features,
        validation: Option<&Features>,
        rng: &mut R,
    ) -> History {
        let mut history = History::new();
        let mut order: Vec<usize> = (0..train.len()).collect();

        for num_epoch in 0..self.num_epochs {
            order.shuffle(rng);

            let mut loss_sum = 0f64;
            let mut hits = 0usize;

            // Get a batch of instances and their targets
            for (batch_idx, chunk) in order.chunks(self.batch_size).enumerate() {
                let input_batch = train.x.select(Axis(0), chunk);
                let target_batch = train.y.select(Axis(0), chunk);

                let (loss, batch_hits) =
                    self.train_batch(&input_batch.view(), &target_batch.view(), rng);
                debug!(epoch = num_epoch + 1, batch = batch_idx, loss, "batch done");

                loss_sum += loss * chunk.len() as f64;
                hits += batch_hits;
            }

            let seen = train.len().max(1) as f64;
            let loss = loss_sum / seen;
            let accuracy = hits as f64 / seen;
            history.push(LOSS, loss);
            history.push(ACCURACY, accuracy);

            let mut line = format!(
                "Epoch {}/{} - loss: {:.4} - accuracy: {:.4}",
                num_epoch + 1,
                self.num_epochs,
                loss,
                accuracy
            );

            if let Some(validation) = validation {
                let eval = self.evaluate(&validation.x.view(), &validation.y.view());
                history.push(VAL_LOSS, eval.loss);
                history.push(VAL_ACCURACY, eval.accuracy);
                line += &format!(
                    " - val_loss: {:.4} - val_accuracy: {:.4}",
                    eval.loss, eval.accuracy
                );
            }

            info!(epoch = num_epoch + 1, loss, accuracy, "epoch finished");
            println!("{}", line);
        }

        history
    }

    /// Loss and accuracy over a labelled set, in batches and without dropout
    fn evaluate(&self, inputs: &ArrayView2<f32>, target: &ArrayView2<f32>) -> Evaluation {
        let mut loss_sum = 0f64;
        let mut hits = 0usize;

        for (input_batch, target_batch) in inputs
            .axis_chunks_iter(Axis(0), self.batch_size)
            .zip(target.axis_chunks_iter(Axis(0), self.batch_size))
        {
            let predictions = self.predict(&input_batch);
            loss_sum +=
                cross_entropy(&predictions.view(), &target_batch) * input_batch.nrows() as f64;
            hits += correct(&predictions.view(), &target_batch);
        }

        let n = inputs.nrows().max(1) as f64;

        Evaluation {
            loss: loss_sum / n,
            accuracy: hits as f64 / n,
        }
    }

    /// Predict the probabities for a set of instances - each instance is a row in "inputs"
    fn predict(&self, inputs: &ArrayView2<f32>) -> Array2<f32> {
        let outputs = self.layers[self.layers.len() - 1].outputs();
        let mut predictions = Array2::zeros((inputs.nrows(), outputs));

        for (idx, input_batch) in inputs.axis_chunks_iter(Axis(0), self.batch_size).enumerate() {
            let start = idx * self.batch_size;
            let end = start + input_batch.nrows();
            let probs = softmax_rows(&self.scores(&input_batch).view());

            predictions.slice_mut(s![start..end, ..]).assign(&probs);
        }

        predictions
    }
}
