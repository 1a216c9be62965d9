use std::fs::File;
use std::io::Write;
use std::path::Path;

use json::{object, JsonValue};
use tracing::info;

use crate::error::{Error, Result};
use crate::model::history::History;
use crate::model::neural_net::NeuralNet;

/// The weights of the model as a JSON object.
/// The keys are e.g. W0, b0, W1, b1. The values are the row-major weights,
/// and `structure` holds the layer widths needed to reshape them
pub fn weights_json(model: &NeuralNet) -> JsonValue {
    let mut data = object! {};
    let mut structure = vec![model.input_width()];

    for (i, layer) in model.layers.iter().enumerate() {
        let w: Vec<f32> = layer.weights.iter().copied().collect();
        let b: Vec<f32> = layer.bias.iter().copied().collect();

        data[format!("W{}", i)] = w.into();
        data[format!("b{}", i)] = b.into();
        structure.push(layer.outputs());
    }

    data["structure"] = structure.into();
    data
}

/// Write the weights of the model in JSON format
pub fn write_weights(weight_path: &Path, model: &NeuralNet) -> Result<()> {
    let mut file = File::create(weight_path).map_err(|e| Error::io(weight_path, e))?;

    file.write_all(weights_json(model).dump().as_bytes())
        .map_err(|e| Error::io(weight_path, e))?;

    info!(path = %weight_path.display(), params = model.num_params(), "weights written");
    Ok(())
}

/// Write the metric history as CSV, one row per epoch
pub fn write_history(history_path: &Path, history: &History) -> Result<()> {
    let mut writer = csv::Writer::from_path(history_path)?;

    for record in history.records() {
        writer.serialize(record)?;
    }

    writer.flush().map_err(|e| Error::io(history_path, e))?;

    info!(path = %history_path.display(), epochs = history.epochs(), "history written");
    Ok(())
}
