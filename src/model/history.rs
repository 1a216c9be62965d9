use std::collections::BTreeMap;

use serde::Serialize;

pub const LOSS: &str = "loss";
pub const ACCURACY: &str = "accuracy";
pub const VAL_LOSS: &str = "val_loss";
pub const VAL_ACCURACY: &str = "val_accuracy";

/// Per-epoch metric values, keyed by metric name
#[derive(Serialize, Default, Debug, Clone)]
pub struct History {
    metrics: BTreeMap<String, Vec<f64>>,
}

/// One row of the history, as written to CSV
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EpochRecord {
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: Option<f64>,
    pub val_accuracy: Option<f64>,
}

impl History {
    pub fn new() -> History {
        History::default()
    }

    pub fn push(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    /// Number of completed epochs
    pub fn epochs(&self) -> usize {
        self.get(LOSS).map_or(0, |v| v.len())
    }

    pub fn records(&self) -> Vec<EpochRecord> {
        let at = |name: &str, epoch: usize| self.get(name).and_then(|v| v.get(epoch)).copied();

        (0..self.epochs())
            .map(|epoch| EpochRecord {
                epoch,
                loss: at(LOSS, epoch).unwrap_or(f64::NAN),
                accuracy: at(ACCURACY, epoch).unwrap_or(f64::NAN),
                val_loss: at(VAL_LOSS, epoch),
                val_accuracy: at(VAL_ACCURACY, epoch),
            })
            .collect()
    }
}
