use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::layers::{ActivationFunction, InitMethod};
use crate::model::neural_net::NetConfig;
use crate::model::optim::AdamConfig;
use crate::parsing::{DataFormat, IMAGE_COLS, IMAGE_ROWS, NUM_CLASSES};

/// Run settings as written in a YAML file or collected from the command line.
/// Every field is optional; unset fields fall back to the defaults of `Settings`
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TrainConfig {
    pub data_dir: Option<PathBuf>,
    pub format: Option<DataFormat>,
    /// Widths of the hidden layers
    pub hidden: Option<Vec<usize>>,
    pub dropout: Option<f64>,
    pub learning_rate: Option<f32>,
    pub num_epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub validation_size: Option<usize>,
    pub seed: Option<u64>,
    pub activation_function: Option<ActivationFunction>,
    pub initialization: Option<InitMethod>,
    pub preview_index: Option<usize>,
    pub predict_index: Option<usize>,
    pub weight_path: Option<PathBuf>,
    pub history_path: Option<PathBuf>,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub format: DataFormat,
    pub net: NetConfig,
    pub validation_size: usize,
    pub seed: u64,
    pub preview_index: usize,
    pub predict_index: usize,
    pub weight_path: Option<PathBuf>,
    pub history_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data_dir: PathBuf::from("data"),
            format: DataFormat::Idx,
            net: NetConfig::default(),
            validation_size: 10_000,
            seed: 42,
            preview_index: 10,
            predict_index: 40,
            weight_path: None,
            history_path: None,
        }
    }
}

impl TrainConfig {
    pub fn from_yaml(contents: &str) -> Result<TrainConfig> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<TrainConfig> {
        let contents = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        TrainConfig::from_yaml(&contents)
    }

    // merge configs where the second overwrites the first
    pub fn merge(self, other: Self) -> Self {
        Self {
            data_dir: other.data_dir.or(self.data_dir),
            format: other.format.or(self.format),
            hidden: other.hidden.or(self.hidden),
            dropout: other.dropout.or(self.dropout),
            learning_rate: other.learning_rate.or(self.learning_rate),
            num_epochs: other.num_epochs.or(self.num_epochs),
            batch_size: other.batch_size.or(self.batch_size),
            validation_size: other.validation_size.or(self.validation_size),
            seed: other.seed.or(self.seed),
            activation_function: other.activation_function.or(self.activation_function),
            initialization: other.initialization.or(self.initialization),
            preview_index: other.preview_index.or(self.preview_index),
            predict_index: other.predict_index.or(self.predict_index),
            weight_path: other.weight_path.or(self.weight_path),
            history_path: other.history_path.or(self.history_path),
        }
    }

    /// Fill the gaps with defaults and check the result
    pub fn resolve(self) -> Result<Settings> {
        let defaults = Settings::default();
        let default_net = defaults.net;

        let hidden = self
            .hidden
            .unwrap_or_else(|| {
                default_net.layer_structure[1..default_net.layer_structure.len() - 1].to_vec()
            });
        let mut layer_structure = vec![IMAGE_ROWS * IMAGE_COLS];
        layer_structure.extend(hidden);
        layer_structure.push(NUM_CLASSES);

        let learning_rate = self.learning_rate.unwrap_or(default_net.optimizer.learning_rate);
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(Error::Config(format!(
                "learning rate must be positive, got {}",
                learning_rate
            )));
        }

        let dropout = self.dropout.unwrap_or(default_net.dropout);
        if !(0.0..1.0).contains(&dropout) {
            return Err(Error::Config(format!("dropout must be in [0, 1), got {}", dropout)));
        }

        let batch_size = self.batch_size.unwrap_or(default_net.batch_size);
        if batch_size == 0 {
            return Err(Error::Config("batch size must be non-zero".to_string()));
        }

        let net = NetConfig {
            layer_structure,
            activation_function: self
                .activation_function
                .unwrap_or(default_net.activation_function),
            init_method: self.initialization.unwrap_or(default_net.init_method),
            dropout,
            num_epochs: self.num_epochs.unwrap_or(default_net.num_epochs),
            batch_size,
            optimizer: AdamConfig {
                learning_rate,
                ..default_net.optimizer
            },
        };

        Ok(Settings {
            data_dir: self.data_dir.unwrap_or(defaults.data_dir),
            format: self.format.unwrap_or(defaults.format),
            net,
            validation_size: self.validation_size.unwrap_or(defaults.validation_size),
            seed: self.seed.unwrap_or(defaults.seed),
            preview_index: self.preview_index.unwrap_or(defaults.preview_index),
            predict_index: self.predict_index.unwrap_or(defaults.predict_index),
            weight_path: self.weight_path,
            history_path: self.history_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_resolves_to_the_classic_run() {
        let settings = TrainConfig::default().resolve().unwrap();

        assert_eq!(settings, Settings::default());
        assert_eq!(settings.net.layer_structure, vec![784, 1024, 10]);
        assert_eq!(settings.net.optimizer.learning_rate, 0.001);
        assert_eq!(settings.net.batch_size, 256);
        assert_eq!(settings.net.num_epochs, 10);
    }

    #[test]
    fn later_config_wins_the_merge() {
        let file = TrainConfig {
            num_epochs: Some(3),
            seed: Some(1),
            ..TrainConfig::default()
        };
        let cli = TrainConfig {
            num_epochs: Some(5),
            ..TrainConfig::default()
        };

        let merged = file.merge(cli);

        assert_eq!(merged.num_epochs, Some(5));
        assert_eq!(merged.seed, Some(1));
    }

    #[test]
    fn yaml_fields_map_onto_settings() {
        let yaml = "hidden: [128, 64]\nactivation_function: tanh\nformat: csv\ndropout: 0.1\n";

        let settings = TrainConfig::from_yaml(yaml).unwrap().resolve().unwrap();

        assert_eq!(settings.net.layer_structure, vec![784, 128, 64, 10]);
        assert_eq!(settings.net.activation_function, ActivationFunction::Tanh);
        assert_eq!(settings.format, DataFormat::Csv);
        assert_eq!(settings.net.dropout, 0.1);
    }

    #[test]
    fn unknown_yaml_keys_are_rejected() {
        assert!(matches!(TrainConfig::from_yaml("epochs: 3\n"), Err(Error::Yaml(_))));
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for config in [
            TrainConfig {
                learning_rate: Some(0.0),
                ..TrainConfig::default()
            },
            TrainConfig {
                dropout: Some(1.5),
                ..TrainConfig::default()
            },
            TrainConfig {
                batch_size: Some(0),
                ..TrainConfig::default()
            },
        ] {
            assert!(matches!(config.resolve(), Err(Error::Config(_))));
        }
    }
}
