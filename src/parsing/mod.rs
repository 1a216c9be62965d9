use std::path::Path;

use ndarray::{Array1, Array3};
use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};

pub mod idx;
pub mod mnist;

pub const IMAGE_ROWS: usize = 28;
pub const IMAGE_COLS: usize = 28;
pub const NUM_CLASSES: usize = 10;

/// Raw images and their labels, exactly as stored on disk
pub struct Dataset {
    pub images: Array3<u8>, // (n, rows, cols)
    pub labels: Array1<u8>,
}

impl Dataset {
    pub fn new(images: Array3<u8>, labels: Array1<u8>) -> Result<Dataset> {
        let (_, rows, cols) = images.dim();
        if (rows, cols) != (IMAGE_ROWS, IMAGE_COLS) {
            return Err(Error::Shape(format!(
                "images are {}x{}, expected {}x{}",
                rows, cols, IMAGE_ROWS, IMAGE_COLS
            )));
        }

        if images.len_of(ndarray::Axis(0)) != labels.len() {
            return Err(Error::Shape(format!(
                "{} images but {} labels",
                images.len_of(ndarray::Axis(0)),
                labels.len()
            )));
        }

        if let Some(bad) = labels.iter().find(|&&l| l as usize >= NUM_CLASSES) {
            return Err(Error::Parse(format!("label {} is not a digit", bad)));
        }

        Ok(Dataset { images, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// The two partitions MNIST ships with
pub struct MnistData {
    pub train: Dataset,
    pub test: Dataset,
}

#[derive(clap::ValueEnum, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// The original IDX files, optionally gzipped
    Idx,
    /// The Kaggle "MNIST in CSV" files
    Csv,
}

/// Load both partitions from `dir` in the given format
pub fn load(format: DataFormat, dir: &Path) -> Result<MnistData> {
    info!(?format, dir = %dir.display(), "loading MNIST");

    let data = match format {
        DataFormat::Idx => idx::load_dir(dir)?,
        DataFormat::Csv => mnist::load_dir(dir)?,
    };

    info!(
        train = data.train.len(),
        test = data.test.len(),
        "dataset loaded"
    );

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_rejects_count_mismatch() {
        let images = Array3::zeros((3, IMAGE_ROWS, IMAGE_COLS));
        let labels = Array1::from(vec![1u8, 2]);

        assert!(matches!(
            Dataset::new(images, labels),
            Err(Error::Shape(_))
        ));
    }

    #[test]
    fn dataset_rejects_images_that_are_not_28x28() {
        let images = Array3::zeros((2, 20, 20));
        let labels = Array1::from(vec![1u8, 2]);

        assert!(matches!(
            Dataset::new(images, labels),
            Err(Error::Shape(_))
        ));
    }

    #[test]
    fn dataset_rejects_non_digit_labels() {
        let images = Array3::zeros((2, IMAGE_ROWS, IMAGE_COLS));
        let labels = Array1::from(vec![1u8, 10]);

        assert!(matches!(
            Dataset::new(images, labels),
            Err(Error::Parse(_))
        ));
    }
}
