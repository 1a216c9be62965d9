//! Turning raw MNIST arrays into what the network consumes: flattened,
//! normalized feature rows and one-hot targets, plus the seeded
//! train/validation split.

use ndarray::{Array, Array1, Array2, Array3, ArrayView1, ArrayView2, ArrayView3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Error, Result};
use crate::parsing::{Dataset, NUM_CLASSES};

const GREYSCALE_SIZE: f32 = 255f32;

/// Reshape (n, rows, cols) images into (n, rows * cols) rows
pub fn flatten(images: ArrayView3<u8>) -> Array2<u8> {
    let (n, rows, cols) = images.dim();
    // iter() walks in logical order, so this is correct for any memory layout
    Array::from_shape_vec((n, rows * cols), images.iter().copied().collect())
        .expect("element count is n * rows * cols")
}

/// Inverse of `flatten`
pub fn unflatten(flat: ArrayView2<u8>, rows: usize, cols: usize) -> Result<Array3<u8>> {
    let (n, width) = flat.dim();
    if width != rows * cols {
        return Err(Error::Shape(format!(
            "cannot reshape rows of {} into {}x{}",
            width, rows, cols
        )));
    }

    Array::from_shape_vec((n, rows, cols), flat.iter().copied().collect())
        .map_err(|e| Error::Shape(e.to_string()))
}

/// Rescale pixel intensities from [0, 255] to [0.0, 1.0]
pub fn normalize(flat: ArrayView2<u8>) -> Array2<f32> {
    flat.mapv(|x| x as f32 / GREYSCALE_SIZE)
}

/// Construct the one-hot encoding of every label
pub fn one_hot(labels: ArrayView1<u8>, num_classes: usize) -> Result<Array2<f32>> {
    let mut encoded = Array2::zeros((labels.len(), num_classes));

    for (mut row, &label) in encoded.axis_iter_mut(Axis(0)).zip(labels.iter()) {
        let label = label as usize;
        if label >= num_classes {
            return Err(Error::Shape(format!(
                "label {} does not fit in {} classes",
                label, num_classes
            )));
        }
        row[label] = 1f32;
    }

    Ok(encoded)
}

/// Index of the largest entry. The first index wins on ties
pub fn argmax(row: ArrayView1<f32>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, max), (idx, &x)| {
            if x.total_cmp(&max).is_gt() {
                (idx, x)
            } else {
                (best, max)
            }
        })
        .0
}

/// Index sets produced by `train_test_split`
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n` with a seeded RNG and hold out the last `test_size` indices
pub fn train_test_split(n: usize, test_size: usize, seed: u64) -> Result<Split> {
    if test_size > n {
        return Err(Error::Config(format!(
            "cannot hold out {} of {} examples",
            test_size, n
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test = indices.split_off(n - test_size);

    Ok(Split {
        train: indices,
        test,
    })
}

impl Split {
    /// Materialize both halves of the split from `dataset`
    pub fn apply(&self, dataset: &Dataset) -> (Dataset, Dataset) {
        let pick = |indices: &[usize]| Dataset {
            images: dataset.images.select(Axis(0), indices),
            labels: dataset.labels.select(Axis(0), indices),
        };

        (pick(&self.train), pick(&self.test))
    }
}

/// Network-ready matrices: `x` is (n, 784) in [0, 1], `y` is (n, 10) one-hot
pub struct Features {
    pub x: Array2<f32>,
    pub y: Array2<f32>,
}

impl Features {
    pub fn from_dataset(dataset: &Dataset) -> Result<Features> {
        let x = normalize(flatten(dataset.images.view()).view());
        let y = one_hot(dataset.labels.view(), NUM_CLASSES)?;

        Ok(Features { x, y })
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }
}

/// Decode one-hot (or probability) rows back into class indices
pub fn decode(rows: ArrayView2<f32>) -> Array1<usize> {
    rows.axis_iter(Axis(0)).map(argmax).collect()
}
