use super::{Dataset, MnistData, IMAGE_COLS, IMAGE_ROWS};
use crate::error::{Error, Result};
use csv::StringRecord;
use ndarray::{Array1, Array3};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

const NUM_FEATURES: usize = IMAGE_ROWS * IMAGE_COLS;
const LINE_SIZE: usize = NUM_FEATURES + 1;

const TRAIN_FILE: &str = "mnist_train.csv";
const TEST_FILE: &str = "mnist_test.csv";

/// Parse every field of a record as a T
/// Returns None if any field fails to parse
fn parse_record<T: FromStr>(record: &StringRecord) -> Option<Vec<T>> {
    record.iter().map(|x| T::from_str(x.trim()).ok()).collect()
}

/// Parse a record in the dataset. Return the label and the pixels
/// Records are stored in the format: <label>,<pixel0x0>,<pixel0x1>,...
/// The dataset is taken from here https://www.kaggle.com/datasets/oddrationale/mnist-in-csv
fn parse_dataset_record(record: &StringRecord) -> Option<(u8, Vec<u8>)> {
    match parse_record::<u8>(record) {
        Some(v) if v.len() == LINE_SIZE => Some((v[0], v[1..].to_vec())),
        _ => None,
    }
}

/// Read a CSV dataset with one header row and one image per line
pub fn read_dataset<R: Read>(reader: R) -> Result<Dataset> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut pixels = Vec::new();
    let mut labels = Vec::new();

    for (idx, record) in csv_reader.records().enumerate() {
        let record = record?;
        if record.len() == 1 && record[0].trim().is_empty() {
            continue;
        }

        // +2: one for the header, one because line numbers start at 1
        let (label, row) = parse_dataset_record(&record)
            .ok_or_else(|| Error::Parse(format!("malformed CSV record on line {}", idx + 2)))?;

        labels.push(label);
        pixels.extend(row);
    }

    let images = Array3::from_shape_vec((labels.len(), IMAGE_ROWS, IMAGE_COLS), pixels)
        .map_err(|e| Error::Shape(e.to_string()))?;

    Dataset::new(images, Array1::from(labels))
}

fn read_file(path: &Path) -> Result<Dataset> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    read_dataset(file)
}

/// Load `mnist_train.csv` and `mnist_test.csv` from `dir`
pub fn load_dir(dir: &Path) -> Result<MnistData> {
    Ok(MnistData {
        train: read_file(&dir.join(TRAIN_FILE))?,
        test: read_file(&dir.join(TEST_FILE))?,
    })
}
