use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use mnist_dense::export::write_history;
use mnist_dense::model::history::{LOSS, VAL_ACCURACY};
use mnist_dense::model::neural_net::{NetConfig, NeuralNet};
use mnist_dense::model::optim::AdamConfig;
use mnist_dense::model::Model;
use mnist_dense::parsing::{self, DataFormat, Dataset};
use mnist_dense::preprocess::{train_test_split, Features};
use mnist_dense::Error;
use ndarray::{Array1, Array3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::tempdir;

// Each digit k lights up rows 2k and 2k+1, which makes the classes trivially separable
fn striped_digits(n: usize) -> Dataset {
    let labels: Vec<u8> = (0..n).map(|i| (i % 10) as u8).collect();
    let images = Array3::from_shape_fn((n, 28, 28), |(i, r, _)| {
        if r / 2 == labels[i] as usize {
            255
        } else {
            0
        }
    });

    Dataset::new(images, Array1::from(labels)).unwrap()
}

fn idx_bytes(dataset: &Dataset) -> (Vec<u8>, Vec<u8>) {
    let n = dataset.len() as u32;
    let mut images: Vec<u8> = [2051u32, n, 28, 28].iter().flat_map(|v| v.to_be_bytes()).collect();
    images.extend(dataset.images.iter());
    let mut labels: Vec<u8> = [2049u32, n].iter().flat_map(|v| v.to_be_bytes()).collect();
    labels.extend(dataset.labels.iter());
    (images, labels)
}

fn write_gz(path: &Path, bytes: &[u8]) {
    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap();
}

#[test]
fn loads_gzipped_and_plain_idx_files() {
    let dir = tempdir().unwrap();
    let train = striped_digits(30);
    let test = striped_digits(12);

    let (images, labels) = idx_bytes(&train);
    write_gz(&dir.path().join("train-images-idx3-ubyte.gz"), &images);
    write_gz(&dir.path().join("train-labels-idx1-ubyte.gz"), &labels);
    let (images, labels) = idx_bytes(&test);
    fs::write(dir.path().join("t10k-images-idx3-ubyte"), images).unwrap();
    fs::write(dir.path().join("t10k-labels-idx1-ubyte"), labels).unwrap();

    let data = parsing::load(DataFormat::Idx, dir.path()).unwrap();

    assert_eq!(data.train.images, train.images);
    assert_eq!(data.train.labels, train.labels);
    assert_eq!(data.test.images.shape(), &[12, 28, 28]);
    assert_eq!(data.test.labels, test.labels);
}

#[test]
fn loads_kaggle_csv_files() {
    let dir = tempdir().unwrap();
    let dataset = striped_digits(5);

    let mut contents = String::from("label");
    for i in 0..784 {
        contents += &format!(",{}x{}", i / 28 + 1, i % 28 + 1);
    }
    contents.push('\n');
    for (image, label) in dataset.images.outer_iter().zip(dataset.labels.iter()) {
        let pixels: Vec<String> = image.iter().map(|p| p.to_string()).collect();
        contents += &format!("{},{}\n", label, pixels.join(","));
    }
    fs::write(dir.path().join("mnist_train.csv"), &contents).unwrap();
    fs::write(dir.path().join("mnist_test.csv"), &contents).unwrap();

    let data = parsing::load(DataFormat::Csv, dir.path()).unwrap();

    assert_eq!(data.train.images, dataset.images);
    assert_eq!(data.test.labels, dataset.labels);
}

#[test]
fn missing_dataset_is_an_io_error() {
    let dir = tempdir().unwrap();

    let result = parsing::load(DataFormat::Idx, dir.path());

    assert!(matches!(result, Err(Error::Io { .. })));
}

#[test]
fn training_learns_separable_digits() {
    let data = striped_digits(400);
    let split = train_test_split(data.len(), 100, 42).unwrap();
    let (train, validation) = split.apply(&data);
    let train = Features::from_dataset(&train).unwrap();
    let validation = Features::from_dataset(&validation).unwrap();

    let config = NetConfig {
        layer_structure: vec![784, 32, 10],
        dropout: 0.1,
        num_epochs: 8,
        batch_size: 16,
        optimizer: AdamConfig {
            learning_rate: 0.01,
            ..AdamConfig::default()
        },
        ..NetConfig::default()
    };
    let mut rng = StdRng::seed_from_u64(7);
    let mut net = NeuralNet::new(&config, &mut rng).unwrap();

    let before = net.evaluate(&validation.x.view(), &validation.y.view());
    let history = net.fit(&train, Some(&validation), &mut rng);
    let after = net.evaluate(&validation.x.view(), &validation.y.view());

    let losses = history.get(LOSS).unwrap();
    assert_eq!(losses.len(), 8);
    assert!(losses[7] < losses[0]);
    assert!(after.loss < before.loss);
    assert!(after.accuracy > 0.9, "accuracy {}", after.accuracy);
    assert_eq!(history.get(VAL_ACCURACY).unwrap()[7], after.accuracy);

    let dir = tempdir().unwrap();
    let path = dir.path().join("history.csv");
    write_history(&path, &history).unwrap();
    let written = fs::read_to_string(&path).unwrap();
    let mut lines = written.lines();
    assert_eq!(lines.next(), Some("epoch,loss,accuracy,val_loss,val_accuracy"));
    assert_eq!(lines.count(), 8);
}
