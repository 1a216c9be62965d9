use clap::Parser;
use mnist_dense::config::{Settings, TrainConfig};
use mnist_dense::model::history::{ACCURACY, LOSS, VAL_ACCURACY, VAL_LOSS};
use mnist_dense::model::layers::{ActivationFunction, InitMethod};
use mnist_dense::model::neural_net::NeuralNet;
use mnist_dense::model::{Evaluation, Model};
use mnist_dense::parsing::{self, DataFormat, IMAGE_COLS, IMAGE_ROWS};
use mnist_dense::preprocess::{train_test_split, Features};
use mnist_dense::{export, logging, plot, Error};
use ndarray::Axis;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Train a dense network on MNIST", long_about = None)]
struct Args {
    /// YAML file with default settings; flags given here override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the dataset files
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Layout of the dataset files
    #[arg(short, long)]
    format: Option<DataFormat>,

    /// Widths of the hidden layers, e.g. 1024 or "500 300"
    #[arg(long, value_parser, num_args = 0.., value_delimiter = ' ')]
    hidden: Option<Vec<usize>>,

    /// Dropout rate after each hidden layer
    #[arg(long)]
    dropout: Option<f64>,

    /// Learning rate of the Adam optimizer
    #[arg(short, long)]
    learning_rate: Option<f32>,

    /// Batch size of the network
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Number of epochs to train the network for
    #[arg(short, long)]
    num_epochs: Option<usize>,

    /// How many training examples to hold out for validation
    #[arg(long)]
    validation_size: Option<usize>,

    /// Seed for the split, the initial weights, shuffling and dropout
    #[arg(short, long)]
    seed: Option<u64>,

    /// Activation function used by the hidden layers
    #[arg(short, long)]
    activation_function: Option<ActivationFunction>,

    /// Weight initialization method
    #[arg(short, long)]
    initialization: Option<InitMethod>,

    /// Training image to show before fitting
    #[arg(long)]
    preview_index: Option<usize>,

    /// Test image to show and classify after fitting
    #[arg(long)]
    predict_index: Option<usize>,

    /// Export the model's weights in JSON format
    #[arg(short, long)]
    weight_path: Option<PathBuf>,

    /// Export the per-epoch metrics in CSV format
    #[arg(long)]
    history_path: Option<PathBuf>,
}

impl From<Args> for TrainConfig {
    fn from(args: Args) -> Self {
        TrainConfig {
            data_dir: args.data_dir,
            format: args.format,
            hidden: args.hidden,
            dropout: args.dropout,
            learning_rate: args.learning_rate,
            num_epochs: args.num_epochs,
            batch_size: args.batch_size,
            validation_size: args.validation_size,
            seed: args.seed,
            activation_function: args.activation_function,
            initialization: args.initialization,
            preview_index: args.preview_index,
            predict_index: args.predict_index,
            weight_path: args.weight_path,
            history_path: args.history_path,
        }
    }
}

fn settings(args: Args) -> Result<Settings, Error> {
    let file_config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "reading config file");
            TrainConfig::load(path)?
        }
        None => TrainConfig::default(),
    };

    file_config.merge(TrainConfig::from(args)).resolve()
}

fn print_evaluation(name: &str, eval: Option<Evaluation>) {
    match eval {
        Some(eval) => {
            println!("{} Accuracy: {}", name, eval.accuracy);
            println!("{} Loss: {}", name, eval.loss);
        }
        None => info!(set = name, "empty set, skipping evaluation"),
    }
}

fn shape(dim: &[usize]) -> String {
    format!("{:?}", dim)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init()?;
    let settings = settings(Args::parse())?;
    info!(?settings, "starting run");

    let mut rng = StdRng::seed_from_u64(settings.seed);

    // Load the dataset and hold out part of the training set for validation
    let data = parsing::load(settings.format, &settings.data_dir)?;
    let split = train_test_split(data.train.len(), settings.validation_size, settings.seed)?;
    let (train, validation) = split.apply(&data.train);
    let test = data.test;

    println!("{}", shape(test.images.shape()));
    println!("{}", shape(validation.images.shape()));
    println!("{}", shape(train.labels.shape()));

    let train_features = Features::from_dataset(&train)?;
    let validation_features = Features::from_dataset(&validation)?;
    let test_features = Features::from_dataset(&test)?;

    println!("Training Images: {}", shape(train_features.x.shape()));
    println!("Validation Images: {}", shape(validation_features.x.shape()));
    println!("Testing Images: {}", shape(test_features.x.shape()));
    println!("Training Labels: {}", shape(train_features.y.shape()));
    println!("Validation Labels: {}", shape(validation_features.y.shape()));
    println!("Test Labels: {}", shape(test_features.y.shape()));

    if settings.preview_index < train.len() {
        print!("{}", plot::render_digit(train.images.index_axis(Axis(0), settings.preview_index)));
    } else {
        warn!(index = settings.preview_index, "preview index out of range, skipping");
    }

    let mut neural_net = NeuralNet::new(&settings.net, &mut rng)?;
    println!("{}", neural_net.summary());

    // An empty validation set gives no val_* metrics
    let validation_ref = (!validation_features.is_empty()).then_some(&validation_features);
    let history = neural_net.fit(&train_features, validation_ref, &mut rng);

    print_evaluation("Test", neural_net.evaluate_features(&test_features));
    print_evaluation("Validation", neural_net.evaluate_features(&validation_features));
    print_evaluation("Train", neural_net.evaluate_features(&train_features));

    let series = |name| history.get(name).unwrap_or(&[]);
    print!(
        "{}",
        plot::render_curves(
            "Training and Validation Loss",
            ("Training Loss", series(LOSS)),
            ("Validation Loss", series(VAL_LOSS)),
        )
    );
    print!(
        "{}",
        plot::render_curves(
            "Training and Validation Accuracy",
            ("Training Accuracy", series(ACCURACY)),
            ("Validation Accuracy", series(VAL_ACCURACY)),
        )
    );

    let predictions = neural_net.predict(&test_features.x.view());
    if settings.predict_index < test.len() {
        let index = settings.predict_index;
        let image = test.images.index_axis(Axis(0), index);
        debug_assert_eq!(image.dim(), (IMAGE_ROWS, IMAGE_COLS));

        print!("{}", plot::render_digit(image));
        println!(
            "Prediction: {}",
            mnist_dense::preprocess::argmax(predictions.row(index))
        );
    } else {
        warn!(index = settings.predict_index, "prediction index out of range, skipping");
    }

    if let Some(weight_path) = &settings.weight_path {
        export::write_weights(weight_path, &neural_net)?;
    }

    if let Some(history_path) = &settings.history_path {
        export::write_history(history_path, &history)?;
    }

    Ok(())
}
