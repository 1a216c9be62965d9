pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod model;
pub mod parsing;
pub mod plot;
pub mod preprocess;

pub use error::{Error, Result};
