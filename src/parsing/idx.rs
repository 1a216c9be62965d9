use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use ndarray::{Array1, Array3};
use tracing::debug;

use super::{Dataset, MnistData};
use crate::error::{Error, Result};

const IMAGES_MAGIC: u32 = 2051;
const LABELS_MAGIC: u32 = 2049;

const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader
        .read_exact(&mut buf)
        .map_err(|e| Error::Parse(format!("truncated IDX header: {}", e)))?;
    Ok(u32::from_be_bytes(buf))
}

// Reads at most `len` bytes; the buffer grows with the stream, not the header
fn read_payload<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    reader
        .take(len as u64)
        .read_to_end(&mut payload)
        .map_err(|e| Error::Parse(format!("reading IDX data: {}", e)))?;

    if payload.len() != len {
        return Err(Error::Parse(format!(
            "expected {} bytes of IDX data, found {}",
            len,
            payload.len()
        )));
    }
    Ok(payload)
}

/// Parse an IDX3 image file.
/// Header is four big-endian u32s: magic (2051), number of images, rows, columns
pub fn read_images<R: Read>(mut reader: R) -> Result<Array3<u8>> {
    let magic = read_u32(&mut reader)?;
    if magic != IMAGES_MAGIC {
        return Err(Error::Parse(format!(
            "bad image file magic {} (expected {})",
            magic, IMAGES_MAGIC
        )));
    }

    let count = read_u32(&mut reader)? as usize;
    let rows = read_u32(&mut reader)? as usize;
    let cols = read_u32(&mut reader)? as usize;
    let len = count
        .checked_mul(rows)
        .and_then(|n| n.checked_mul(cols))
        .ok_or_else(|| {
            Error::Parse(format!("IDX dimensions {}x{}x{} overflow", count, rows, cols))
        })?;
    let pixels = read_payload(&mut reader, len)?;

    Array3::from_shape_vec((count, rows, cols), pixels).map_err(|e| Error::Shape(e.to_string()))
}

/// Parse an IDX1 label file. Header is magic (2049) and the number of labels
pub fn read_labels<R: Read>(mut reader: R) -> Result<Array1<u8>> {
    let magic = read_u32(&mut reader)?;
    if magic != LABELS_MAGIC {
        return Err(Error::Parse(format!(
            "bad label file magic {} (expected {})",
            magic, LABELS_MAGIC
        )));
    }

    let count = read_u32(&mut reader)? as usize;
    let labels = read_payload(&mut reader, count)?;

    Ok(Array1::from(labels))
}

/// Open an IDX file, gunzipping it on the fly if the name ends in `.gz`
pub fn open(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let reader = BufReader::new(file);

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("gz") => Ok(Box::new(GzDecoder::new(reader))),
        _ => Ok(Box::new(reader)),
    }
}

// Prefer the gzipped file that the MNIST site distributes, fall back to the extracted one
fn locate(dir: &Path, name: &str) -> PathBuf {
    let gz = dir.join(format!("{}.gz", name));
    if gz.exists() {
        gz
    } else {
        dir.join(name)
    }
}

fn load_partition(dir: &Path, images: &str, labels: &str) -> Result<Dataset> {
    let images_path = locate(dir, images);
    let labels_path = locate(dir, labels);
    debug!(images = %images_path.display(), labels = %labels_path.display(), "reading IDX pair");

    let images = read_images(open(&images_path)?)?;
    let labels = read_labels(open(&labels_path)?)?;

    Dataset::new(images, labels)
}

/// Load the four standard MNIST IDX files from `dir`
pub fn load_dir(dir: &Path) -> Result<MnistData> {
    Ok(MnistData {
        train: load_partition(dir, TRAIN_IMAGES, TRAIN_LABELS)?,
        test: load_partition(dir, TEST_IMAGES, TEST_LABELS)?,
    })
}
