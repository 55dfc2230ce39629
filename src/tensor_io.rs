use std::fs;
use std::path::Path;

use ndarray::{ArrayD, IxDyn};
use serde::Deserialize;

use crate::error::CliError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TensorFile {
    shape: Vec<usize>,
    data: Vec<f32>,
}

/// Reads a row-major `{"shape": [...], "data": [...]}` tensor.
pub fn read_tensor(path: &Path) -> Result<ArrayD<f32>, CliError> {
    let content = fs::read_to_string(path).map_err(|source| CliError::TensorIo {
        path: path.to_path_buf(),
        source,
    })?;
    parse_tensor(&content, path)
}

pub fn parse_tensor(content: &str, origin: &Path) -> Result<ArrayD<f32>, CliError> {
    let file: TensorFile = serde_json::from_str(content).map_err(|source| CliError::TensorJson {
        path: origin.to_path_buf(),
        source,
    })?;
    ArrayD::from_shape_vec(IxDyn(&file.shape), file.data).map_err(|source| CliError::TensorShape {
        path: origin.to_path_buf(),
        source,
    })
}
