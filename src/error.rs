use std::path::PathBuf;

use captcha_decoder_lib::{ConfigError, DecodeError, ProviderError};
use thiserror::Error;

/// Unified CLI errors.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Decode: {0}")]
    Decode(#[from] DecodeError),

    #[error("Config: {0}")]
    Config(#[from] ConfigError),

    #[error("Inference: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tensor file {path}: {source}")]
    TensorIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Tensor file {path}: {source}")]
    TensorJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Tensor file {path}: {source}")]
    TensorShape {
        path: PathBuf,
        #[source]
        source: ndarray::ShapeError,
    },

    #[error("Report: {0}")]
    Report(#[from] serde_json::Error),
}

impl CliError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Decode(err) => err.user_message(),
            Self::Config(err) => err.user_message(),
            Self::Provider(err) => err.user_message(),
            Self::TensorIo { .. } | Self::TensorJson { .. } | Self::TensorShape { .. } => {
                "Input tensors must be JSON files of the form {\"shape\": [...], \"data\": [...]}."
            }
            Self::Report(_) => "The decode report could not be written.",
        }
    }
}
