use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a decode call.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("No known output schema matches tensor shape {shape:?}")]
    SchemaUnresolved { shape: Vec<usize> },

    #[error("Vocabulary '{0}' is not registered")]
    UnknownVocabulary(String),

    #[error("ndarray shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl DecodeError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::SchemaUnresolved { .. } => {
                "The model output layout is not recognised. Declare the model in the configuration table."
            }
            Self::UnknownVocabulary(_) => {
                "The configuration refers to a vocabulary that does not exist."
            }
            Self::Shape(_) => "The model output could not be reshaped for decoding.",
        }
    }
}

/// Errors raised while loading or validating the configuration tables.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("model '{model}' refers to unknown vocabulary '{vocabulary}'")]
    DanglingVocabulary { model: String, vocabulary: String },
    #[error("vocabulary '{0}' is empty")]
    EmptyVocabulary(String),
    #[error("reshape search bounds {min}..={max} are invalid")]
    InvalidReshapeBounds { min: usize, max: usize },
    #[error("model '{model}' declares sequence length {length}, expected 1..={max}")]
    InvalidSequenceLength {
        model: String,
        length: usize,
        max: usize,
    },
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Io { .. } => "The configuration file could not be read. Check the path and permissions.",
            Self::Json { .. } => "The configuration file is not valid JSON.",
            Self::DanglingVocabulary { .. } | Self::EmptyVocabulary(_) => {
                "The configuration declares a model with a missing or empty vocabulary."
            }
            Self::InvalidReshapeBounds { .. } => {
                "The configured sequence length search range is empty or too large."
            }
            Self::InvalidSequenceLength { .. } => {
                "The configuration declares a model with an unusable sequence length."
            }
        }
    }
}
