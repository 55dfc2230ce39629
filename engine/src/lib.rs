pub mod config;
pub mod engine;
pub mod error;
pub mod provider;
pub mod schema;
pub mod scorer;
pub mod strategy;
pub mod tensor;
pub mod vocab;

pub use config::{normalize_hint, DecodeOptions, DecoderConfig, ModelSpec, ModelTable, SymbolTables};
pub use engine::{DecodeEngine, Decoded};
pub use error::{ConfigError, DecodeError};
pub use provider::{InferenceProvider, OnnxProvider, ProviderError};
pub use schema::Schema;
pub use scorer::{Hypothesis, Score};
pub use strategy::VocabularyOverflow;
pub use tensor::ScoreTensor;
