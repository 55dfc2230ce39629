//! Runs a classifier to obtain the score tensor the engine decodes.

use std::path::Path;
use std::time::Instant;

use ndarray::ArrayViewD;
use num_cpus::get_physical;
use ort::{
    execution_providers::CPUExecutionProvider,
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use thiserror::Error;

use crate::tensor::ScoreTensor;

const THREAD_ENV: &str = "ORT_THREADS";

fn resolve_thread_count() -> usize {
    std::env::var(THREAD_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(get_physical)
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ndarray shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Model declares no inputs")]
    InputNotFound,
    #[error("Model output not found: {0}")]
    OutputNotFound(String),
}

impl ProviderError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Io(_) => "The model file could not be read. Check the path.",
            Self::Ort(_) | Self::Shape(_) | Self::InputNotFound | Self::OutputNotFound(_) => {
                "The classifier failed to run on this input."
            }
        }
    }
}

/// Source of raw classifier scores for one preprocessed input.
pub trait InferenceProvider {
    fn run(&mut self, input: ArrayViewD<'_, f32>) -> Result<ScoreTensor, ProviderError>;
}

/// Single-input ONNX classifier. The first declared output is taken as the
/// score tensor.
pub struct OnnxProvider {
    session: Session,
    input_name: String,
    output_name: String,
    model_name: String,
}

impl OnnxProvider {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self, ProviderError> {
        let path = model_path.as_ref();
        if !path.is_file() {
            return Err(ProviderError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("model not found: {}", path.display()),
            )));
        }

        let start = Instant::now();
        let threads = resolve_thread_count();
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_execution_providers(vec![CPUExecutionProvider::default().build()])?
            .with_intra_threads(threads)?
            .commit_from_file(path)?;

        let model_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        for input in &session.inputs {
            log::info!(
                "Model '{}' input: name={}, type={:?}",
                model_name,
                input.name,
                input.input_type
            );
        }
        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or(ProviderError::InputNotFound)?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| ProviderError::OutputNotFound("<first output>".into()))?;

        log::info!(
            "Model '{}' loaded with {} threads in {:?}",
            model_name,
            threads,
            start.elapsed()
        );
        Ok(Self {
            session,
            input_name,
            output_name,
            model_name,
        })
    }

    /// File name of the loaded model, usable as the decode hint.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl InferenceProvider for OnnxProvider {
    fn run(&mut self, input: ArrayViewD<'_, f32>) -> Result<ScoreTensor, ProviderError> {
        let input = input.as_standard_layout();
        let start = Instant::now();
        let outputs = self.session.run(inputs![
            self.input_name.as_str() => TensorRef::from_array_view(input.view())?,
        ])?;
        log::debug!("Inference completed in {:?}", start.elapsed());

        let scores = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| ProviderError::OutputNotFound(self.output_name.clone()))?
            .try_extract_array::<f32>()?
            .to_owned();
        Ok(ScoreTensor::new(scores))
    }
}
