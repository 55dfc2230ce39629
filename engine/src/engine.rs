use std::time::Instant;

use serde::Serialize;

use crate::config::DecoderConfig;
use crate::error::{ConfigError, DecodeError};
use crate::schema::{self, Schema};
use crate::scorer::{self, Hypothesis};
use crate::strategy::reshape::Factorization;
use crate::strategy::{collapsing, reshape, segmented, tokenizer, Candidates, VocabularyOverflow};
use crate::tensor::ScoreTensor;
use crate::vocab::Vocabulary;

/// Everything one decode call saw and chose.
#[derive(Debug, Clone, Serialize)]
pub struct Decoded {
    pub text: String,
    pub variant: String,
    pub schema: Schema,
    pub logits: bool,
    pub candidates: Vec<Hypothesis>,
    /// Dropped indices of the chosen variant only.
    pub overflows: Vec<VocabularyOverflow>,
}

/// Immutable after construction; share it freely across threads.
#[derive(Debug, Clone)]
pub struct DecodeEngine {
    config: DecoderConfig,
}

impl Default for DecodeEngine {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DecodeEngine {
    pub fn new(config: DecoderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn builtin() -> Self {
        Self {
            config: DecoderConfig::builtin(),
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn detect(&self, tensor: &ScoreTensor, hint: Option<&str>) -> Schema {
        schema::detect(tensor.shape(), hint, &self.config)
    }

    pub fn decode(
        &self,
        tensor: &ScoreTensor,
        hint: Option<&str>,
        reference: Option<&str>,
    ) -> Result<String, DecodeError> {
        self.decode_detailed(tensor, hint, reference).map(|d| d.text)
    }

    pub fn decode_detailed(
        &self,
        tensor: &ScoreTensor,
        hint: Option<&str>,
        reference: Option<&str>,
    ) -> Result<Decoded, DecodeError> {
        let start = Instant::now();
        let logits = tensor.is_logits();
        if let Some(stats) = tensor.stats() {
            log::debug!(
                "Output shape {:?}: min={:.4}, max={:.4}, mean={:.4} ({})",
                tensor.shape(),
                stats.min,
                stats.max,
                stats.mean,
                if logits { "logits" } else { "probabilities" }
            );
        }

        let schema = self.detect(tensor, hint);
        let candidates = self.run_strategy(tensor, &schema, reference.is_some(), logits)?;
        let chosen = choose(&candidates, reference, tensor.shape())?;

        let overflows = candidates.overflows_for(&chosen.variant).cloned().collect();
        log::debug!(
            "Decoded '{}' via {} ({} of {} candidates) in {:?}",
            chosen.text,
            chosen.variant,
            schema.name(),
            candidates.hypotheses.len(),
            start.elapsed()
        );

        Ok(Decoded {
            text: chosen.text,
            variant: chosen.variant,
            schema,
            logits,
            candidates: candidates.hypotheses,
            overflows,
        })
    }

    fn run_strategy(
        &self,
        tensor: &ScoreTensor,
        schema: &Schema,
        has_reference: bool,
        logits: bool,
    ) -> Result<Candidates, DecodeError> {
        match schema {
            Schema::TokenizerSequence { vocabulary } => {
                tokenizer::decode(tensor, &self.vocabulary(vocabulary)?, logits)
            }
            Schema::FlatSegmented {
                sequence_length,
                vocabulary,
            } => segmented::decode(
                tensor,
                *sequence_length,
                &self.vocabulary(vocabulary)?,
                logits,
            ),
            Schema::TimeMajorCollapsing => collapsing::decode(tensor, logits),
            Schema::GenericReshape {
                sequence_length,
                vocabulary,
            } => {
                let factorization = Factorization {
                    sequence_length: *sequence_length,
                    vocabulary_key: vocabulary.clone(),
                    vocabulary: self.vocabulary(vocabulary)?,
                };
                let calibrate = has_reference && self.config.options.calibrate_orderings;
                reshape::decode(
                    tensor,
                    &factorization,
                    &self.config.symbols,
                    calibrate,
                    logits,
                )
            }
            Schema::Unknown => Err(DecodeError::SchemaUnresolved {
                shape: tensor.shape().to_vec(),
            }),
        }
    }

    fn vocabulary(&self, key: &str) -> Result<Vocabulary, DecodeError> {
        self.config
            .symbols
            .get(key)
            .ok_or_else(|| DecodeError::UnknownVocabulary(key.to_string()))
    }
}

/// A strategy that produced nothing leaves the layout unresolved.
fn choose(
    candidates: &Candidates,
    reference: Option<&str>,
    shape: &[usize],
) -> Result<Hypothesis, DecodeError> {
    scorer::select(&candidates.hypotheses, reference)
        .cloned()
        .ok_or_else(|| DecodeError::SchemaUnresolved {
            shape: shape.to_vec(),
        })
}
