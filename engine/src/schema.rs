use serde::Serialize;

use crate::config::{DecoderConfig, ModelSpec};
use crate::strategy::reshape;

/// Output layout resolved for one tensor, with the parameters its strategy
/// needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "schema", rename_all = "snake_case")]
pub enum Schema {
    TokenizerSequence {
        vocabulary: String,
    },
    FlatSegmented {
        sequence_length: usize,
        vocabulary: String,
    },
    TimeMajorCollapsing,
    GenericReshape {
        sequence_length: usize,
        vocabulary: String,
    },
    Unknown,
}

impl Schema {
    pub fn name(&self) -> &'static str {
        match self {
            Schema::TokenizerSequence { .. } => "tokenizer_sequence",
            Schema::FlatSegmented { .. } => "flat_segmented",
            Schema::TimeMajorCollapsing => "time_major_collapsing",
            Schema::GenericReshape { .. } => "generic_reshape",
            Schema::Unknown => "unknown",
        }
    }
}

/// Declared hints are only trusted when the shape agrees with them; anything
/// else goes through shape-only factorization.
pub fn detect(shape: &[usize], hint: Option<&str>, config: &DecoderConfig) -> Schema {
    if let Some(spec) = hint.and_then(|h| config.models.lookup(h)) {
        if let Some(schema) = from_declared(shape, spec, config) {
            return schema;
        }
        log::debug!(
            "Hint {:?} declares {:?} but shape {:?} disagrees, inferring from shape",
            hint,
            spec,
            shape
        );
    }

    let Some(element_count) = shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d)) else {
        return Schema::Unknown;
    };
    match reshape::factorize(element_count, &config.symbols, &config.options) {
        Some(f) => Schema::GenericReshape {
            sequence_length: f.sequence_length,
            vocabulary: f.vocabulary_key,
        },
        None => Schema::Unknown,
    }
}

fn from_declared(shape: &[usize], spec: &ModelSpec, config: &DecoderConfig) -> Option<Schema> {
    match (spec, shape) {
        (ModelSpec::TokenizerSequence { vocabulary }, &[1, positions, _])
            if positions <= config.options.max_tokenizer_positions =>
        {
            Some(Schema::TokenizerSequence {
                vocabulary: vocabulary.clone(),
            })
        }
        (ModelSpec::TimeMajorCollapsing, &[time_steps, batch, _]) if time_steps > batch => {
            Some(Schema::TimeMajorCollapsing)
        }
        (
            ModelSpec::FlatSegmented {
                sequence_length,
                vocabulary,
            },
            &[1, width],
        ) => {
            let vocab = config.symbols.get(vocabulary)?;
            let expected = sequence_length.checked_mul(vocab.len());
            (expected == Some(width)).then(|| Schema::FlatSegmented {
                sequence_length: *sequence_length,
                vocabulary: vocabulary.clone(),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_hint_with_matching_shape() {
        let config = DecoderConfig::builtin();
        assert_eq!(
            detect(&[1, 26, 95], Some("captcha.onnx"), &config),
            Schema::TokenizerSequence {
                vocabulary: "tokenizer_62".to_string()
            }
        );
    }

    #[test]
    fn collapsing_hint_requires_time_major() {
        let config = DecoderConfig::builtin();
        assert_eq!(
            detect(&[38, 1, 34], Some("crnn_model.onnx"), &config),
            Schema::TimeMajorCollapsing
        );
        assert_eq!(detect(&[1, 38, 34], Some("crnn_model.onnx"), &config), Schema::Unknown);
    }

    #[test]
    fn flat_hint_checks_width() {
        let config = DecoderConfig::builtin();
        assert_eq!(
            detect(&[1, 66], Some("models/captcha_model_v2.onnx"), &config),
            Schema::FlatSegmented {
                sequence_length: 6,
                vocabulary: "11".to_string()
            }
        );
        // wrong width for v2, but 5 * 37 factorizes
        assert_eq!(
            detect(&[1, 185], Some("captcha_model_v2.onnx"), &config),
            Schema::GenericReshape {
                sequence_length: 5,
                vocabulary: "37_uppercase".to_string()
            }
        );
    }

    #[test]
    fn oversized_declared_length_does_not_overflow() {
        let mut config = DecoderConfig::builtin();
        config.models.insert(
            "big.onnx",
            ModelSpec::FlatSegmented {
                sequence_length: usize::MAX,
                vocabulary: "63".to_string(),
            },
        );
        assert_eq!(detect(&[1, 13], Some("big.onnx"), &config), Schema::Unknown);
        // usize::MAX * 63 wraps to usize::MAX - 62 in release builds
        assert_eq!(
            detect(&[1, usize::MAX - 62], Some("big.onnx"), &config),
            Schema::Unknown
        );
    }

    #[test]
    fn unknown_hint_falls_back_to_shape() {
        let config = DecoderConfig::builtin();
        assert_eq!(
            detect(&[4, 63], Some("mystery.onnx"), &config),
            Schema::GenericReshape {
                sequence_length: 4,
                vocabulary: "63".to_string()
            }
        );
        assert_eq!(detect(&[7, 13], None, &config), Schema::Unknown);
    }
}
