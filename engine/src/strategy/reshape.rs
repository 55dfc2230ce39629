use crate::config::{DecodeOptions, SymbolTables};
use crate::error::DecodeError;
use crate::strategy::{map_positional, segmented, Candidates};
use crate::tensor::ScoreTensor;
use crate::vocab::Vocabulary;

/// An exact `sequence_length * vocab_size` split of a tensor's elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Factorization {
    pub sequence_length: usize,
    pub vocabulary_key: String,
    pub vocabulary: Vocabulary,
}

/// Sequence lengths ascending, vocabularies in configured order; the first
/// exact factorization wins.
pub fn factorize(
    element_count: usize,
    tables: &SymbolTables,
    options: &DecodeOptions,
) -> Option<Factorization> {
    for sequence_length in options.min_sequence_length..=options.max_sequence_length {
        for (key, vocabulary) in tables.reshape_candidates() {
            if !vocabulary.is_empty()
                && sequence_length.checked_mul(vocabulary.len()) == Some(element_count)
            {
                return Some(Factorization {
                    sequence_length,
                    vocabulary_key: key.to_string(),
                    vocabulary,
                });
            }
        }
    }
    None
}

/// Decodes through the matched vocabulary. With `calibrate` set, registered
/// alternative orderings of the same size follow as extra hypotheses.
pub fn decode(
    tensor: &ScoreTensor,
    factorization: &Factorization,
    tables: &SymbolTables,
    calibrate: bool,
    logits: bool,
) -> Result<Candidates, DecodeError> {
    let vocab = &factorization.vocabulary;
    let indices =
        segmented::segment_indices(tensor, factorization.sequence_length, vocab.len(), logits)?;
    log::debug!(
        "Reshaped to ({}, {}) via '{}', indices={:?}",
        factorization.sequence_length,
        vocab.len(),
        factorization.vocabulary_key,
        indices
    );

    let mut out = Candidates::default();
    let canonical = format!("reshape:{}", factorization.vocabulary_key);
    let text = map_positional(&indices, vocab, &canonical, &mut out);
    out.push(text, canonical.as_str());

    if calibrate {
        for (name, ordering) in tables.orderings_for(vocab) {
            let variant = format!("{canonical}/{name}");
            let text = map_positional(&indices, &ordering, &variant, &mut out);
            out.push(text, variant);
        }
    }
    Ok(out)
}
