use crate::error::DecodeError;
use crate::strategy::{map_positional, Candidates};
use crate::tensor::{argmax_rows, normalize_rows, ScoreTensor};
use crate::vocab::Vocabulary;

pub const VARIANT: &str = "flat-segmented";

/// Per-segment argmax of a flat `sequence_length * vocab_size` row.
pub fn segment_indices(
    tensor: &ScoreTensor,
    sequence_length: usize,
    vocab_size: usize,
    logits: bool,
) -> Result<Vec<usize>, DecodeError> {
    let segments = tensor.as_matrix(sequence_length, vocab_size)?;
    Ok(argmax_rows(&normalize_rows(&segments, logits)))
}

pub fn decode(
    tensor: &ScoreTensor,
    sequence_length: usize,
    vocabulary: &Vocabulary,
    logits: bool,
) -> Result<Candidates, DecodeError> {
    let indices = segment_indices(tensor, sequence_length, vocabulary.len(), logits)?;
    log::debug!(
        "Flat segments: {} x {}, indices={:?}",
        sequence_length,
        vocabulary.len(),
        indices
    );

    let mut out = Candidates::default();
    let text = map_positional(&indices, vocabulary, VARIANT, &mut out);
    out.push(text, VARIANT);
    Ok(out)
}
