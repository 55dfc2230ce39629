use crate::error::DecodeError;
use crate::strategy::Candidates;
use crate::tensor::{argmax_rows, normalize_rows, ScoreTensor};
use crate::vocab::{SpecialTokenLayout, TokenClass, Vocabulary};

pub const VARIANT: &str = "tokenizer";

/// Decodes a `(1, positions, classes)` or `(positions, classes)` tensor whose
/// classes are `[EOS] + vocabulary + [UNK, BOS, PAD]`.
pub fn decode(
    tensor: &ScoreTensor,
    vocabulary: &Vocabulary,
    logits: bool,
) -> Result<Candidates, DecodeError> {
    let rows = match tensor.shape() {
        [1, _, _] => tensor.slab(0, 0)?,
        [positions, classes] => tensor.as_matrix(*positions, *classes)?,
        shape => {
            return Err(DecodeError::SchemaUnresolved {
                shape: shape.to_vec(),
            })
        }
    };
    let indices = argmax_rows(&normalize_rows(&rows, logits));

    let vocab = vocabulary.clone().with_offset(1);
    let layout = SpecialTokenLayout::for_vocabulary(vocab.len());
    log::debug!(
        "Tokenizer layout: EOS={}, UNK={}, BOS={}, PAD={}, charset={} symbols, indices={:?}",
        layout.eos,
        layout.unk,
        layout.bos,
        layout.pad,
        vocab.len(),
        indices
    );

    let mut out = Candidates::default();
    let text = decode_indices(&indices, &vocab, &layout, &mut out);
    out.push(text, VARIANT);
    Ok(out)
}

/// Stops before the first EOS, skips reserved tokens and drops extension
/// slots above PAD.
pub fn decode_indices(
    indices: &[usize],
    vocab: &Vocabulary,
    layout: &SpecialTokenLayout,
    out: &mut Candidates,
) -> String {
    let mut text = String::new();
    for (position, &index) in indices.iter().enumerate() {
        match layout.classify(index) {
            TokenClass::EndOfSequence => break,
            TokenClass::Reserved => continue,
            TokenClass::Symbol => match vocab.symbol(index) {
                Some(c) => text.push(c),
                None => out.overflow(VARIANT, position, index),
            },
            TokenClass::Extension => out.overflow(VARIANT, position, index),
        }
    }
    text
}
