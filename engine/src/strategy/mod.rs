//! One decoding strategy per output schema family.

pub mod collapsing;
pub mod reshape;
pub mod segmented;
pub mod tokenizer;

use serde::Serialize;

use crate::scorer::Hypothesis;
use crate::vocab::Vocabulary;

/// A decoded index with no symbol behind it. The position is dropped from the
/// output and decoding continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VocabularyOverflow {
    pub variant: String,
    pub position: usize,
    pub index: usize,
}

/// Hypotheses produced by one strategy run, canonical first.
#[derive(Debug, Clone, Default)]
pub struct Candidates {
    pub hypotheses: Vec<Hypothesis>,
    pub overflows: Vec<VocabularyOverflow>,
}

impl Candidates {
    pub(crate) fn push(&mut self, text: String, variant: impl Into<String>) {
        self.hypotheses.push(Hypothesis::new(text, variant));
    }

    pub(crate) fn overflow(&mut self, variant: &str, position: usize, index: usize) {
        log::debug!("{variant}: index {index} at position {position} has no symbol, dropped");
        self.overflows.push(VocabularyOverflow {
            variant: variant.to_string(),
            position,
            index,
        });
    }

    pub fn overflows_for<'a>(&'a self, variant: &'a str) -> impl Iterator<Item = &'a VocabularyOverflow> {
        self.overflows.iter().filter(move |o| o.variant == variant)
    }
}

/// Maps indices through `vocab` by position, recording overflows.
pub(crate) fn map_positional(
    indices: &[usize],
    vocab: &Vocabulary,
    variant: &str,
    out: &mut Candidates,
) -> String {
    let mut text = String::with_capacity(indices.len());
    for (position, &index) in indices.iter().enumerate() {
        match vocab.symbol(index) {
            Some(c) => text.push(c),
            None => out.overflow(variant, position, index),
        }
    }
    text
}
