use ndarray::Array2;

use crate::error::DecodeError;
use crate::strategy::Candidates;
use crate::tensor::{argmax_rows, normalize_rows, top_k, top_two, ScoreTensor};
use crate::vocab::CollapsingLayout;

const DEBUG_STEPS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathVariant {
    Greedy,
    /// Top-1 unless it is a letter and top-2 is a digit.
    Top2,
}

impl PathVariant {
    pub const ALL: [PathVariant; 2] = [PathVariant::Greedy, PathVariant::Top2];

    pub fn as_str(&self) -> &'static str {
        match self {
            PathVariant::Greedy => "greedy",
            PathVariant::Top2 => "top2",
        }
    }
}

pub fn variant_id(layout: &CollapsingLayout, path: PathVariant) -> String {
    format!("collapse:{}/{}", layout.id, path.as_str())
}

/// `(step, index)` pairs that survive collapsing. A blank emits nothing and
/// clears repeat tracking; any other index is dropped when it repeats the
/// previous one.
fn surviving(path: &[usize], blank: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
    let mut prev = None;
    path.iter().enumerate().filter_map(move |(step, &index)| {
        if index == blank {
            prev = None;
            return None;
        }
        if prev == Some(index) {
            return None;
        }
        prev = Some(index);
        Some((step, index))
    })
}

pub fn collapse(path: &[usize], blank: usize) -> Vec<usize> {
    surviving(path, blank).map(|(_, index)| index).collect()
}

/// Per-step indices for `variant` under `layout`.
pub fn best_path(probs: &Array2<f32>, layout: &CollapsingLayout, variant: PathVariant) -> Vec<usize> {
    match variant {
        PathVariant::Greedy => argmax_rows(probs),
        PathVariant::Top2 => probs
            .rows()
            .into_iter()
            .map(|row| match top_two(row) {
                (first, Some(second)) if layout.is_letter(first) && layout.is_digit(second) => second,
                (first, _) => first,
            })
            .collect(),
    }
}

fn emit(path: &[usize], layout: &CollapsingLayout, variant: &str, out: &mut Candidates) -> String {
    let mut text = String::new();
    for (step, index) in surviving(path, layout.blank) {
        match layout.symbol(index) {
            Some(c) => text.push(c),
            None => out.overflow(variant, step, index),
        }
    }
    text
}

/// Tries every candidate layout with both path variants. Hypotheses come out
/// layout by layout, greedy before top2.
pub fn decode(tensor: &ScoreTensor, logits: bool) -> Result<Candidates, DecodeError> {
    let unresolved = || DecodeError::SchemaUnresolved {
        shape: tensor.shape().to_vec(),
    };
    let &[time_steps, batch, classes] = tensor.shape() else {
        return Err(unresolved());
    };
    if batch == 0 || time_steps <= batch {
        return Err(unresolved());
    }
    let layouts = CollapsingLayout::candidates(classes);
    if layouts.is_empty() {
        return Err(unresolved());
    }

    let probs = normalize_rows(&tensor.slab(1, 0)?, logits);
    if log::log_enabled!(log::Level::Debug) {
        for (step, row) in probs.rows().into_iter().take(DEBUG_STEPS).enumerate() {
            log::debug!("Step {step}: top3={:?}", top_k(row, 3));
        }
    }

    let mut out = Candidates::default();
    for layout in &layouts {
        for variant in PathVariant::ALL {
            let id = variant_id(layout, variant);
            let path = best_path(&probs, layout, variant);
            let text = emit(&path, layout, &id, &mut out);
            log::debug!("{layout} [{}] -> '{text}'", variant.as_str());
            out.push(text, id);
        }
    }
    Ok(out)
}
