use serde::Serialize;

/// One candidate decoding and the strategy variant that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hypothesis {
    pub text: String,
    pub variant: String,
}

impl Hypothesis {
    pub fn new(text: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            variant: variant.into(),
        }
    }
}

const POSITION_MATCH: u32 = 10;
const LENGTH_MATCH: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Score {
    Partial(u32),
    Exact,
}

/// 10 per positional char match over the shorter length, +5 on equal length.
/// Exact equality outranks any partial score.
pub fn score(candidate: &str, reference: &str) -> Score {
    if candidate == reference {
        return Score::Exact;
    }
    let matches = candidate
        .chars()
        .zip(reference.chars())
        .filter(|(a, b)| a == b)
        .count() as u32;
    let same_length = candidate.chars().count() == reference.chars().count();
    Score::Partial(matches * POSITION_MATCH + if same_length { LENGTH_MATCH } else { 0 })
}

/// Chooses one hypothesis. Without a reference the first one is canonical.
pub fn select<'a>(hypotheses: &'a [Hypothesis], reference: Option<&str>) -> Option<&'a Hypothesis> {
    let Some(reference) = reference else {
        return hypotheses.first();
    };

    let mut best: Option<(&Hypothesis, Score)> = None;
    for hyp in hypotheses {
        let s = score(&hyp.text, reference);
        if s == Score::Exact {
            return Some(hyp);
        }
        match best {
            Some((_, best_score)) if s <= best_score => {}
            _ => best = Some((hyp, s)),
        }
    }
    best.map(|(hyp, _)| hyp)
}
