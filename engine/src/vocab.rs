//! Symbol tables: positional vocabularies, tokenizer special-token layouts and
//! the candidate layouts tried by the collapsing strategy.

use std::fmt;

/// Ordered symbol table. Index `offset + i` maps to the `i`-th symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    symbols: Vec<char>,
    offset: usize,
}

impl Vocabulary {
    pub fn new(symbols: &str) -> Self {
        Self {
            symbols: symbols.chars().collect(),
            offset: 0,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn symbol(&self, index: usize) -> Option<char> {
        index
            .checked_sub(self.offset)
            .and_then(|i| self.symbols.get(i).copied())
    }

    pub fn index_of(&self, symbol: char) -> Option<usize> {
        self.symbols
            .iter()
            .position(|&c| c == symbol)
            .map(|i| i + self.offset)
    }

    pub fn symbols(&self) -> String {
        self.symbols.iter().collect()
    }
}

/// Reserved tokenizer indices. EOS is always 0; the other three follow the
/// last vocabulary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokenLayout {
    pub eos: usize,
    pub unk: usize,
    pub bos: usize,
    pub pad: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    EndOfSequence,
    Reserved,
    Symbol,
    /// Slots above the special block. Observed in some models but unmapped.
    Extension,
}

impl SpecialTokenLayout {
    pub fn for_vocabulary(vocab_len: usize) -> Self {
        Self {
            eos: 0,
            unk: vocab_len + 1,
            bos: vocab_len + 2,
            pad: vocab_len + 3,
        }
    }

    pub fn total_classes(&self) -> usize {
        self.pad + 1
    }

    pub fn classify(&self, index: usize) -> TokenClass {
        if index == self.eos {
            TokenClass::EndOfSequence
        } else if index == self.unk || index == self.bos || index == self.pad {
            TokenClass::Reserved
        } else if index < self.unk {
            TokenClass::Symbol
        } else {
            TokenClass::Extension
        }
    }
}

/// Contiguous index range mapped onto consecutive characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolRange {
    pub start: usize,
    pub end: usize,
    pub first: char,
}

impl SymbolRange {
    fn block(start: usize, available: usize, alphabet: usize, first: char) -> Option<Self> {
        let len = available.min(alphabet);
        (len > 0).then(|| Self {
            start,
            end: start + len - 1,
            first,
        })
    }

    pub fn span(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start..=self.end).contains(&index)
    }

    pub fn symbol(&self, index: usize) -> Option<char> {
        if !self.contains(index) {
            return None;
        }
        char::from_u32(self.first as u32 + (index - self.start) as u32)
    }

    fn last_char(&self) -> char {
        char::from_u32(self.first as u32 + (self.span() - 1) as u32).unwrap_or(self.first)
    }
}

const DIGITS: usize = 10;
const LETTERS: usize = 26;
/// In the mixed-case layout upper-case letters stop at this absolute index.
const MIXED_UPPER_END: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlankPosition {
    First,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockOrder {
    DigitsFirst,
    LettersFirst,
}

const SIMPLE_LAYOUTS: [(&str, BlankPosition, BlockOrder, char); 6] = [
    ("blank0-digits-upper", BlankPosition::First, BlockOrder::DigitsFirst, 'A'),
    ("blank0-upper-digits", BlankPosition::First, BlockOrder::LettersFirst, 'A'),
    ("blankN-digits-upper", BlankPosition::Last, BlockOrder::DigitsFirst, 'A'),
    ("blankN-upper-digits", BlankPosition::Last, BlockOrder::LettersFirst, 'A'),
    ("blank0-digits-lower", BlankPosition::First, BlockOrder::DigitsFirst, 'a'),
    ("blank0-lower-digits", BlankPosition::First, BlockOrder::LettersFirst, 'a'),
];

/// One hypothesis about a blank-symbol classifier's output layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapsingLayout {
    pub id: &'static str,
    pub blank: usize,
    pub digits: Option<SymbolRange>,
    pub letters: Vec<SymbolRange>,
}

impl CollapsingLayout {
    /// The bounded candidate set for a classifier with `classes` outputs, in
    /// enumeration order. The first entry is the default layout.
    pub fn candidates(classes: usize) -> Vec<Self> {
        if classes < 2 {
            return Vec::new();
        }
        SIMPLE_LAYOUTS
            .iter()
            .map(|&(id, blank_at, order, letter)| Self::simple(id, classes, blank_at, order, letter))
            .chain(std::iter::once(Self::mixed_case(classes)))
            .collect()
    }

    fn simple(
        id: &'static str,
        classes: usize,
        blank_at: BlankPosition,
        order: BlockOrder,
        letter: char,
    ) -> Self {
        let symbols = classes - 1;
        let (blank, base) = match blank_at {
            BlankPosition::First => (0, 1),
            BlankPosition::Last => (classes - 1, 0),
        };
        let (digits, letters) = match order {
            BlockOrder::DigitsFirst => {
                let digits = SymbolRange::block(base, symbols, DIGITS, '0');
                let used = digits.map_or(0, |r| r.span());
                let letters = SymbolRange::block(base + used, symbols - used, LETTERS, letter);
                (digits, letters)
            }
            BlockOrder::LettersFirst => {
                let letters = SymbolRange::block(base, symbols, LETTERS, letter);
                let used = letters.map_or(0, |r| r.span());
                let digits = SymbolRange::block(base + used, symbols - used, DIGITS, '0');
                (digits, letters)
            }
        };
        Self {
            id,
            blank,
            digits,
            letters: letters.into_iter().collect(),
        }
    }

    fn mixed_case(classes: usize) -> Self {
        let symbols = classes - 1;
        let digits = SymbolRange::block(1, symbols, DIGITS, '0');
        let mut next = 1 + digits.map_or(0, |r| r.span());
        let mut remaining = symbols - (next - 1);
        let upper_span = (MIXED_UPPER_END + 1).saturating_sub(next).min(remaining);
        let upper = SymbolRange::block(next, upper_span, LETTERS, 'A');
        if let Some(range) = upper {
            next += range.span();
            remaining -= range.span();
        }
        let lower = SymbolRange::block(next, remaining, LETTERS, 'a');
        Self {
            id: "blank0-digits-mixed",
            blank: 0,
            digits,
            letters: upper.into_iter().chain(lower).collect(),
        }
    }

    pub fn is_digit(&self, index: usize) -> bool {
        self.digits.is_some_and(|r| r.contains(index))
    }

    pub fn is_letter(&self, index: usize) -> bool {
        self.letters.iter().any(|r| r.contains(index))
    }

    pub fn symbol(&self, index: usize) -> Option<char> {
        if index == self.blank {
            return None;
        }
        self.digits
            .iter()
            .chain(self.letters.iter())
            .find_map(|r| r.symbol(index))
    }
}

impl fmt::Display for CollapsingLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blank({})", self.blank)?;
        let mut ranges: Vec<&SymbolRange> = self.digits.iter().chain(self.letters.iter()).collect();
        ranges.sort_by_key(|r| r.start);
        for r in ranges {
            write!(f, ", {}-{}({}-{})", r.first, r.last_char(), r.start, r.end)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_respects_offset() {
        let vocab = Vocabulary::new("abc").with_offset(1);
        assert_eq!(vocab.symbol(0), None);
        assert_eq!(vocab.symbol(1), Some('a'));
        assert_eq!(vocab.symbol(3), Some('c'));
        assert_eq!(vocab.symbol(4), None);
        assert_eq!(vocab.index_of('b'), Some(2));
    }

    #[test]
    fn special_tokens_follow_vocabulary() {
        let layout = SpecialTokenLayout::for_vocabulary(62);
        assert_eq!(layout.eos, 0);
        assert_eq!((layout.unk, layout.bos, layout.pad), (63, 64, 65));
        assert_eq!(layout.classify(0), TokenClass::EndOfSequence);
        assert_eq!(layout.classify(62), TokenClass::Symbol);
        assert_eq!(layout.classify(64), TokenClass::Reserved);
        assert_eq!(layout.classify(66), TokenClass::Extension);
    }

    #[test]
    fn candidate_layouts_for_34_classes() {
        let layouts = CollapsingLayout::candidates(34);
        assert_eq!(layouts.len(), 7);
        let rendered: Vec<String> = layouts.iter().map(|l| l.to_string()).collect();
        assert_eq!(rendered[0], "blank(0), 0-9(1-10), A-W(11-33)");
        assert_eq!(rendered[1], "blank(0), A-Z(1-26), 0-6(27-33)");
        assert_eq!(rendered[2], "blank(33), 0-9(0-9), A-W(10-32)");
        assert_eq!(rendered[3], "blank(33), A-Z(0-25), 0-6(26-32)");
        assert_eq!(rendered[6], "blank(0), 0-9(1-10), A-P(11-26), a-g(27-33)");
    }

    #[test]
    fn layout_maps_symbols() {
        let layout = &CollapsingLayout::candidates(34)[0];
        assert_eq!(layout.symbol(0), None);
        assert_eq!(layout.symbol(1), Some('0'));
        assert_eq!(layout.symbol(11), Some('A'));
        assert!(layout.is_digit(10));
        assert!(layout.is_letter(33));
        assert!(!layout.is_letter(34));
    }

    #[test]
    fn tiny_class_counts_are_bounded() {
        assert!(CollapsingLayout::candidates(1).is_empty());
        let layouts = CollapsingLayout::candidates(4);
        assert_eq!(layouts[0].digits.map(|r| r.span()), Some(3));
        assert!(layouts[0].letters.is_empty());
    }
}
