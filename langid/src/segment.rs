//! Grouping of token streams into bounded-size segments.

use crate::errors::{LangIdError, Result};
use crate::tokenizer::BOUNDARY_RESET;

/// Segmentation style of a sentence, decided once from its first token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationStyle {
    /// The sentence opens with a word run: accumulate logical units, where a
    /// unit is a whole word or a standalone character.
    LatinWord,

    /// The sentence opens with a standalone character: partition raw
    /// character ids into fixed windows.
    CjkChar,
}

impl SegmentationStyle {
    /// Inspects the first token of a stream.
    pub fn detect(tokens: &[i32], word_symbol: u32) -> Self {
        match tokens.first() {
            Some(&t) if t == word_symbol as i32 => Self::LatinWord,
            _ => Self::CjkChar,
        }
    }
}

/// One logical unit inside a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentUnit {
    /// A whole word, passed to the word sub-encoder.
    Word(Vec<u32>),

    /// A standalone character, embedded directly.
    Char(u32),
}

/// A bounded window of logical units classified together.
///
/// Holds at most `seg_len - 1` units; the segment-marker embedding prefixed
/// at encode time accounts for the remaining slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Segment {
    units: Vec<SegmentUnit>,
}

impl Segment {
    pub fn units(&self) -> &[SegmentUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    InWord,
    InChar,
}

/// Groups a token stream into ordered segments.
///
/// An empty stream yields zero segments; a stream shorter than one full
/// segment yields exactly one partial segment. All segments except the last
/// hold exactly `seg_len - 1` units.
///
/// # Errors
///
/// [`LangIdError::InvalidArgument`] if `seg_len < 2`;
/// [`LangIdError::Validation`] if the stream contains a negative token other
/// than [`BOUNDARY_RESET`].
pub fn segments(
    tokens: &[i32],
    seg_len: usize,
    style: SegmentationStyle,
    word_symbol: u32,
) -> Result<Vec<Segment>> {
    if seg_len < 2 {
        return Err(LangIdError::invalid_argument("seg_len", "must be >= 2"));
    }
    for &t in tokens {
        if t < 0 && t != BOUNDARY_RESET {
            return Err(LangIdError::validation(format!(
                "unexpected token value {t} in stream"
            )));
        }
    }
    let capacity = seg_len - 1;
    match style {
        SegmentationStyle::LatinWord => latin_segments(tokens, capacity, word_symbol),
        SegmentationStyle::CjkChar => Ok(cjk_segments(tokens, capacity, word_symbol)),
    }
}

fn latin_segments(tokens: &[i32], capacity: usize, word_symbol: u32) -> Result<Vec<Segment>> {
    let ws = word_symbol as i32;
    let mut segs = vec![];
    let mut units = vec![];
    let mut word: Vec<u32> = vec![];
    let mut state = ScanState::InChar;

    let close_word = |word: &mut Vec<u32>, units: &mut Vec<SegmentUnit>| {
        if !word.is_empty() {
            units.push(SegmentUnit::Word(std::mem::take(word)));
        }
    };

    for &id in tokens {
        if id == ws {
            close_word(&mut word, &mut units);
            state = ScanState::InWord;
        } else if id == BOUNDARY_RESET {
            close_word(&mut word, &mut units);
            state = ScanState::InChar;
        } else if state == ScanState::InWord {
            word.push(id as u32);
        } else {
            units.push(SegmentUnit::Char(id as u32));
        }
        if units.len() == capacity {
            segs.push(Segment {
                units: std::mem::take(&mut units),
            });
        }
    }
    close_word(&mut word, &mut units);
    if units.len() == capacity {
        segs.push(Segment {
            units: std::mem::take(&mut units),
        });
    }
    if !units.is_empty() {
        segs.push(Segment { units });
    }
    Ok(segs)
}

fn cjk_segments(tokens: &[i32], capacity: usize, word_symbol: u32) -> Vec<Segment> {
    let ws = word_symbol as i32;
    let ids: Vec<u32> = tokens
        .iter()
        .filter(|&&t| t != BOUNDARY_RESET && t != ws)
        .map(|&t| t as u32)
        .collect();
    ids.chunks(capacity)
        .map(|window| Segment {
            units: window.iter().map(|&id| SegmentUnit::Char(id)).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;
    use crate::vocab::Vocabulary;

    fn vocab() -> Vocabulary {
        Vocabulary::new("Iamhpy你好bcdefg".chars().map(|c| c.to_string())).unwrap()
    }

    fn units_of(segs: &[Segment]) -> Vec<SegmentUnit> {
        segs.iter().flat_map(|s| s.units().to_vec()).collect()
    }

    #[test]
    fn test_mixed_sentence_single_segment() {
        let v = vocab();
        let toks = Tokenizer::default().tokenize("I am happy 你好", &v).unwrap();
        let style = SegmentationStyle::detect(&toks, v.word_symbol());
        assert_eq!(SegmentationStyle::LatinWord, style);
        let segs = segments(&toks, 8, style, v.word_symbol()).unwrap();
        assert_eq!(1, segs.len());
        // 3 words + 2 standalone CJK characters.
        assert_eq!(5, segs[0].len());
        let expected = vec![
            SegmentUnit::Word(vec![v.get("I").unwrap()]),
            SegmentUnit::Word(vec![v.get("a").unwrap(), v.get("m").unwrap()]),
            SegmentUnit::Word(vec![
                v.get("h").unwrap(),
                v.get("a").unwrap(),
                v.get("p").unwrap(),
                v.get("p").unwrap(),
                v.get("y").unwrap(),
            ]),
            SegmentUnit::Char(v.get("你").unwrap()),
            SegmentUnit::Char(v.get("好").unwrap()),
        ];
        assert_eq!(expected, segs[0].units());
    }

    #[test]
    fn test_all_segments_full_except_last() {
        let v = vocab();
        let line = "a b c d e f g I a b c";
        let toks = Tokenizer::default().tokenize(line, &v).unwrap();
        let style = SegmentationStyle::detect(&toks, v.word_symbol());
        let segs = segments(&toks, 4, style, v.word_symbol()).unwrap();
        assert_eq!(4, segs.len());
        for s in &segs[..segs.len() - 1] {
            assert_eq!(3, s.len());
        }
        assert_eq!(2, segs.last().unwrap().len());
        // Concatenating all units reproduces the stream's logical units.
        let rejoined = units_of(&segs);
        assert_eq!(11, rejoined.len());
        let flat = segments(&toks, 100, style, v.word_symbol()).unwrap();
        assert_eq!(units_of(&flat), rejoined);
    }

    #[test]
    fn test_cjk_style_windows() {
        let v = vocab();
        let toks = Tokenizer::default().tokenize("你好你好你", &v).unwrap();
        let style = SegmentationStyle::detect(&toks, v.word_symbol());
        assert_eq!(SegmentationStyle::CjkChar, style);
        let segs = segments(&toks, 3, style, v.word_symbol()).unwrap();
        assert_eq!(3, segs.len());
        assert_eq!(2, segs[0].len());
        assert_eq!(2, segs[1].len());
        assert_eq!(1, segs[2].len());
        assert!(segs
            .iter()
            .flat_map(|s| s.units())
            .all(|u| matches!(u, SegmentUnit::Char(_))));
    }

    #[test]
    fn test_demoted_word_becomes_chars() {
        let v = vocab();
        let line: String = std::iter::repeat('b').take(33).collect();
        let toks = Tokenizer::default().tokenize(&line, &v).unwrap();
        let style = SegmentationStyle::detect(&toks, v.word_symbol());
        assert_eq!(SegmentationStyle::CjkChar, style);
        let segs = segments(&toks, 64, style, v.word_symbol()).unwrap();
        assert_eq!(1, segs.len());
        assert_eq!(33, segs[0].len());
    }

    #[test]
    fn test_empty_stream_yields_no_segments() {
        let v = vocab();
        let segs = segments(&[], 8, SegmentationStyle::CjkChar, v.word_symbol()).unwrap();
        assert!(segs.is_empty());
    }

    #[test]
    fn test_invalid_seg_len() {
        let v = vocab();
        assert!(segments(&[0], 1, SegmentationStyle::CjkChar, v.word_symbol()).is_err());
    }

    #[test]
    fn test_unexpected_negative_token() {
        let v = vocab();
        assert!(segments(&[-2], 8, SegmentationStyle::CjkChar, v.word_symbol()).is_err());
    }
}
