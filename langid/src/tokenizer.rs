//! Script-aware tokenization of raw lines into token streams.

use crate::errors::{LangIdError, Result};
use crate::vocab::Vocabulary;

/// Token value marking a boundary reset.
///
/// A `-1` in a token stream means the following character ids are not
/// word-structured: either a CJK character treated as a standalone unit, or a
/// word demoted after exceeding the maximum word length.
pub const BOUNDARY_RESET: i32 = -1;

/// Default cap on the length of a word-structured run, in characters.
pub const DEFAULT_MAX_WORD_LEN: usize = 32;

/// Returns `true` for code points treated as character-based (CJK-style)
/// script rather than word-based script.
pub const fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FEF          // CJK Unified Ideographs
        | 0x3400..=0x4DBF        // CJK Unified Ideographs Extension A
        | 0x20000..=0x2A6DF      // CJK Unified Ideographs Extension B
        | 0x2A700..=0x2B73F      // CJK Unified Ideographs Extension C
        | 0x2B740..=0x2B81F      // CJK Unified Ideographs Extension D
        | 0x2B820..=0x2CEAF      // CJK Unified Ideographs Extension E
        | 0x2CEB0..=0x2EBEF      // CJK Unified Ideographs Extension F
        | 0x3007..=0x30FF        // CJK symbols, Kana
        | 0xF900..=0xFA6A        // CJK Compatibility Ideographs
        | 0xFF5F..=0xFF9F        // Halfwidth forms
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Space,
    InWord,
    InCjk,
}

/// Converts raw UTF-8 lines into token streams.
///
/// The tokenizer is a three-state machine over code points. Word-based runs
/// are prefixed with the [`WORD_SYMBOL`](crate::vocab::WORD_SYMBOL) sentinel;
/// CJK characters are each prefixed with [`BOUNDARY_RESET`] since they are
/// standalone units. Every character is looked up in the vocabulary with an
/// `UNK` fallback, so tokenization is a pure function of the line and the
/// vocabulary.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    max_word_len: usize,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self {
            max_word_len: DEFAULT_MAX_WORD_LEN,
        }
    }
}

impl Tokenizer {
    /// Creates a tokenizer with an explicit word-length cap.
    ///
    /// # Errors
    ///
    /// [`LangIdError::InvalidArgument`] is returned if `max_word_len` is zero.
    pub fn new(max_word_len: usize) -> Result<Self> {
        if max_word_len == 0 {
            return Err(LangIdError::invalid_argument("max_word_len", "must be >= 1"));
        }
        Ok(Self { max_word_len })
    }

    /// Tokenizes one line into a token stream.
    ///
    /// When a word-structured run grows past the configured cap, the
    /// `WORD_SYMBOL` originally emitted for the run is overwritten with
    /// [`BOUNDARY_RESET`], demoting the whole run to standalone characters
    /// without truncating content.
    ///
    /// # Errors
    ///
    /// [`LangIdError::Validation`] is returned if the overflow demotion finds
    /// something other than `WORD_SYMBOL` in the slot it is about to
    /// overwrite. That indicates a logic error, not bad input.
    pub fn tokenize(&self, line: &str, vocab: &Vocabulary) -> Result<Vec<i32>> {
        let word_symbol = vocab.word_symbol() as i32;
        let mut out = Vec::with_capacity(line.len());
        let mut state = ScanState::Space;
        // Length of the current word run, tracked only when the run opened
        // with a WORD_SYMBOL that overflow may need to overwrite.
        let mut word_len = 0;
        let mut tracked = false;
        let mut buf = [0; 4];
        for c in line.chars() {
            if c.is_whitespace() {
                state = ScanState::Space;
                continue;
            }
            let id = vocab.get_or_unk(c.encode_utf8(&mut buf)) as i32;
            if is_cjk(c) {
                out.push(BOUNDARY_RESET);
                out.push(id);
                state = ScanState::InCjk;
                continue;
            }
            match state {
                ScanState::Space => {
                    out.push(word_symbol);
                    tracked = true;
                    word_len = 0;
                }
                ScanState::InCjk => {
                    // A word-based character glued to a CJK run gets no
                    // sentinel and stays a standalone unit.
                    tracked = false;
                    word_len = 0;
                }
                ScanState::InWord => {}
            }
            state = ScanState::InWord;
            out.push(id);
            word_len += 1;
            if tracked && word_len == self.max_word_len + 1 {
                let pos = out.len() - word_len - 1;
                if out[pos] != word_symbol {
                    return Err(LangIdError::validation(format!(
                        "expected WORD_SYMBOL at position {pos} while demoting an overlong word"
                    )));
                }
                out[pos] = BOUNDARY_RESET;
            }
        }
        Ok(out)
    }
}
