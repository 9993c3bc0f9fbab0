//! Incremental classification with early exit.

use crate::encoder::SentenceEncoding;
use crate::errors::{LangIdError, Result};
use crate::scorer::Scorer;
use crate::segment::{segments, SegmentationStyle};
use crate::vocab::Vocabulary;

/// Confidence above which classification stops.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.9999;

/// Hard cap on the number of segments processed for one input.
pub const DEFAULT_SEGMENT_CAP: usize = 64;

/// Index and log-probability of the most probable class.
pub(crate) fn argmax(log_probs: &[f32]) -> (usize, f32) {
    let mut best = 0;
    let mut best_lp = f32::NEG_INFINITY;
    for (i, &lp) in log_probs.iter().enumerate() {
        if lp > best_lp {
            best = i;
            best_lp = lp;
        }
    }
    (best, best_lp)
}

/// Result of an incremental classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Predicted label id.
    pub label: u32,

    /// Probability of the predicted label at the last processed segment.
    pub probability: f32,

    /// Number of segments processed before stopping.
    pub segments_read: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Running,
    Done,
}

/// Early-exit streaming classifier.
///
/// Processes a sentence's segments in order and stops as soon as the
/// prediction is confident enough, the segment cap is reached, or the input
/// is exhausted. Confident short inputs terminate early; long ambiguous
/// inputs are bounded by the cap.
#[derive(Debug, Clone)]
pub struct StreamingClassifier {
    confidence_threshold: f32,
    segment_cap: usize,
}

impl Default for StreamingClassifier {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            segment_cap: DEFAULT_SEGMENT_CAP,
        }
    }
}

impl StreamingClassifier {
    /// Creates a classifier with explicit exit parameters.
    ///
    /// # Errors
    ///
    /// [`LangIdError::InvalidArgument`] if the threshold is outside `(0, 1]`
    /// or the cap is zero.
    pub fn new(confidence_threshold: f32, segment_cap: usize) -> Result<Self> {
        if !(confidence_threshold > 0.0 && confidence_threshold <= 1.0) {
            return Err(LangIdError::invalid_argument(
                "confidence_threshold",
                "must be in (0, 1]",
            ));
        }
        if segment_cap == 0 {
            return Err(LangIdError::invalid_argument("segment_cap", "must be >= 1"));
        }
        Ok(Self {
            confidence_threshold,
            segment_cap,
        })
    }

    /// Classifies one token stream incrementally.
    ///
    /// # Errors
    ///
    /// [`LangIdError::Validation`] if the stream yields zero segments; at
    /// least one segment must be processed before a class is reported.
    pub fn classify<S: Scorer>(
        &self,
        scorer: &mut S,
        vocab: &Vocabulary,
        tokens: &[i32],
        seg_len: usize,
    ) -> Result<Prediction> {
        let style = SegmentationStyle::detect(tokens, vocab.word_symbol());
        let segs = segments(tokens, seg_len, style, vocab.word_symbol())?;
        if segs.is_empty() {
            return Err(LangIdError::validation(
                "cannot classify an empty token stream",
            ));
        }
        let total = segs.len();
        let mut encoding = SentenceEncoding::new(scorer, segs, vocab.seg_symbol());

        let mut machine = RunState::Running;
        let mut read = 0;
        let mut last = None;
        while machine == RunState::Running {
            let (_, dist) = match encoding.next() {
                Some(item) => item?,
                None => break,
            };
            read += 1;
            let (label, log_prob) = argmax(&dist);
            let probability = log_prob.exp();
            last = Some(Prediction {
                label: label as u32,
                probability,
                segments_read: read,
            });
            if probability > self.confidence_threshold
                || read >= self.segment_cap
                || read == total
            {
                machine = RunState::Done;
            }
        }
        drop(encoding);
        scorer.clear();
        last.ok_or_else(|| LangIdError::validation("no segment was processed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::{LinearScorer, ScorerParams};
    use crate::tokenizer::Tokenizer;
    use crate::vocab::Vocabulary;

    fn vocab() -> Vocabulary {
        Vocabulary::new("ab你好".chars().map(|c| c.to_string())).unwrap()
    }

    fn scorer(vocab: &Vocabulary) -> LinearScorer {
        let params = ScorerParams::init(vocab.len() as u32, 8, 1, 2);
        LinearScorer::new(params, 0.0).unwrap()
    }

    #[test]
    fn test_empty_stream_is_rejected() {
        let v = vocab();
        let mut s = scorer(&v);
        let c = StreamingClassifier::default();
        assert!(matches!(
            c.classify(&mut s, &v, &[], 8),
            Err(LangIdError::Validation(_))
        ));
    }

    #[test]
    fn test_exhaustion_processes_all_segments() {
        let v = vocab();
        let mut s = scorer(&v);
        // Fresh parameters are far from confident, so the exit must come
        // from exhaustion.
        let toks = Tokenizer::default().tokenize("你好你好你好", &v).unwrap();
        let c = StreamingClassifier::default();
        let p = c.classify(&mut s, &v, &toks, 3).unwrap();
        assert_eq!(3, p.segments_read);
        assert!(p.probability > 0.0 && p.probability <= 1.0);
    }

    #[test]
    fn test_segment_cap_bounds_work() {
        let v = vocab();
        let mut s = scorer(&v);
        let line: String = "你好".chars().cycle().take(40).collect();
        let toks = Tokenizer::default().tokenize(&line, &v).unwrap();
        // 40 standalone characters with seg_len 2 give 40 segments.
        let c = StreamingClassifier::new(1.0, 10).unwrap();
        let p = c.classify(&mut s, &v, &toks, 2).unwrap();
        assert_eq!(10, p.segments_read);
    }

    #[test]
    fn test_confident_input_exits_on_first_segment() {
        let v = vocab();
        let mut s = scorer(&v);
        // A threshold of ~0 makes any distribution confident enough.
        let c = StreamingClassifier::new(1e-6, 64).unwrap();
        let toks = Tokenizer::default().tokenize("你好你好你好", &v).unwrap();
        let p = c.classify(&mut s, &v, &toks, 3).unwrap();
        assert_eq!(1, p.segments_read);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(StreamingClassifier::new(0.0, 64).is_err());
        assert!(StreamingClassifier::new(1.1, 64).is_err());
        assert!(StreamingClassifier::new(0.5, 0).is_err());
    }

    #[test]
    fn test_argmax() {
        assert_eq!((1, -0.1), argmax(&[-2.0, -0.1, -3.0]));
        assert_eq!((0, -1.0), argmax(&[-1.0, -1.0]));
    }
}
