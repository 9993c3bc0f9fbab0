//! Hierarchical encoding of segments with threaded sentence state.

use crate::errors::Result;
use crate::scorer::{ClassDistribution, Scorer, SentenceState};
use crate::segment::{Segment, SegmentUnit};

/// Encodes one segment and advances the sentence state.
///
/// The segment-marker embedding is prefixed to the unit vectors (word
/// sub-encodings for [`SegmentUnit::Word`], direct embeddings for
/// [`SegmentUnit::Char`]), the sequence is contextually encoded, and the
/// result is pushed through the recurrent stack with residual composition
/// before classification. Returns the classification node and the
/// replacement state; the caller threads the state into the next call.
pub fn encode_segment<S: Scorer>(
    scorer: &mut S,
    segment: &Segment,
    state: &SentenceState<S::Node>,
    seg_symbol: u32,
) -> Result<(S::Node, SentenceState<S::Node>)> {
    let mut inputs = Vec::with_capacity(segment.len() + 1);
    inputs.push(scorer.embed(seg_symbol));
    for unit in segment.units() {
        let node = match unit {
            SegmentUnit::Word(ids) => scorer.encode_word(ids)?,
            SegmentUnit::Char(id) => scorer.embed(*id),
        };
        inputs.push(node);
    }
    let mut current = scorer.encode_segment(&inputs);

    let mut layers = Vec::with_capacity(state.len());
    for i in 0..state.len() {
        let (output, new_state) = scorer.recurrent_step(i, state.layer(i), current);
        layers.push(new_state);
        current = scorer.residual(current, output);
    }
    let log_probs = scorer.classify(current);
    Ok((log_probs, SentenceState::from_layers(layers)))
}

/// Iterator over a sentence's segments that owns the threaded state.
///
/// Yields one `(classification node, distribution)` pair per segment, in
/// order, starting from the all-zero state. Consumers that stop early (the
/// streaming classifier) simply drop the iterator.
pub struct SentenceEncoding<'a, S: Scorer> {
    scorer: &'a mut S,
    segments: Vec<Segment>,
    state: SentenceState<S::Node>,
    next: usize,
    seg_symbol: u32,
    failed: bool,
}

impl<'a, S: Scorer> SentenceEncoding<'a, S> {
    pub fn new(scorer: &'a mut S, segments: Vec<Segment>, seg_symbol: u32) -> Self {
        let state = SentenceState::zeroed(scorer);
        Self {
            scorer,
            segments,
            state,
            next: 0,
            seg_symbol,
            failed: false,
        }
    }

    /// Total number of segments in the sentence.
    pub fn total(&self) -> usize {
        self.segments.len()
    }

    /// Number of segments not yet encoded.
    pub fn remaining(&self) -> usize {
        self.segments.len() - self.next
    }
}

impl<'a, S: Scorer> Iterator for SentenceEncoding<'a, S> {
    type Item = Result<(S::Node, ClassDistribution)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next >= self.segments.len() {
            return None;
        }
        let segment = &self.segments[self.next];
        match encode_segment(self.scorer, segment, &self.state, self.seg_symbol) {
            Ok((node, new_state)) => {
                self.state = new_state;
                self.next += 1;
                let dist = self.scorer.log_probs(node).to_vec();
                Some(Ok((node, dist)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::{LinearScorer, ScorerParams};
    use crate::segment::{segments, SegmentationStyle};
    use crate::tokenizer::Tokenizer;
    use crate::vocab::Vocabulary;

    fn setup() -> (Vocabulary, LinearScorer) {
        let vocab = Vocabulary::new("abcde你好".chars().map(|c| c.to_string())).unwrap();
        let params = ScorerParams::init(vocab.len() as u32, 8, 2, 3);
        (vocab, LinearScorer::new(params, 0.0).unwrap())
    }

    #[test]
    fn test_one_distribution_per_segment() {
        let (vocab, mut scorer) = setup();
        let toks = Tokenizer::default()
            .tokenize("a b c d e a b", &vocab)
            .unwrap();
        let style = SegmentationStyle::detect(&toks, vocab.word_symbol());
        let segs = segments(&toks, 3, style, vocab.word_symbol()).unwrap();
        let n_segments = segs.len();
        assert_eq!(4, n_segments);
        let encoding = SentenceEncoding::new(&mut scorer, segs, vocab.seg_symbol());
        let outputs: Vec<_> = encoding.map(|r| r.unwrap()).collect();
        assert_eq!(n_segments, outputs.len());
        for (_, dist) in &outputs {
            assert_eq!(3, dist.len());
        }
    }

    #[test]
    fn test_state_starts_zeroed_and_keeps_layer_count() {
        let (vocab, mut scorer) = setup();
        let state = SentenceState::zeroed(&mut scorer);
        assert_eq!(2, state.len());
        for i in 0..state.len() {
            let layer = state.layer(i);
            assert!(scorer.log_probs(layer.hidden).iter().all(|&v| v == 0.0));
            assert!(scorer.log_probs(layer.memory).iter().all(|&v| v == 0.0));
        }
        let toks = Tokenizer::default().tokenize("a b c d", &vocab).unwrap();
        let segs = segments(
            &toks,
            3,
            SegmentationStyle::LatinWord,
            vocab.word_symbol(),
        )
        .unwrap();
        let mut encoding = SentenceEncoding::new(&mut scorer, segs, vocab.seg_symbol());
        while let Some(r) = encoding.next() {
            r.unwrap();
            assert_eq!(2, encoding.state.len());
        }
    }

    #[test]
    fn test_distributions_differ_across_segments() {
        // State threading must make the second segment see the first.
        let (vocab, mut scorer) = setup();
        let toks = Tokenizer::default()
            .tokenize("a b c a b c", &vocab)
            .unwrap();
        let segs = segments(
            &toks,
            4,
            SegmentationStyle::LatinWord,
            vocab.word_symbol(),
        )
        .unwrap();
        assert_eq!(2, segs.len());
        assert_eq!(segs[0], segs[1]);
        let encoding = SentenceEncoding::new(&mut scorer, segs, vocab.seg_symbol());
        let dists: Vec<_> = encoding.map(|r| r.unwrap().1).collect();
        assert_ne!(dists[0], dists[1]);
    }

    #[test]
    fn test_empty_sentence_yields_nothing() {
        let (vocab, mut scorer) = setup();
        let mut encoding = SentenceEncoding::new(&mut scorer, vec![], vocab.seg_symbol());
        assert!(encoding.next().is_none());
        assert_eq!(0, encoding.total());
    }
}
