//! Token-budgeted epoch runner.
//!
//! One epoch walks every sentence once, packing sentences into batches until
//! the accumulated segment count reaches the budget. Every segment's
//! classification contributes to the batch loss; the metric counters record
//! only the final segment of each sentence, where the whole input has been
//! seen.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::classifier::argmax;
use crate::dataset::Dataset;
use crate::encoder::SentenceEncoding;
use crate::errors::{LangIdError, Result};
use crate::metrics::F1Counters;
use crate::scorer::Scorer;
use crate::segment::{segments, Segment, SegmentationStyle};
use crate::vocab::Vocabulary;

/// Seed of the per-epoch shuffle. Fixed, so every epoch visits sentences in
/// the same order and runs are reproducible.
pub const SHUFFLE_SEED: u64 = 0;

/// Aggregated result of one epoch.
#[derive(Debug, Clone)]
pub struct EpochStats {
    counters: F1Counters,
    loss_sum: f32,
    loss_batches: usize,
    batches: usize,
}

impl EpochStats {
    fn new(num_classes: usize) -> Self {
        Self {
            counters: F1Counters::new(num_classes),
            loss_sum: 0.0,
            loss_batches: 0,
            batches: 0,
        }
    }

    /// Mean batch loss, or 0 when no parameter update ran.
    pub fn mean_loss(&self) -> f32 {
        if self.loss_batches == 0 {
            0.0
        } else {
            self.loss_sum / self.loss_batches as f32
        }
    }

    /// Macro-F1 over the final-segment predictions.
    pub fn macro_f1(&self) -> f64 {
        self.counters.macro_f1()
    }

    /// Accuracy over the final-segment predictions.
    pub fn accuracy(&self) -> f64 {
        self.counters.accuracy()
    }

    /// Number of sentences that produced a prediction.
    pub fn sentences(&self) -> f64 {
        self.counters.total()
    }

    /// Number of batches processed.
    pub fn iterations(&self) -> usize {
        self.batches
    }
}

/// Runs epochs under a segment-count batch budget.
#[derive(Debug, Clone)]
pub struct Trainer {
    batch_size: usize,
    learning_rate: f32,
    seg_len: usize,
}

impl Trainer {
    /// Creates an epoch runner.
    ///
    /// `batch_size` is a budget in segments, not sentences: a batch closes as
    /// soon as its sentences together hold at least this many segments.
    ///
    /// # Errors
    ///
    /// [`LangIdError::InvalidArgument`] if `batch_size` is zero, the learning
    /// rate is not positive, or `seg_len` is below 2.
    pub fn new(batch_size: usize, learning_rate: f32, seg_len: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(LangIdError::invalid_argument("batch_size", "must be >= 1"));
        }
        if !(learning_rate > 0.0) {
            return Err(LangIdError::invalid_argument(
                "learning_rate",
                "must be positive",
            ));
        }
        if seg_len < 2 {
            return Err(LangIdError::invalid_argument("seg_len", "must be >= 2"));
        }
        Ok(Self {
            batch_size,
            learning_rate,
            seg_len,
        })
    }

    /// Runs one pass over `data`, updating parameters when `update` is set.
    ///
    /// With `update`, the sentence order is shuffled with [`SHUFFLE_SEED`]
    /// and each batch ends with a gradient step; without it, sentences are
    /// visited in order and parameters are left untouched. Sentences that
    /// yield no segments are skipped.
    pub fn run_epoch<S: Scorer>(
        &self,
        scorer: &mut S,
        data: &Dataset,
        vocab: &Vocabulary,
        update: bool,
    ) -> Result<EpochStats> {
        scorer.set_training(update);
        let mut order: Vec<usize> = (0..data.len()).collect();
        if update {
            order.shuffle(&mut StdRng::seed_from_u64(SHUFFLE_SEED));
        }

        let mut stats = EpochStats::new(scorer.num_classes());
        let mut batch: Vec<(Vec<Segment>, u32)> = vec![];
        let mut budget = 0;
        for &i in &order {
            let tokens = data.sentence(i);
            let style = SegmentationStyle::detect(tokens, vocab.word_symbol());
            let segs = segments(tokens, self.seg_len, style, vocab.word_symbol())?;
            if segs.is_empty() {
                continue;
            }
            budget += segs.len();
            batch.push((segs, data.label(i)));
            if budget >= self.batch_size {
                self.run_batch(scorer, &mut batch, vocab, update, &mut stats)?;
                budget = 0;
            }
        }
        if !batch.is_empty() {
            self.run_batch(scorer, &mut batch, vocab, update, &mut stats)?;
        }
        scorer.set_training(false);
        Ok(stats)
    }

    fn run_batch<S: Scorer>(
        &self,
        scorer: &mut S,
        batch: &mut Vec<(Vec<Segment>, u32)>,
        vocab: &Vocabulary,
        update: bool,
        stats: &mut EpochStats,
    ) -> Result<()> {
        let mut outputs = vec![];
        for (segs, label) in batch.drain(..) {
            let mut last = None;
            for item in SentenceEncoding::new(scorer, segs, vocab.seg_symbol()) {
                let (node, dist) = item?;
                outputs.push((node, label));
                last = Some(dist);
            }
            if let Some(dist) = last {
                let (predicted, _) = argmax(&dist);
                stats.counters.record(predicted, label as usize);
            }
        }
        if update {
            stats.loss_sum += scorer.backpropagate(&outputs);
            stats.loss_batches += 1;
            scorer.optimize(self.learning_rate);
        }
        scorer.clear();
        stats.batches += 1;
        Ok(())
    }
}
