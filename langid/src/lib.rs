//! # Langid
//!
//! Langid is a hierarchical streaming language identifier. Input text is
//! tokenized into a script-aware character-id stream, chunked into
//! fixed-capacity segments, and classified segment by segment with recurrent
//! state threaded across the sentence, stopping as soon as the prediction is
//! confident.
//!
//! ## Examples
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::{prelude::*, stdin, BufReader};
//!
//! use langid::{Checkpoint, LinearScorer, StreamingClassifier, Tokenizer};
//!
//! let mut f = BufReader::new(File::open("checkpoint.bin").unwrap());
//! let checkpoint = Checkpoint::read(&mut f).unwrap();
//! let mut scorer = LinearScorer::new(checkpoint.params, 0.0).unwrap();
//! let tokenizer = Tokenizer::default();
//! let classifier = StreamingClassifier::default();
//!
//! for line in stdin().lock().lines() {
//!     let tokens = tokenizer.tokenize(&line.unwrap(), &checkpoint.vocab).unwrap();
//!     let p = classifier
//!         .classify(&mut scorer, &checkpoint.vocab, &tokens, 64)
//!         .unwrap();
//!     println!("{} {}", checkpoint.labels.name(p.label).unwrap(), p.probability);
//! }
//! ```

mod checkpoint;
mod classifier;
mod dataset;
mod encoder;
pub mod errors;
mod linear;
mod metrics;
mod scorer;
mod segment;
mod tokenizer;
mod trainer;
mod vocab;

pub use checkpoint::{Checkpoint, ModelConfig};
pub use classifier::{
    Prediction, StreamingClassifier, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_SEGMENT_CAP,
};
pub use dataset::{
    label_from_path, read_dataset, read_documents, scan_characters, scan_labels, Dataset,
};
pub use encoder::{encode_segment, SentenceEncoding};
pub use linear::{LinearScorer, NodeId, ScorerParams, MAX_WORD_ENCODE_LEN};
pub use metrics::{f1, F1Counters};
pub use scorer::{ClassDistribution, RecurrentState, Scorer, SentenceState};
pub use segment::{segments, Segment, SegmentUnit, SegmentationStyle};
pub use tokenizer::{is_cjk, Tokenizer, BOUNDARY_RESET, DEFAULT_MAX_WORD_LEN};
pub use trainer::{EpochStats, Trainer, SHUFFLE_SEED};
pub use vocab::{LabelSet, Vocabulary, SEG_SYMBOL, UNK, WORD_SYMBOL};
