//! The seam to the learned model.
//!
//! The core pipeline never computes embeddings, attention, recurrence, or
//! gradients itself; it drives an implementation of [`Scorer`] through opaque
//! node handles, issuing calls strictly in dependency order. The reference
//! implementation lives in [`crate::linear`].

use crate::errors::Result;

/// A vector of log-probabilities over the label set.
pub type ClassDistribution = Vec<f32>;

/// Recurrent state of one layer: a `(hidden, memory)` pair of node handles.
#[derive(Debug, Clone, Copy)]
pub struct RecurrentState<N> {
    pub hidden: N,
    pub memory: N,
}

/// Per-sentence recurrent memory, one [`RecurrentState`] per layer.
///
/// Created zeroed at the start of a sentence, replaced wholesale after each
/// segment, and never resized mid-sentence.
#[derive(Debug, Clone)]
pub struct SentenceState<N> {
    layers: Vec<RecurrentState<N>>,
}

impl<N: Copy> SentenceState<N> {
    /// Creates the all-zero state for the start of a sentence.
    pub fn zeroed<S>(scorer: &mut S) -> Self
    where
        S: Scorer<Node = N> + ?Sized,
    {
        let zero = scorer.zeros();
        Self {
            layers: vec![
                RecurrentState {
                    hidden: zero,
                    memory: zero,
                };
                scorer.sent_layers()
            ],
        }
    }

    pub(crate) fn from_layers(layers: Vec<RecurrentState<N>>) -> Self {
        Self { layers }
    }

    /// Number of recurrent layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// State pair of one layer.
    pub fn layer(&self, i: usize) -> &RecurrentState<N> {
        &self.layers[i]
    }
}

/// The learned collaborator driven by the pipeline.
///
/// All methods are synchronous and blocking. Node handles are only valid
/// until the next [`clear`](Scorer::clear); the pipeline clears once per
/// batch (training) or per classified line (streaming).
pub trait Scorer {
    /// Opaque handle to a computed vector.
    type Node: Copy;

    /// Number of classes in the output distribution.
    fn num_classes(&self) -> usize;

    /// Number of recurrent sentence layers.
    fn sent_layers(&self) -> usize;

    /// A zero vector, used for initial recurrent states.
    fn zeros(&mut self) -> Self::Node;

    /// Embedding lookup for one vocabulary id.
    fn embed(&mut self, id: u32) -> Self::Node;

    /// Stateless sub-encoding of one word's character ids.
    ///
    /// # Errors
    ///
    /// Implementations reject words longer than the sub-encoder's bound.
    fn encode_word(&mut self, ids: &[u32]) -> Result<Self::Node>;

    /// Contextual encoding of an ordered unit-vector sequence, returning the
    /// segment representation.
    fn encode_segment(&mut self, units: &[Self::Node]) -> Self::Node;

    /// One step of recurrent layer `layer`, yielding the layer output and the
    /// replacement state pair.
    fn recurrent_step(
        &mut self,
        layer: usize,
        state: &RecurrentState<Self::Node>,
        input: Self::Node,
    ) -> (Self::Node, RecurrentState<Self::Node>);

    /// Element-wise sum used for residual composition between layers.
    fn residual(&mut self, a: Self::Node, b: Self::Node) -> Self::Node;

    /// Projects a vector to class log-probabilities.
    fn classify(&mut self, input: Self::Node) -> Self::Node;

    /// Reads the log-probabilities of a classification node.
    fn log_probs(&self, node: Self::Node) -> &[f32];

    /// Accumulates gradients of the mean negative log-likelihood of the gold
    /// labels over `(classification node, gold id)` pairs, returning the loss.
    fn backpropagate(&mut self, outputs: &[(Self::Node, u32)]) -> f32;

    /// Applies accumulated gradients and resets them.
    fn optimize(&mut self, learning_rate: f32);

    /// Discards all nodes, invalidating outstanding handles.
    fn clear(&mut self);

    /// Toggles training mode (dropout on/off).
    fn set_training(&mut self, training: bool);
}
