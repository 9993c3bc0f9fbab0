//! Reference [`Scorer`] backend.
//!
//! Keeps every transform linear or elementwise-gated so that reverse-mode
//! gradients can be written by hand and stay exact: learned character
//! embeddings, mean-pooled word and segment encoders, a per-layer gated
//! recurrent blend with a `(hidden, memory)` pair, and a linear +
//! log-softmax classification head. Forward values are computed eagerly on
//! an op tape; [`backpropagate`](Scorer::backpropagate) walks the tape in
//! reverse and [`optimize`](Scorer::optimize) applies plain SGD.

use bincode::{Decode, Encode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::errors::{LangIdError, Result};
use crate::scorer::{RecurrentState, Scorer};

/// Upper bound on the number of character ids the word sub-encoder accepts.
pub const MAX_WORD_ENCODE_LEN: usize = 32;

const INIT_SEED: u64 = 0x5eed;
const DROPOUT_SEED: u64 = 0xd0_07;
const INIT_SCALE: f32 = 0.1;

/// Learned parameters of the reference scorer.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct ScorerParams {
    hidden_dim: u32,
    vocab_size: u32,
    num_classes: u32,
    sent_layers: u32,
    embeddings: Vec<f32>,
    gates: Vec<f32>,
    output_weight: Vec<f32>,
    output_bias: Vec<f32>,
}

impl ScorerParams {
    /// Initializes parameters with a fixed-seed uniform distribution.
    pub fn init(vocab_size: u32, hidden_dim: u32, sent_layers: u32, num_classes: u32) -> Self {
        let mut rng = StdRng::seed_from_u64(INIT_SEED);
        let dim = hidden_dim as usize;
        let embeddings = (0..vocab_size as usize * dim)
            .map(|_| rng.gen_range(-INIT_SCALE..INIT_SCALE))
            .collect();
        let gates = vec![0.0; sent_layers as usize * dim];
        let output_weight = (0..num_classes as usize * dim)
            .map(|_| rng.gen_range(-INIT_SCALE..INIT_SCALE))
            .collect();
        let output_bias = vec![0.0; num_classes as usize];
        Self {
            hidden_dim,
            vocab_size,
            num_classes,
            sent_layers,
            embeddings,
            gates,
            output_weight,
            output_bias,
        }
    }

    pub fn hidden_dim(&self) -> u32 {
        self.hidden_dim
    }

    pub fn vocab_size(&self) -> u32 {
        self.vocab_size
    }

    pub fn num_classes(&self) -> u32 {
        self.num_classes
    }

    pub fn sent_layers(&self) -> u32 {
        self.sent_layers
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let dim = self.hidden_dim as usize;
        if self.embeddings.len() != self.vocab_size as usize * dim
            || self.gates.len() != self.sent_layers as usize * dim
            || self.output_weight.len() != self.num_classes as usize * dim
            || self.output_bias.len() != self.num_classes as usize
        {
            return Err(LangIdError::invalid_model(
                "scorer parameter lengths do not match the recorded dimensions",
            ));
        }
        Ok(())
    }
}

/// Handle to a node on the scorer's tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

#[derive(Debug)]
enum Op {
    Zeros,
    Embed(u32),
    MeanPool(Vec<NodeId>),
    Blend {
        layer: usize,
        memory: NodeId,
        input: NodeId,
    },
    Tanh(NodeId),
    Add(NodeId, NodeId),
    Dropout {
        input: NodeId,
        mask: Vec<f32>,
    },
    Classify(NodeId),
}

#[derive(Debug)]
struct ParamGrads {
    embeddings: Vec<f32>,
    gates: Vec<f32>,
    output_weight: Vec<f32>,
    output_bias: Vec<f32>,
}

impl ParamGrads {
    fn zeroed(params: &ScorerParams) -> Self {
        Self {
            embeddings: vec![0.0; params.embeddings.len()],
            gates: vec![0.0; params.gates.len()],
            output_weight: vec![0.0; params.output_weight.len()],
            output_bias: vec![0.0; params.output_bias.len()],
        }
    }
}

/// The reference scorer.
pub struct LinearScorer {
    params: ScorerParams,
    grads: ParamGrads,
    ops: Vec<Op>,
    values: Vec<Vec<f32>>,
    training: bool,
    dropout: f32,
    rng: StdRng,
}

impl LinearScorer {
    /// Wraps parameters into a scorer.
    ///
    /// # Errors
    ///
    /// [`LangIdError::InvalidArgument`] if `dropout` is outside `[0, 1)`;
    /// [`LangIdError::InvalidModel`] if the parameter vector lengths do not
    /// match the recorded dimensions.
    pub fn new(params: ScorerParams, dropout: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&dropout) {
            return Err(LangIdError::invalid_argument(
                "dropout",
                "must be in [0, 1)",
            ));
        }
        params.validate()?;
        let grads = ParamGrads::zeroed(&params);
        Ok(Self {
            params,
            grads,
            ops: vec![],
            values: vec![],
            training: false,
            dropout,
            rng: StdRng::seed_from_u64(DROPOUT_SEED),
        })
    }

    /// The current parameters, e.g. for checkpointing.
    pub fn params(&self) -> &ScorerParams {
        &self.params
    }

    fn dim(&self) -> usize {
        self.params.hidden_dim as usize
    }

    fn push(&mut self, op: Op, value: Vec<f32>) -> NodeId {
        let id = NodeId(self.ops.len());
        self.ops.push(op);
        self.values.push(value);
        id
    }

    fn embedding_row(&self, id: u32) -> &[f32] {
        let dim = self.dim();
        let base = id as usize * dim;
        &self.params.embeddings[base..base + dim]
    }

    fn mean_pool(&mut self, inputs: Vec<NodeId>) -> NodeId {
        let dim = self.dim();
        let mut value = vec![0.0; dim];
        for &inp in &inputs {
            for (v, x) in value.iter_mut().zip(&self.values[inp.0]) {
                *v += *x;
            }
        }
        let w = 1.0 / inputs.len() as f32;
        for v in &mut value {
            *v *= w;
        }
        self.push(Op::MeanPool(inputs), value)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn add_grad(grads: &mut [Option<Vec<f32>>], node: NodeId, contrib: &[f32]) {
    let slot = grads[node.0].get_or_insert_with(|| vec![0.0; contrib.len()]);
    for (s, c) in slot.iter_mut().zip(contrib) {
        *s += *c;
    }
}

impl Scorer for LinearScorer {
    type Node = NodeId;

    fn num_classes(&self) -> usize {
        self.params.num_classes as usize
    }

    fn sent_layers(&self) -> usize {
        self.params.sent_layers as usize
    }

    fn zeros(&mut self) -> NodeId {
        let dim = self.dim();
        self.push(Op::Zeros, vec![0.0; dim])
    }

    fn embed(&mut self, id: u32) -> NodeId {
        let value = self.embedding_row(id).to_vec();
        self.push(Op::Embed(id), value)
    }

    fn encode_word(&mut self, ids: &[u32]) -> Result<NodeId> {
        if ids.is_empty() || ids.len() > MAX_WORD_ENCODE_LEN {
            return Err(LangIdError::validation(format!(
                "word sub-encoder got {} ids, expected 1..={MAX_WORD_ENCODE_LEN}",
                ids.len()
            )));
        }
        let chars: Vec<NodeId> = ids.iter().map(|&id| self.embed(id)).collect();
        Ok(self.mean_pool(chars))
    }

    fn encode_segment(&mut self, units: &[NodeId]) -> NodeId {
        let pooled = self.mean_pool(units.to_vec());
        if self.training && self.dropout > 0.0 {
            let keep = 1.0 / (1.0 - self.dropout);
            let mask: Vec<f32> = (0..self.dim())
                .map(|_| {
                    if self.rng.gen::<f32>() < self.dropout {
                        0.0
                    } else {
                        keep
                    }
                })
                .collect();
            let value: Vec<f32> = self.values[pooled.0]
                .iter()
                .zip(&mask)
                .map(|(v, m)| v * m)
                .collect();
            self.push(
                Op::Dropout {
                    input: pooled,
                    mask,
                },
                value,
            )
        } else {
            pooled
        }
    }

    fn recurrent_step(
        &mut self,
        layer: usize,
        state: &RecurrentState<NodeId>,
        input: NodeId,
    ) -> (NodeId, RecurrentState<NodeId>) {
        let dim = self.dim();
        let base = layer * dim;
        let mut memory_value = vec![0.0; dim];
        for d in 0..dim {
            let a = sigmoid(self.params.gates[base + d]);
            memory_value[d] =
                a * self.values[state.memory.0][d] + (1.0 - a) * self.values[input.0][d];
        }
        let memory = self.push(
            Op::Blend {
                layer,
                memory: state.memory,
                input,
            },
            memory_value,
        );
        let hidden_value: Vec<f32> = self.values[memory.0].iter().map(|v| v.tanh()).collect();
        let hidden = self.push(Op::Tanh(memory), hidden_value);
        (hidden, RecurrentState { hidden, memory })
    }

    fn residual(&mut self, a: NodeId, b: NodeId) -> NodeId {
        let value: Vec<f32> = self.values[a.0]
            .iter()
            .zip(&self.values[b.0])
            .map(|(x, y)| x + y)
            .collect();
        self.push(Op::Add(a, b), value)
    }

    fn classify(&mut self, input: NodeId) -> NodeId {
        let dim = self.dim();
        let classes = self.num_classes();
        let x = &self.values[input.0];
        let mut z = vec![0.0; classes];
        for (c, zc) in z.iter_mut().enumerate() {
            let base = c * dim;
            let mut acc = self.params.output_bias[c];
            for d in 0..dim {
                acc += self.params.output_weight[base + d] * x[d];
            }
            *zc = acc;
        }
        let max = z.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let lse = max + z.iter().map(|v| (v - max).exp()).sum::<f32>().ln();
        let log_probs: Vec<f32> = z.iter().map(|v| v - lse).collect();
        self.push(Op::Classify(input), log_probs)
    }

    fn log_probs(&self, node: NodeId) -> &[f32] {
        &self.values[node.0]
    }

    fn backpropagate(&mut self, outputs: &[(NodeId, u32)]) -> f32 {
        if outputs.is_empty() {
            return 0.0;
        }
        let dim = self.dim();
        let inv = 1.0 / outputs.len() as f32;
        let mut node_grads: Vec<Option<Vec<f32>>> = vec![None; self.ops.len()];
        let mut loss = 0.0;

        // Seed each classification node with the gradient of the mean NLL
        // with respect to the pre-softmax logits.
        for &(node, gold) in outputs {
            let lp = &self.values[node.0];
            loss -= lp[gold as usize];
            let slot = node_grads[node.0].get_or_insert_with(|| vec![0.0; lp.len()]);
            for (k, g) in slot.iter_mut().enumerate() {
                let indicator = if k == gold as usize { 1.0 } else { 0.0 };
                *g += inv * (lp[k].exp() - indicator);
            }
        }

        for i in (0..self.ops.len()).rev() {
            let Some(g) = node_grads[i].take() else {
                continue;
            };
            match &self.ops[i] {
                Op::Zeros => {}
                Op::Embed(id) => {
                    let base = *id as usize * dim;
                    for (d, gd) in g.iter().enumerate() {
                        self.grads.embeddings[base + d] += gd;
                    }
                }
                Op::MeanPool(inputs) => {
                    let w = 1.0 / inputs.len() as f32;
                    let contrib: Vec<f32> = g.iter().map(|gd| gd * w).collect();
                    for &inp in inputs {
                        add_grad(&mut node_grads, inp, &contrib);
                    }
                }
                Op::Blend {
                    layer,
                    memory,
                    input,
                } => {
                    let base = layer * dim;
                    let mut g_memory = vec![0.0; dim];
                    let mut g_input = vec![0.0; dim];
                    for d in 0..dim {
                        let a = sigmoid(self.params.gates[base + d]);
                        g_memory[d] = g[d] * a;
                        g_input[d] = g[d] * (1.0 - a);
                        let diff = self.values[memory.0][d] - self.values[input.0][d];
                        self.grads.gates[base + d] += g[d] * diff * a * (1.0 - a);
                    }
                    let (memory, input) = (*memory, *input);
                    add_grad(&mut node_grads, memory, &g_memory);
                    add_grad(&mut node_grads, input, &g_input);
                }
                Op::Tanh(x) => {
                    let contrib: Vec<f32> = self.values[i]
                        .iter()
                        .zip(&g)
                        .map(|(y, gd)| gd * (1.0 - y * y))
                        .collect();
                    add_grad(&mut node_grads, *x, &contrib);
                }
                Op::Add(a, b) => {
                    let (a, b) = (*a, *b);
                    add_grad(&mut node_grads, a, &g);
                    add_grad(&mut node_grads, b, &g);
                }
                Op::Dropout { input, mask } => {
                    let contrib: Vec<f32> =
                        g.iter().zip(mask).map(|(gd, m)| gd * m).collect();
                    add_grad(&mut node_grads, *input, &contrib);
                }
                Op::Classify(x) => {
                    let mut g_x = vec![0.0; dim];
                    for (c, gc) in g.iter().enumerate() {
                        self.grads.output_bias[c] += gc;
                        let base = c * dim;
                        for d in 0..dim {
                            self.grads.output_weight[base + d] += gc * self.values[x.0][d];
                            g_x[d] += gc * self.params.output_weight[base + d];
                        }
                    }
                    add_grad(&mut node_grads, *x, &g_x);
                }
            }
        }
        loss * inv
    }

    fn optimize(&mut self, learning_rate: f32) {
        let step = |params: &mut [f32], grads: &mut [f32]| {
            for (p, g) in params.iter_mut().zip(grads.iter_mut()) {
                *p -= learning_rate * *g;
                *g = 0.0;
            }
        };
        step(&mut self.params.embeddings, &mut self.grads.embeddings);
        step(&mut self.params.gates, &mut self.grads.gates);
        step(&mut self.params.output_weight, &mut self.grads.output_weight);
        step(&mut self.params.output_bias, &mut self.grads.output_bias);
    }

    fn clear(&mut self) {
        self.ops.clear();
        self.values.clear();
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer(classes: u32) -> LinearScorer {
        let params = ScorerParams::init(8, 4, 1, classes);
        LinearScorer::new(params, 0.0).unwrap()
    }

    #[test]
    fn test_classify_is_log_distribution() {
        let mut s = scorer(3);
        let e = s.embed(0);
        let seg = s.encode_segment(&[e]);
        let out = s.classify(seg);
        let lp = s.log_probs(out);
        assert_eq!(3, lp.len());
        let total: f32 = lp.iter().map(|v| v.exp()).sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_encode_word_rejects_overlong_input() {
        let mut s = scorer(2);
        let ids = vec![0; MAX_WORD_ENCODE_LEN + 1];
        assert!(s.encode_word(&ids).is_err());
        assert!(s.encode_word(&[]).is_err());
        assert!(s.encode_word(&[0, 1]).is_ok());
    }

    #[test]
    fn test_inference_is_deterministic() {
        let mut s = LinearScorer::new(ScorerParams::init(8, 4, 1, 2), 0.5).unwrap();
        s.set_training(false);
        let a = {
            let e = s.embed(1);
            let seg = s.encode_segment(&[e]);
            let out = s.classify(seg);
            s.log_probs(out).to_vec()
        };
        let b = {
            let e = s.embed(1);
            let seg = s.encode_segment(&[e]);
            let out = s.classify(seg);
            s.log_probs(out).to_vec()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_training_reduces_loss() {
        let mut s = scorer(2);
        s.set_training(true);
        let mut first = None;
        let mut last = 0.0;
        for _ in 0..50 {
            let a = {
                let e = s.embed(0);
                let seg = s.encode_segment(&[e]);
                s.classify(seg)
            };
            let b = {
                let e = s.embed(1);
                let seg = s.encode_segment(&[e]);
                s.classify(seg)
            };
            let loss = s.backpropagate(&[(a, 0), (b, 1)]);
            s.optimize(0.5);
            s.clear();
            first.get_or_insert(loss);
            last = loss;
        }
        assert!(last < first.unwrap());
        assert!(last < 0.1);
    }

    #[test]
    fn test_recurrent_step_updates_state() {
        let mut s = scorer(2);
        let zero = s.zeros();
        let state = RecurrentState {
            hidden: zero,
            memory: zero,
        };
        let input = s.embed(2);
        let (output, new_state) = s.recurrent_step(0, &state, input);
        assert_eq!(output, new_state.hidden);
        assert_ne!(new_state.memory, state.memory);
        assert_eq!(4, s.log_probs(output).len());
    }

    #[test]
    fn test_params_bincode_roundtrip() {
        let params = ScorerParams::init(8, 4, 2, 3);
        let config = bincode::config::standard();
        let bytes = bincode::encode_to_vec(&params, config).unwrap();
        let (decoded, _): (ScorerParams, usize) =
            bincode::decode_from_slice(&bytes, config).unwrap();
        assert_eq!(params, decoded);
    }

    #[test]
    fn test_rejects_bad_dropout() {
        assert!(LinearScorer::new(ScorerParams::init(4, 4, 1, 2), 1.0).is_err());
        assert!(LinearScorer::new(ScorerParams::init(4, 4, 1, 2), -0.1).is_err());
    }
}
