//! Model checkpoint serialization.

use std::io::{Read, Write};

use bincode::{Decode, Encode};

use crate::errors::{LangIdError, Result};
use crate::linear::ScorerParams;
use crate::vocab::{LabelSet, Vocabulary};

/// Architecture hyperparameters recorded alongside the parameters, so a
/// checkpoint is self-describing.
#[derive(Debug, Clone, PartialEq, Eq, Decode, Encode)]
pub struct ModelConfig {
    pub hidden_dim: u32,
    pub word_layers: u32,
    pub word_heads: u32,
    pub seg_layers: u32,
    pub seg_heads: u32,
    pub sent_layers: u32,
}

/// Everything needed to resume training or run inference.
#[derive(Debug, Clone, Decode, Encode)]
pub struct Checkpoint {
    /// Number of optimizer steps taken when the checkpoint was written.
    pub iteration: u64,

    pub config: ModelConfig,
    pub labels: LabelSet,
    pub vocab: Vocabulary,
    pub params: ScorerParams,
}

impl Checkpoint {
    /// Exports the checkpoint.
    ///
    /// Users can compress the resulting data.
    ///
    /// # Errors
    ///
    /// When bincode generates an error, it returns [`LangIdError::EncodeError`].
    pub fn write<W>(&self, mut wtr: W) -> Result<()>
    where
        W: Write,
    {
        bincode::encode_into_std_write(self, &mut wtr, bincode::config::standard())?;
        Ok(())
    }

    /// Creates a checkpoint from a reader.
    ///
    /// # Errors
    ///
    /// When bincode generates an error, it returns [`LangIdError::DecodeError`];
    /// an internally inconsistent checkpoint returns
    /// [`LangIdError::InvalidModel`].
    pub fn read<R>(mut rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let checkpoint: Self =
            bincode::decode_from_std_read(&mut rdr, bincode::config::standard())?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    fn validate(&self) -> Result<()> {
        self.params.validate()?;
        if self.params.hidden_dim() != self.config.hidden_dim {
            return Err(LangIdError::invalid_model(
                "checkpoint hidden dimension disagrees with its parameters",
            ));
        }
        if self.params.sent_layers() != self.config.sent_layers {
            return Err(LangIdError::invalid_model(
                "checkpoint layer count disagrees with its parameters",
            ));
        }
        if self.params.vocab_size() as usize != self.vocab.len() {
            return Err(LangIdError::invalid_model(
                "checkpoint vocabulary disagrees with its parameters",
            ));
        }
        if self.params.num_classes() as usize != self.labels.len() {
            return Err(LangIdError::invalid_model(
                "checkpoint label set disagrees with its parameters",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint() -> Checkpoint {
        let vocab = Vocabulary::new(["a", "b", "你"]).unwrap();
        let labels = LabelSet::new(["eng.latn.web", "cmn.hans.web"]).unwrap();
        let params = ScorerParams::init(vocab.len() as u32, 8, 2, labels.len() as u32);
        Checkpoint {
            iteration: 42,
            config: ModelConfig {
                hidden_dim: 8,
                word_layers: 2,
                word_heads: 8,
                seg_layers: 2,
                seg_heads: 8,
                sent_layers: 2,
            },
            labels,
            vocab,
            params,
        }
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let original = checkpoint();
        let mut buf = vec![];
        original.write(&mut buf).unwrap();
        let decoded = Checkpoint::read(buf.as_slice()).unwrap();
        assert_eq!(original.iteration, decoded.iteration);
        assert_eq!(original.config, decoded.config);
        assert_eq!(original.labels, decoded.labels);
        assert_eq!(original.vocab, decoded.vocab);
        assert_eq!(original.params, decoded.params);
    }

    #[test]
    fn test_inconsistent_checkpoint_is_rejected() {
        let mut broken = checkpoint();
        broken.config.hidden_dim = 16;
        let mut buf = vec![];
        broken.write(&mut buf).unwrap();
        assert!(matches!(
            Checkpoint::read(buf.as_slice()),
            Err(LangIdError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_truncated_checkpoint_is_rejected() {
        let mut buf = vec![];
        checkpoint().write(&mut buf).unwrap();
        buf.truncate(buf.len() / 2);
        assert!(matches!(
            Checkpoint::read(buf.as_slice()),
            Err(LangIdError::DecodeError(_))
        ));
    }
}
