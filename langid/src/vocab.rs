//! Bidirectional string/id mappings for characters and language classes.

use bincode::{
    de::{BorrowDecoder, Decoder},
    enc::Encoder,
    error::{DecodeError, EncodeError},
    BorrowDecode, Decode, Encode,
};
use hashbrown::HashMap;

use crate::errors::{LangIdError, Result};

/// Entry substituted for characters absent from the vocabulary.
pub const UNK: &str = "<unk>";

/// Sentinel entry marking the start of a word-structured run.
pub const WORD_SYMBOL: &str = "<word>";

/// Sentinel entry marking the start of a segment.
pub const SEG_SYMBOL: &str = "<seg>";

/// Character vocabulary.
///
/// Maps each known character to a dense integer id and back. The reserved
/// [`UNK`], [`WORD_SYMBOL`], and [`SEG_SYMBOL`] entries are appended after the
/// corpus-derived entries, so ids are stable for a given entry list. The
/// vocabulary is built once before training and is immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    ids: HashMap<String, u32>,
    keys: Vec<String>,
    unk: u32,
    word_symbol: u32,
    seg_symbol: u32,
}

impl Vocabulary {
    /// Creates a new vocabulary from corpus-derived entries.
    ///
    /// The reserved entries are appended automatically and must not appear in
    /// `entries`.
    ///
    /// # Errors
    ///
    /// [`LangIdError::InvalidArgument`] is returned if `entries` contains a
    /// duplicate or a reserved entry.
    pub fn new<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut keys: Vec<String> = entries.into_iter().map(Into::into).collect();
        for key in &keys {
            if key == UNK || key == WORD_SYMBOL || key == SEG_SYMBOL {
                return Err(LangIdError::invalid_argument(
                    "entries",
                    format!("contains the reserved entry {key}"),
                ));
            }
        }
        keys.push(UNK.to_string());
        keys.push(WORD_SYMBOL.to_string());
        keys.push(SEG_SYMBOL.to_string());
        Self::from_keys(keys)
    }

    fn from_keys(keys: Vec<String>) -> Result<Self> {
        let mut ids = HashMap::with_capacity(keys.len());
        for (id, key) in keys.iter().enumerate() {
            let id = u32::try_from(id).map_err(|_| {
                LangIdError::invalid_argument("entries", "number of entries exceeds u32::MAX")
            })?;
            if ids.insert(key.clone(), id).is_some() {
                return Err(LangIdError::invalid_argument(
                    "entries",
                    format!("contains a duplicate entry {key}"),
                ));
            }
        }
        let reserved = |key: &str| {
            ids.get(key).copied().ok_or_else(|| {
                LangIdError::invalid_model(format!("vocabulary is missing the reserved entry {key}"))
            })
        };
        let unk = reserved(UNK)?;
        let word_symbol = reserved(WORD_SYMBOL)?;
        let seg_symbol = reserved(SEG_SYMBOL)?;
        Ok(Self {
            ids,
            keys,
            unk,
            word_symbol,
            seg_symbol,
        })
    }

    /// Looks up the id of an entry.
    pub fn get(&self, key: &str) -> Option<u32> {
        self.ids.get(key).copied()
    }

    /// Looks up the id of an entry, falling back to the `UNK` id.
    pub fn get_or_unk(&self, key: &str) -> u32 {
        self.ids.get(key).copied().unwrap_or(self.unk)
    }

    /// Returns the entry for a given id.
    pub fn key(&self, id: u32) -> Option<&str> {
        self.keys.get(id as usize).map(String::as_str)
    }

    /// Number of entries, reserved ones included.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Id of the [`UNK`] entry.
    pub fn unk_id(&self) -> u32 {
        self.unk
    }

    /// Id of the [`WORD_SYMBOL`] sentinel.
    pub fn word_symbol(&self) -> u32 {
        self.word_symbol
    }

    /// Id of the [`SEG_SYMBOL`] sentinel.
    pub fn seg_symbol(&self) -> u32 {
        self.seg_symbol
    }
}

impl Encode for Vocabulary {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        Encode::encode(&self.keys, encoder)
    }
}

impl<Context> Decode<Context> for Vocabulary {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let keys: Vec<String> = Decode::decode(decoder)?;
        Self::from_keys(keys).map_err(|_| {
            DecodeError::OtherString("vocabulary is missing a reserved entry".to_string())
        })
    }
}

impl<'de, Context> BorrowDecode<'de, Context> for Vocabulary {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        Decode::decode(decoder)
    }
}

/// Language-class label set.
///
/// One entry per distinct label discovered in the training corpus. Unlike
/// [`Vocabulary`], repeated names are collapsed instead of rejected, since
/// several corpus files may share a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    ids: HashMap<String, u32>,
    names: Vec<String>,
}

impl LabelSet {
    /// Creates a label set from discovered label names, collapsing duplicates.
    ///
    /// # Errors
    ///
    /// [`LangIdError::InvalidArgument`] is returned if `names` is empty.
    pub fn new<I>(names: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut ids = HashMap::new();
        let mut unique = vec![];
        for name in names {
            let name: String = name.into();
            if !ids.contains_key(&name) {
                ids.insert(name.clone(), unique.len() as u32);
                unique.push(name);
            }
        }
        if unique.is_empty() {
            return Err(LangIdError::invalid_argument("names", "is empty"));
        }
        Ok(Self { ids, names: unique })
    }

    /// Looks up the id of a label.
    pub fn get(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    /// Returns the label name for a given id.
    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    /// Number of distinct labels.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Encode for LabelSet {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        Encode::encode(&self.names, encoder)
    }
}

impl<Context> Decode<Context> for LabelSet {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let names: Vec<String> = Decode::decode(decoder)?;
        Self::new(names).map_err(|_| DecodeError::OtherString("label set is empty".to_string()))
    }
}

impl<'de, Context> BorrowDecode<'de, Context> for LabelSet {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        Decode::decode(decoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_reserved_ids() {
        let v = Vocabulary::new(["a", "b", "你"]).unwrap();
        assert_eq!(6, v.len());
        assert_eq!(Some(0), v.get("a"));
        assert_eq!(Some(2), v.get("你"));
        assert_eq!(3, v.unk_id());
        assert_eq!(4, v.word_symbol());
        assert_eq!(5, v.seg_symbol());
        assert_eq!(Some("b"), v.key(1));
    }

    #[test]
    fn test_vocabulary_unk_fallback() {
        let v = Vocabulary::new(["a"]).unwrap();
        assert_eq!(v.unk_id(), v.get_or_unk("z"));
        assert_eq!(0, v.get_or_unk("a"));
    }

    #[test]
    fn test_vocabulary_rejects_duplicates() {
        assert!(Vocabulary::new(["a", "a"]).is_err());
        assert!(Vocabulary::new(["a", UNK]).is_err());
    }

    #[test]
    fn test_vocabulary_bincode_roundtrip() {
        let v = Vocabulary::new(["a", "b", "好"]).unwrap();
        let config = bincode::config::standard();
        let bytes = bincode::encode_to_vec(&v, config).unwrap();
        let (decoded, _): (Vocabulary, usize) =
            bincode::decode_from_slice(&bytes, config).unwrap();
        assert_eq!(v, decoded);
        assert_eq!(v.word_symbol(), decoded.word_symbol());
    }

    #[test]
    fn test_vocabulary_without_reserved_entries_fails_decode() {
        let config = bincode::config::standard();
        let bytes = bincode::encode_to_vec(vec!["a".to_string()], config).unwrap();
        let decoded: Result<(Vocabulary, usize), _> = bincode::decode_from_slice(&bytes, config);
        assert!(decoded.is_err());
    }

    #[test]
    fn test_vocabulary_borrow_decode_roundtrip() {
        let v = Vocabulary::new(["a", "b"]).unwrap();
        let config = bincode::config::standard();
        let bytes = bincode::encode_to_vec(&v, config).unwrap();
        let (decoded, _): (Vocabulary, usize) =
            bincode::borrow_decode_from_slice(&bytes, config).unwrap();
        assert_eq!(v, decoded);
    }

    #[test]
    fn test_label_set_collapses_duplicates() {
        let l = LabelSet::new(["eng.latn.web", "cmn.hans.web", "eng.latn.web"]).unwrap();
        assert_eq!(2, l.len());
        assert_eq!(Some(0), l.get("eng.latn.web"));
        assert_eq!(Some("cmn.hans.web"), l.name(1));
    }

    #[test]
    fn test_label_set_rejects_empty() {
        assert!(LabelSet::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_label_set_bincode_roundtrip() {
        let l = LabelSet::new(["a.b.c", "d.e.f"]).unwrap();
        let config = bincode::config::standard();
        let bytes = bincode::encode_to_vec(&l, config).unwrap();
        let (decoded, _): (LabelSet, usize) =
            bincode::decode_from_slice(&bytes, config).unwrap();
        assert_eq!(l, decoded);
    }
}
