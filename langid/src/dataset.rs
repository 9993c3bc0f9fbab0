//! Corpus directory reading and vocabulary statistics.
//!
//! A corpus is a flat directory with one file per source and one sentence per
//! line. The label of every sentence in a file is derived from the file name.

use std::fs::File;
use std::io::{prelude::*, BufReader};
use std::path::{Path, PathBuf};

use hashbrown::HashMap;

use crate::errors::{LangIdError, Result};
use crate::tokenizer::Tokenizer;
use crate::vocab::{LabelSet, Vocabulary};

/// Labeled token streams ready for training or evaluation.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    sentences: Vec<Vec<i32>>,
    labels: Vec<u32>,
}

impl Dataset {
    /// Builds a dataset from parallel sentence and label vectors.
    ///
    /// # Errors
    ///
    /// [`LangIdError::Validation`] if the two lengths disagree.
    pub fn new(sentences: Vec<Vec<i32>>, labels: Vec<u32>) -> Result<Self> {
        if sentences.len() != labels.len() {
            return Err(LangIdError::validation(format!(
                "sentence/label count mismatch: {} vs {}",
                sentences.len(),
                labels.len()
            )));
        }
        Ok(Self { sentences, labels })
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn sentence(&self, i: usize) -> &[i32] {
        &self.sentences[i]
    }

    pub fn label(&self, i: usize) -> u32 {
        self.labels[i]
    }
}

/// Derives the label of a corpus file from its name.
///
/// The label is the file name up to and including the third dot-delimited
/// component; with fewer than three dots, it is the stem (the name without
/// its final extension).
pub fn label_from_path(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 3 {
        parts[..3].join(".")
    } else if parts.len() > 1 {
        parts[..parts.len() - 1].join(".")
    } else {
        name
    }
}

fn corpus_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = vec![];
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn validate_ratio(ratio: f32) -> Result<()> {
    if !(ratio > 0.0 && ratio <= 1.0) {
        return Err(LangIdError::invalid_argument("ratio", "must be in (0, 1]"));
    }
    Ok(())
}

// Keeps every sentence whose per-file ordinal falls below the sampled share
// of each hundred.
fn sampled(ordinal: usize, ratio: f32) -> bool {
    ((ordinal % 100) as f32) < ratio * 100.0
}

/// Scans a corpus for distinct characters, dropping those with frequency at
/// or below `cutoff`.
///
/// The returned list is sorted, so vocabulary ids are reproducible for a
/// given corpus.
pub fn scan_characters(dir: &Path, cutoff: usize, ratio: f32) -> Result<Vec<String>> {
    validate_ratio(ratio)?;
    let mut freq: HashMap<String, usize> = HashMap::new();
    for path in corpus_files(dir)? {
        let reader = BufReader::new(File::open(&path)?);
        for (i, line) in reader.lines().enumerate() {
            if !sampled(i, ratio) {
                continue;
            }
            for c in line?.chars() {
                if !c.is_whitespace() {
                    *freq.entry(c.to_string()).or_insert(0) += 1;
                }
            }
        }
    }
    let mut chars: Vec<String> = freq
        .into_iter()
        .filter(|&(_, n)| n > cutoff)
        .map(|(c, _)| c)
        .collect();
    chars.sort();
    Ok(chars)
}

/// Discovers the label of every file in a corpus directory.
pub fn scan_labels(dir: &Path) -> Result<Vec<String>> {
    Ok(corpus_files(dir)?
        .iter()
        .map(|path| label_from_path(path))
        .collect())
}

/// Reads a labeled corpus into token streams.
///
/// A file whose derived label is not in `labels` is skipped with a warning;
/// this lets a held-out directory contain extra sources without aborting an
/// evaluation run.
///
/// # Errors
///
/// [`LangIdError::Validation`] if the collected sentence and label counts
/// disagree.
pub fn read_dataset(
    dir: &Path,
    tokenizer: &Tokenizer,
    vocab: &Vocabulary,
    labels: &LabelSet,
    ratio: f32,
) -> Result<Dataset> {
    validate_ratio(ratio)?;
    let mut sentences = vec![];
    let mut sentence_labels = vec![];
    for path in corpus_files(dir)? {
        let name = label_from_path(&path);
        let Some(label) = labels.get(&name) else {
            eprintln!(
                "Warning: skipping {} (label {name} is not in the label set)",
                path.display()
            );
            continue;
        };
        let reader = BufReader::new(File::open(&path)?);
        for (i, line) in reader.lines().enumerate() {
            if !sampled(i, ratio) {
                continue;
            }
            sentences.push(tokenizer.tokenize(&line?, vocab)?);
            sentence_labels.push(label);
        }
    }
    Dataset::new(sentences, sentence_labels)
}

/// Reads each file of a directory as one unlabeled document.
///
/// Lines are joined with single spaces before tokenization, so a document is
/// classified as one long sentence.
pub fn read_documents(
    dir: &Path,
    tokenizer: &Tokenizer,
    vocab: &Vocabulary,
) -> Result<Vec<(PathBuf, Vec<i32>)>> {
    let mut documents = vec![];
    for path in corpus_files(dir)? {
        let reader = BufReader::new(File::open(&path)?);
        let mut merged = String::new();
        for line in reader.lines() {
            merged.push_str(&line?);
            merged.push(' ');
        }
        let tokens = tokenizer.tokenize(&merged, vocab)?;
        documents.push((path, tokens));
    }
    Ok(documents)
}
