//! Character Tokenizer
//!
//! Every distinct character of the training corpus is one token. The
//! vocabulary is the sorted set of characters, and a character's id is its
//! rank in that order:
//!
//! ```text
//! corpus:  "to be"
//! vocab:   ' '→0  'b'→1  'e'→2  'o'→3  't'→4
//! encode:  "bet" → [1, 2, 4]
//! ```
//!
//! ## Vocabulary Files
//!
//! The vocabulary is stored as a JSON object mapping each character to its
//! id, e.g. `{" ": 0, "b": 1, ...}`. Loading checks that every key is a single
//! character and that the ids are exactly `0..n`.
//!
//! ## Lookup
//!
//! Both directions are precomputed when the tokenizer is built: a vector for
//! id → char and a hash map for char → id.
//!
//! ## Special Tokens
//!
//! The padding character defaults to a space and has an id only when the
//! corpus contains one. The end-of-text marker [`END_OF_TEXT`] is a string,
//! not a character, so it never has an id in a character vocabulary.

use crate::error::{PuckError, Result};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// End-of-text marker used by the text pipeline
pub const END_OF_TEXT: &str = "|ENDOFTEXT|";

/// Default padding character
pub const DEFAULT_PADDING: char = ' ';

/// Inputs longer than this many bytes are encoded in parallel
const PARALLEL_THRESHOLD: usize = 200_000;

#[derive(Clone, Debug)]
pub struct CharTokenizer {
    /// Id → character
    itos: Vec<char>,
    /// Character → id
    stoi: HashMap<char, usize>,
    padding: char,
}

impl CharTokenizer {
    /// Build a vocabulary from every distinct character in `corpus`
    ///
    /// # Example
    ///
    /// ```rust
    /// # use puck::CharTokenizer;
    /// let tokenizer = CharTokenizer::from_corpus("to be");
    /// assert_eq!(tokenizer.vocab_size(), 5);
    /// assert_eq!(tokenizer.encode("bet").unwrap(), vec![1, 2, 4]);
    /// ```
    pub fn from_corpus(corpus: &str) -> Self {
        let chars: BTreeSet<char> = corpus.chars().collect();
        let itos: Vec<char> = chars.into_iter().collect();
        log::info!("Found {} unique characters", itos.len());
        Self::from_ordered(itos)
    }

    /// Build from a `{character: id}` map
    ///
    /// # Errors
    ///
    /// `Configuration` if a key is not exactly one character or the ids are
    /// not a permutation of `0..n`.
    pub fn from_vocab(vocab: &HashMap<String, usize>) -> Result<Self> {
        let mut slots: Vec<Option<char>> = vec![None; vocab.len()];
        for (token, &id) in vocab {
            let mut chars = token.chars();
            let c = match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => {
                    return Err(PuckError::config(format!(
                        "vocabulary entry {:?} is not a single character",
                        token
                    )))
                }
            };
            match slots.get_mut(id) {
                Some(slot @ None) => *slot = Some(c),
                _ => {
                    return Err(PuckError::config(format!(
                        "vocabulary id {} for {:?} is duplicated or outside [0, {})",
                        id,
                        token,
                        vocab.len()
                    )))
                }
            }
        }

        let itos = slots.into_iter().flatten().collect();
        Ok(Self::from_ordered(itos))
    }

    fn from_ordered(itos: Vec<char>) -> Self {
        let stoi = itos.iter().enumerate().map(|(id, &c)| (c, id)).collect();
        Self {
            itos,
            stoi,
            padding: DEFAULT_PADDING,
        }
    }

    /// Replace the padding character
    pub fn with_padding(mut self, padding: char) -> Self {
        self.padding = padding;
        self
    }

    /// Load a JSON vocabulary file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let vocab: HashMap<String, usize> = serde_json::from_str(&text)?;
        let tokenizer = Self::from_vocab(&vocab)?;
        log::info!(
            "Loaded vocabulary of {} characters from {}",
            tokenizer.vocab_size(),
            path.as_ref().display()
        );
        Ok(tokenizer)
    }

    /// Save the vocabulary as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let vocab: BTreeMap<String, usize> = self
            .itos
            .iter()
            .enumerate()
            .map(|(id, c)| (c.to_string(), id))
            .collect();
        std::fs::write(path.as_ref(), serde_json::to_string_pretty(&vocab)?)?;
        log::info!("Saved vocabulary to {}", path.as_ref().display());
        Ok(())
    }

    pub fn vocab_size(&self) -> usize {
        self.itos.len()
    }

    /// Id of a character
    pub fn stoi(&self, c: char) -> Result<usize> {
        self.stoi.get(&c).copied().ok_or(PuckError::UnknownCharacter(c))
    }

    /// Character of an id
    pub fn itos(&self, id: usize) -> Result<char> {
        self.itos.get(id).copied().ok_or_else(|| {
            PuckError::range(format!("token id {} outside [0, {})", id, self.itos.len()))
        })
    }

    /// Id of the padding character, if the vocabulary has one
    pub fn padding_token(&self) -> Option<usize> {
        self.stoi.get(&self.padding).copied()
    }

    /// Encode text to token ids
    ///
    /// # Errors
    ///
    /// `UnknownCharacter` for the first character missing from the vocabulary.
    pub fn encode(&self, text: &str) -> Result<Vec<usize>> {
        if text.len() > PARALLEL_THRESHOLD {
            let ids: Result<Vec<usize>> = text.par_chars().map(|c| self.stoi(c)).collect();
            if ids.is_ok() {
                return ids;
            }
            // Workers race on errors; rescan in order to report the first one
        }
        text.chars().map(|c| self.stoi(c)).collect()
    }

    /// Decode token ids to text
    ///
    /// # Errors
    ///
    /// `OutOfRange` for any id `>= vocab_size`.
    pub fn decode(&self, ids: &[usize]) -> Result<String> {
        ids.iter().map(|&id| self.itos(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_is_sorted() {
        let tokenizer = CharTokenizer::from_corpus("hello world");
        assert_eq!(tokenizer.vocab_size(), 8);
        assert_eq!(tokenizer.itos(0).unwrap(), ' ');
        assert_eq!(tokenizer.stoi('w').unwrap(), 7);
        assert_eq!(tokenizer.padding_token(), Some(0));
    }

    #[test]
    fn test_round_trip() {
        let corpus = "First Citizen:\nBefore we proceed any further, hear me speak.";
        let tokenizer = CharTokenizer::from_corpus(corpus);
        let ids = tokenizer.encode(corpus).unwrap();
        assert_eq!(ids.len(), corpus.chars().count());
        assert_eq!(tokenizer.decode(&ids).unwrap(), corpus);
    }

    #[test]
    fn test_unknown_character() {
        let tokenizer = CharTokenizer::from_corpus("abc");
        let err = tokenizer.encode("abz").unwrap_err();
        assert!(matches!(err, PuckError::UnknownCharacter('z')));
        assert!(matches!(tokenizer.decode(&[3]), Err(PuckError::OutOfRange(_))));
    }

    #[test]
    fn test_no_padding_without_space() {
        let tokenizer = CharTokenizer::from_corpus("abc");
        assert_eq!(tokenizer.padding_token(), None);
        assert_eq!(tokenizer.with_padding('b').padding_token(), Some(1));
    }

    #[test]
    fn test_large_input_matches_sequential() {
        let tokenizer = CharTokenizer::from_corpus("abcdef");
        let text: String = "fedcba".repeat(50_000);
        let ids = tokenizer.encode(&text).unwrap();
        assert_eq!(ids.len(), 300_000);
        assert_eq!(&ids[..6], &[5, 4, 3, 2, 1, 0]);
        assert_eq!(&ids[ids.len() - 6..], &[5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_large_input_reports_first_unknown() {
        let tokenizer = CharTokenizer::from_corpus("abcdef");
        let mut text = "abcdef".repeat(50_000);
        text.insert(100, 'x');
        text.push('z');
        assert!(matches!(
            tokenizer.encode(&text),
            Err(PuckError::UnknownCharacter('x'))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.json");

        let tokenizer = CharTokenizer::from_corpus("to be, or not");
        tokenizer.save(&path).unwrap();
        let loaded = CharTokenizer::load(&path).unwrap();

        assert_eq!(loaded.vocab_size(), tokenizer.vocab_size());
        assert_eq!(
            loaded.encode("not to be").unwrap(),
            tokenizer.encode("not to be").unwrap()
        );
    }

    #[test]
    fn test_rejects_bad_vocab() {
        let mut vocab = HashMap::new();
        vocab.insert("ab".to_string(), 0);
        assert!(CharTokenizer::from_vocab(&vocab).is_err());

        let mut vocab = HashMap::new();
        vocab.insert("a".to_string(), 0);
        vocab.insert("b".to_string(), 0);
        assert!(CharTokenizer::from_vocab(&vocab).is_err());

        let mut vocab = HashMap::new();
        vocab.insert("a".to_string(), 5);
        assert!(CharTokenizer::from_vocab(&vocab).is_err());
    }
}
