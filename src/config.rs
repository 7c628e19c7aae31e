//! Model and Run Configuration
//!
//! [`ModelConfig`] fixes the architecture: vocabulary size, context length,
//! widths and depth. It is serialized into every checkpoint so a saved model
//! can be rebuilt without outside knowledge.
//!
//! [`RunConfig`] wraps a model config with the settings of one experiment
//! (batching, split, seed, file locations) and lives in a JSON file next to
//! the data.
//!
//! ## Presets
//!
//! ```text
//! preset        seq_len  embd  heads  layers  dropout
//! tiny             16     32     2      2      0.0
//! small            64    128     4      4      0.1
//! shakespeare      32     64     4      4      0.0
//! default          32    128     8      6      0.1
//! ```

use crate::error::{PuckError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Architecture hyperparameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of distinct tokens (V)
    pub vocab_size: usize,
    /// Positional capacity, the longest sequence the model accepts (L)
    pub seq_len: usize,
    pub embedding_dim: usize,
    pub num_heads: usize,
    pub num_layers: usize,
    /// Dropout probability used in training mode
    pub dropout: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vocab_size: 65,   // Distinct characters in tiny-shakespeare
            seq_len: 32,      // Context length
            embedding_dim: 128,
            num_heads: 8,
            num_layers: 6,
            dropout: 0.1,
        }
    }
}

impl ModelConfig {
    /// Create a tiny config for tests and quick experiments
    ///
    /// # Arguments
    ///
    /// * `vocab_size` - Size of vocabulary (e.g., from tokenizer)
    pub fn tiny(vocab_size: usize) -> Self {
        Self {
            vocab_size,
            seq_len: 16,
            embedding_dim: 32,
            num_heads: 2,
            num_layers: 2,
            dropout: 0.0,
        }
    }

    /// Create a small config with a longer context
    ///
    /// # Arguments
    ///
    /// * `vocab_size` - Size of vocabulary
    pub fn small(vocab_size: usize) -> Self {
        Self {
            vocab_size,
            seq_len: 64,
            embedding_dim: 128,
            num_heads: 4,
            num_layers: 4,
            dropout: 0.1,
        }
    }

    /// The character-level Shakespeare run
    ///
    /// # Arguments
    ///
    /// * `vocab_size` - Size of vocabulary
    pub fn shakespeare(vocab_size: usize) -> Self {
        Self {
            vocab_size,
            seq_len: 32,
            embedding_dim: 64,
            num_heads: 4,
            num_layers: 4,
            dropout: 0.0,
        }
    }

    /// Look up a preset by name
    pub fn preset(name: &str, vocab_size: usize) -> Result<Self> {
        match name {
            "tiny" => Ok(Self::tiny(vocab_size)),
            "small" => Ok(Self::small(vocab_size)),
            "shakespeare" => Ok(Self::shakespeare(vocab_size)),
            "default" => Ok(Self {
                vocab_size,
                ..Self::default()
            }),
            other => Err(PuckError::config(format!("unknown preset '{}'", other))),
        }
    }

    /// Width of each attention head
    pub fn head_size(&self) -> usize {
        self.embedding_dim / self.num_heads.max(1)
    }

    /// Check that the hyperparameters describe a buildable model
    ///
    /// # Errors
    ///
    /// `Configuration` if any dimension is zero, `embedding_dim` is not
    /// divisible by `num_heads`, or `dropout` is outside `[0, 1)`.
    pub fn validate(&self) -> Result<()> {
        let dims = [
            ("vocab_size", self.vocab_size),
            ("seq_len", self.seq_len),
            ("embedding_dim", self.embedding_dim),
            ("num_heads", self.num_heads),
            ("num_layers", self.num_layers),
        ];
        if let Some((name, _)) = dims.iter().find(|(_, v)| *v == 0) {
            return Err(PuckError::config(format!("{} must be positive", name)));
        }
        if self.embedding_dim % self.num_heads != 0 {
            return Err(PuckError::config(format!(
                "embedding_dim {} must be divisible by num_heads {}",
                self.embedding_dim, self.num_heads
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(PuckError::config(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }
}

fn default_seed() -> u64 {
    42
}

fn default_split() -> f32 {
    0.9
}

fn default_batch_size() -> usize {
    16
}

/// Settings for one experiment, stored as JSON
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub model: ModelConfig,
    /// Rows per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Fraction of rows used for training; the rest is validation
    #[serde(default = "default_split")]
    pub split: f32,
    /// Seed for initialization, shuffling and sampling
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Raw text corpus
    pub data_file: PathBuf,
    /// Character vocabulary JSON
    pub vocab_file: PathBuf,
    /// Checkpoint location, read by the generate and evaluate demos
    pub save_path: PathBuf,
}

impl RunConfig {
    /// The Shakespeare run with default file locations
    pub fn shakespeare(vocab_size: usize) -> Self {
        Self {
            model: ModelConfig::shakespeare(vocab_size),
            batch_size: default_batch_size(),
            split: default_split(),
            seed: default_seed(),
            data_file: PathBuf::from("data/shakespeare.txt"),
            vocab_file: PathBuf::from("data/vocab.json"),
            save_path: PathBuf::from("checkpoints/shakespeare.bin"),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        if self.batch_size == 0 {
            return Err(PuckError::config("batch_size must be positive"));
        }
        if !(self.split > 0.0 && self.split < 1.0) {
            return Err(PuckError::config(format!(
                "split must be in (0, 1), got {}",
                self.split
            )));
        }
        Ok(())
    }

    /// Read and validate a run config from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        log::info!("Loaded run config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Write the run config as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
