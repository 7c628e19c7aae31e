//! Windowed Batches
//!
//! Turns a corpus of token ids into (input, target) pairs for next-token
//! prediction.
//!
//! ## Pipeline
//!
//! ```text
//! token stream ──segment_into_rows──> rows [num_rows, L] ──shuffle_rows──┐
//!                                                                         │
//!             WindowedDataset::split <────────────────────────────────────┘
//!               ├─ train: first floor(num_rows × split) rows
//!               └─ val:   the rest
//! ```
//!
//! ## Batches
//!
//! Batch `i` covers rows `[i, i + batch_size)`. The target is the rows as
//! they are; the input is each row shifted right by one with the start token
//! (id 0) in front:
//!
//! ```text
//! row:    [1, 2, 3]
//! input:  [0, 1, 2]
//! target: [1, 2, 3]
//! ```
//!
//! Consecutive indices overlap (batch 1 shares `batch_size - 1` rows with
//! batch 0). The number of valid indices is `num_rows / batch_size`, and a
//! short trailing batch is never produced.

use crate::error::{PuckError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::Path;

/// Token id prepended to every input row
pub const START_TOKEN: usize = 0;

/// One (input, target) pair, both `[batch_size, seq_len]`
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub input: Vec<Vec<usize>>,
    pub target: Vec<Vec<usize>>,
}

/// Rows of exactly `seq_len` tokens served as overlapping batches
#[derive(Clone, Debug)]
pub struct WindowedDataset {
    rows: Vec<Vec<usize>>,
    seq_len: usize,
    batch_size: usize,
}

/// Result of splitting a corpus into training and validation rows
#[derive(Clone, Debug)]
pub struct TrainValidation {
    pub train: WindowedDataset,
    pub val: WindowedDataset,
    pub split: f32,
}

impl WindowedDataset {
    /// Create a dataset from pre-segmented rows
    ///
    /// # Arguments
    ///
    /// * `rows` - Token rows, each exactly `seq_len` long
    /// * `seq_len` - Row width (the model's context length)
    /// * `batch_size` - Rows per batch
    ///
    /// # Errors
    ///
    /// - `Configuration` if `seq_len` or `batch_size` is zero
    /// - `ShapeMismatch` if any row has the wrong width
    pub fn new(rows: Vec<Vec<usize>>, seq_len: usize, batch_size: usize) -> Result<Self> {
        if seq_len == 0 || batch_size == 0 {
            return Err(PuckError::config(format!(
                "seq_len ({}) and batch_size ({}) must be positive",
                seq_len, batch_size
            )));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != seq_len) {
            return Err(PuckError::shape(format!(
                "row {} has {} tokens, expected {}",
                i,
                row.len(),
                seq_len
            )));
        }

        Ok(Self {
            rows,
            seq_len,
            batch_size,
        })
    }

    /// Create a dataset from a flat stream whose length is a multiple of `seq_len`
    pub fn from_tokens(tokens: &[usize], seq_len: usize, batch_size: usize) -> Result<Self> {
        if seq_len == 0 || tokens.len() % seq_len != 0 {
            return Err(PuckError::shape(format!(
                "{} tokens cannot be split into rows of {}",
                tokens.len(),
                seq_len
            )));
        }
        let rows = tokens.chunks(seq_len).map(<[usize]>::to_vec).collect();
        Self::new(rows, seq_len, batch_size)
    }

    /// Split rows into training and validation datasets
    ///
    /// The first `floor(num_rows × split)` rows train; the remainder validate.
    ///
    /// # Errors
    ///
    /// `Configuration` unless `0 < split < 1`, plus anything [`new`](Self::new)
    /// rejects.
    pub fn split(
        mut rows: Vec<Vec<usize>>,
        split: f32,
        seq_len: usize,
        batch_size: usize,
    ) -> Result<TrainValidation> {
        if !(split > 0.0 && split < 1.0) {
            return Err(PuckError::config(format!(
                "split must be in (0, 1), got {}",
                split
            )));
        }

        // Absorbs the f32 representation error of splits like 0.9
        let train_rows = ((rows.len() as f64) * f64::from(split) + 1e-6) as usize;
        let val_rows = rows.split_off(train_rows.min(rows.len()));

        let train = Self::new(rows, seq_len, batch_size)?;
        let val = Self::new(val_rows, seq_len, batch_size)?;
        log::info!(
            "Split {} rows: {} train ({} batches), {} validation ({} batches)",
            train.num_rows() + val.num_rows(),
            train.num_rows(),
            train.len(),
            val.num_rows(),
            val.len()
        );

        Ok(TrainValidation { train, val, split })
    }

    /// Number of valid batch indices: `num_rows / batch_size`
    pub fn len(&self) -> usize {
        self.rows.len() / self.batch_size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn rows(&self) -> &[Vec<usize>] {
        &self.rows
    }

    /// Build batch `index`
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `index >= len()`.
    pub fn get(&self, index: usize) -> Result<Batch> {
        if index >= self.len() {
            return Err(PuckError::range(format!(
                "batch index {} outside [0, {})",
                index,
                self.len()
            )));
        }

        let rows = &self.rows[index..index + self.batch_size];
        let input = rows
            .iter()
            .map(|row| {
                std::iter::once(START_TOKEN)
                    .chain(row[..self.seq_len - 1].iter().copied())
                    .collect()
            })
            .collect();
        let target = rows.to_vec();

        log::debug!("Built batch {} from rows {}..{}", index, index, index + self.batch_size);
        Ok(Batch { input, target })
    }

    /// All batches in index order
    pub fn batches(&self) -> impl Iterator<Item = Batch> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i).ok())
    }
}

/// Cut a token stream into rows of `seq_len`, padding the tail with `pad_token`
///
/// # Errors
///
/// `Configuration` if `seq_len` is zero.
pub fn segment_into_rows(tokens: &[usize], seq_len: usize, pad_token: usize) -> Result<Vec<Vec<usize>>> {
    if seq_len == 0 {
        return Err(PuckError::config("seq_len must be positive"));
    }

    let rows = tokens
        .chunks(seq_len)
        .map(|chunk| {
            let mut row = chunk.to_vec();
            row.resize(seq_len, pad_token);
            row
        })
        .collect::<Vec<_>>();

    log::debug!("Segmented {} tokens into {} rows of {}", tokens.len(), rows.len(), seq_len);
    Ok(rows)
}

/// Shuffle rows in place with the caller's generator
pub fn shuffle_rows<R: Rng + ?Sized>(rows: &mut [Vec<usize>], rng: &mut R) {
    rows.shuffle(rng);
}

/// Write rows as a JSON array of arrays
pub fn save_rows(path: impl AsRef<Path>, rows: &[Vec<usize>]) -> Result<()> {
    std::fs::write(path.as_ref(), serde_json::to_string(rows)?)?;
    log::info!("Saved {} rows to {}", rows.len(), path.as_ref().display());
    Ok(())
}

/// Read rows written by [`save_rows`]
pub fn load_rows(path: impl AsRef<Path>) -> Result<Vec<Vec<usize>>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let rows: Vec<Vec<usize>> = serde_json::from_str(&text)?;
    log::info!("Loaded {} rows from {}", rows.len(), path.as_ref().display());
    Ok(rows)
}
