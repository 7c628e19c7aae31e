//! Learned Positional Embeddings
//!
//! A trainable table with one vector per position `0..max_seq_len`. Unlike
//! sinusoidal encodings these carry no structure of their own; position
//! information is learned like any other weight.
//!
//! ```text
//! forward(seq_len) -> rows 0..seq_len of the table   [seq_len, dim]
//! ```
//!
//! The result is broadcast over the batch when added to token embeddings.

use super::embedding::Embedding;
use crate::error::{PuckError, Result};
use crate::tensor::Tensor;
use rand::Rng;

#[derive(Clone, Debug)]
pub struct PositionalEmbedding {
    pub table: Embedding,
}

impl PositionalEmbedding {
    pub fn new<R: Rng + ?Sized>(max_seq_len: usize, dim: usize, rng: &mut R) -> Result<Self> {
        Ok(Self {
            table: Embedding::new(max_seq_len, dim, rng)?,
        })
    }

    pub fn max_seq_len(&self) -> usize {
        self.table.num_embeddings()
    }

    /// Position vectors for the first `seq_len` positions
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `seq_len` exceeds the table size.
    pub fn forward(&self, seq_len: usize) -> Result<Tensor> {
        if seq_len > self.max_seq_len() {
            return Err(PuckError::range(format!(
                "sequence length {} exceeds context of {}",
                seq_len,
                self.max_seq_len()
            )));
        }
        let dim = self.table.dim();
        Ok(Tensor::new(
            self.table.weight.data[..seq_len * dim].to_vec(),
            vec![seq_len, dim],
        ))
    }
}
