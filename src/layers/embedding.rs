//! Embedding Lookup Table
//!
//! Converts integer ids to dense vectors. The table has shape
//! `[num_embeddings, dim]`; looking up id `i` copies row `i`.
//!
//! ```text
//! Input:  [batch, seq_len]          (ids)
//! Output: [batch, seq_len, dim]     (vectors)
//! ```
//!
//! The same layer backs both the token embedding (rows = vocabulary) and the
//! positional table (rows = context length).

use super::linear::{normal_init, INIT_STD};
use crate::error::{PuckError, Result};
use crate::tensor::Tensor;
use rand::Rng;

#[derive(Clone, Debug)]
pub struct Embedding {
    /// Embedding weight matrix: [num_embeddings, dim]
    pub weight: Tensor,
}

impl Embedding {
    /// Create a table initialised from N(0, 0.02)
    pub fn new<R: Rng + ?Sized>(num_embeddings: usize, dim: usize, rng: &mut R) -> Result<Self> {
        Ok(Self {
            weight: Tensor::new(
                normal_init(num_embeddings * dim, INIT_STD, rng)?,
                vec![num_embeddings, dim],
            ),
        })
    }

    pub fn num_embeddings(&self) -> usize {
        self.weight.shape[0]
    }

    pub fn dim(&self) -> usize {
        self.weight.shape[1]
    }

    /// Look up a rectangular batch of ids
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` if the batch is empty or its rows differ in length
    /// - `OutOfRange` if any id is `>= num_embeddings`
    pub fn forward(&self, ids: &[Vec<usize>]) -> Result<Tensor> {
        let batch_size = ids.len();
        let seq_len = ids.first().map(Vec::len).unwrap_or(0);
        if batch_size == 0 || seq_len == 0 {
            return Err(PuckError::shape("embedding input must be a non-empty [batch, seq_len] array"));
        }
        if let Some(row) = ids.iter().find(|row| row.len() != seq_len) {
            return Err(PuckError::shape(format!(
                "ragged batch: expected rows of length {}, found one of length {}",
                seq_len,
                row.len()
            )));
        }

        let dim = self.dim();
        let mut output = Vec::with_capacity(batch_size * seq_len * dim);
        for &id in ids.iter().flatten() {
            output.extend_from_slice(self.row(id)?);
        }

        Ok(Tensor::new(output, vec![batch_size, seq_len, dim]))
    }

    /// Borrow the vector for one id
    pub fn row(&self, id: usize) -> Result<&[f32]> {
        if id >= self.num_embeddings() {
            return Err(PuckError::range(format!(
                "id {} outside [0, {})",
                id,
                self.num_embeddings()
            )));
        }
        let dim = self.dim();
        Ok(&self.weight.data[id * dim..(id + 1) * dim])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn table() -> Embedding {
        let mut rng = StdRng::seed_from_u64(0);
        let mut emb = Embedding::new(3, 2, &mut rng).unwrap();
        emb.weight = Tensor::new(vec![0.0, 0.1, 1.0, 1.1, 2.0, 2.1], vec![3, 2]);
        emb
    }

    #[test]
    fn test_lookup() {
        let emb = table();
        let out = emb.forward(&[vec![2, 0], vec![1, 1]]).unwrap();
        assert_eq!(out.shape, vec![2, 2, 2]);
        assert_eq!(out.data, vec![2.0, 2.1, 0.0, 0.1, 1.0, 1.1, 1.0, 1.1]);
    }

    #[test]
    fn test_out_of_vocab_id() {
        let emb = table();
        let err = emb.forward(&[vec![0, 3]]).unwrap_err();
        assert!(matches!(err, PuckError::OutOfRange(_)));
    }

    #[test]
    fn test_ragged_batch() {
        let emb = table();
        let err = emb.forward(&[vec![0, 1], vec![1]]).unwrap_err();
        assert!(matches!(err, PuckError::ShapeMismatch(_)));
        assert!(emb.forward(&[]).is_err());
    }
}
