//! Position-wise Feed-Forward Network
//!
//! Applied independently at every position after attention has mixed
//! information across positions:
//!
//! ```text
//! FFN(x) = dropout(ReLU(x @ W1 + b1) @ W2 + b2)
//! ```
//!
//! The hidden layer is four times wider than the embedding.

use super::activation::relu;
use super::dropout::{Dropout, Mode};
use super::linear::Linear;
use crate::error::Result;
use crate::tensor::Tensor;
use rand::Rng;

/// Hidden width multiplier
pub const EXPANSION: usize = 4;

#[derive(Clone, Debug)]
pub struct FeedForward {
    /// Expansion: d -> 4d
    pub fc1: Linear,
    /// Projection back: 4d -> d
    pub fc2: Linear,
    pub dropout: Dropout,
}

impl FeedForward {
    pub fn new<R: Rng + ?Sized>(embedding_dim: usize, dropout_rate: f32, rng: &mut R) -> Result<Self> {
        let hidden = EXPANSION * embedding_dim;
        Ok(Self {
            fc1: Linear::new(embedding_dim, hidden, rng)?,
            fc2: Linear::new(hidden, embedding_dim, rng)?,
            dropout: Dropout::new(dropout_rate)?,
        })
    }

    /// Forward pass: [batch, seq, d] -> [batch, seq, d]
    pub fn forward(&self, x: &Tensor, mode: &mut Mode<'_>) -> Result<Tensor> {
        let hidden = relu(&self.fc1.forward(x)?);
        let out = self.fc2.forward(&hidden)?;
        Ok(self.dropout.forward(&out, mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_shapes() {
        let mut rng = StdRng::seed_from_u64(0);
        let ffn = FeedForward::new(6, 0.0, &mut rng).unwrap();
        assert_eq!(ffn.fc1.weight.shape, vec![6, 24]);
        assert_eq!(ffn.fc2.weight.shape, vec![24, 6]);

        let y = ffn.forward(&Tensor::full(vec![2, 3, 6], 0.5), &mut Mode::Inference).unwrap();
        assert_eq!(y.shape, vec![2, 3, 6]);
    }

    #[test]
    fn test_positions_independent() {
        let mut rng = StdRng::seed_from_u64(1);
        let ffn = FeedForward::new(4, 0.0, &mut rng).unwrap();
        let x = Tensor::new((0..8).map(|v| v as f32 * 0.1).collect(), vec![1, 2, 4]);
        let both = ffn.forward(&x, &mut Mode::Inference).unwrap();

        let first = Tensor::new(x.data[..4].to_vec(), vec![1, 1, 4]);
        let alone = ffn.forward(&first, &mut Mode::Inference).unwrap();
        for (a, b) in alone.data.iter().zip(&both.data[..4]) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
