//! Transformer Block
//!
//! A block combines attention and the feed-forward network, each wrapped in
//! a pre-norm residual connection:
//!
//! ```text
//! x = x + attention(norm1(x))
//! x = x + feed_forward(norm2(x))
//! ```
//!
//! ## Why Residual Connections?
//!
//! The skip path lets signal (and gradients, once training is added) flow
//! around each sublayer, so deep stacks stay trainable. Normalizing before
//! the sublayer rather than after keeps the residual stream un-normalized.

use super::attention::{CausalMask, MultiHeadAttention};
use super::dropout::Mode;
use super::feed_forward::FeedForward;
use super::layer_norm::LayerNorm;
use crate::error::Result;
use crate::tensor::Tensor;
use rand::Rng;

#[derive(Clone, Debug)]
pub struct TransformerBlock {
    pub norm1: LayerNorm,
    pub attention: MultiHeadAttention,
    pub norm2: LayerNorm,
    pub feed_forward: FeedForward,
}

impl TransformerBlock {
    /// Create a new transformer block
    ///
    /// # Arguments
    ///
    /// * `embedding_dim` - Embedding dimension
    /// * `num_heads` - Attention heads; must divide `embedding_dim`
    /// * `dropout_rate` - Dropout probability
    /// * `rng` - Generator for weight initialization
    pub fn new<R: Rng + ?Sized>(
        embedding_dim: usize,
        num_heads: usize,
        dropout_rate: f32,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(Self {
            norm1: LayerNorm::new(embedding_dim),
            attention: MultiHeadAttention::new(embedding_dim, num_heads, dropout_rate, rng)?,
            norm2: LayerNorm::new(embedding_dim),
            feed_forward: FeedForward::new(embedding_dim, dropout_rate, rng)?,
        })
    }

    /// Forward pass: [batch, seq, d] -> [batch, seq, d]
    pub fn forward(&self, x: &Tensor, mask: &CausalMask, mode: &mut Mode<'_>) -> Result<Tensor> {
        let attended = self.attention.forward(&self.norm1.forward(x)?, mask, mode)?;
        let x = x.add(&attended);

        let fed = self.feed_forward.forward(&self.norm2.forward(&x)?, mode)?;
        Ok(x.add(&fed))
    }
}
