//! Causal Self-Attention
//!
//! Attention lets each position mix in information from the positions before
//! it. Every head projects the input three ways and compares queries against
//! keys:
//!
//! ```text
//! K, Q, V = x @ W_k, x @ W_q, x @ W_v          [batch, seq, head_size]
//! scores  = (Q @ K^T) / √embedding_dim          [batch, seq, seq]
//! weights = softmax(mask(scores))
//! output  = dropout(weights) @ V                [batch, seq, head_size]
//! ```
//!
//! The key, query and value projections have no bias.
//!
//! ## Scaling
//!
//! Scores are divided by the square root of the full embedding width, not
//! the per-head width. Checkpoints trained this way depend on that exact
//! factor.
//!
//! ## Causal Masking
//!
//! Position `i` may only attend to positions `j <= i`. Future scores are
//! replaced with `-inf` before the softmax, so their weights come out as
//! exactly zero. The model owns one [`CausalMask`] sized for its context and
//! lends it to every head; shorter sequences use its top-left corner.
//!
//! ## Multi-Head Attention
//!
//! ```text
//! heads  = [head_1(x), ..., head_h(x)]          each [batch, seq, d / h]
//! concat = heads joined on the last axis        [batch, seq, d]
//! output = dropout(concat @ W_o + b_o)
//! ```

use super::dropout::{Dropout, Mode};
use super::linear::Linear;
use crate::error::{PuckError, Result};
use crate::tensor::Tensor;
use rand::Rng;

/// Lower-triangular visibility pattern for a fixed context length
#[derive(Clone, Debug)]
pub struct CausalMask {
    size: usize,
    /// `true` where column > row (position is in the future)
    future: Vec<bool>,
}

impl CausalMask {
    pub fn new(size: usize) -> Self {
        let future = (0..size)
            .flat_map(|i| (0..size).map(move |j| j > i))
            .collect();
        Self { size, future }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether position `i` is blocked from attending to position `j`
    pub fn is_masked(&self, i: usize, j: usize) -> bool {
        self.future[i * self.size + j]
    }

    /// Top-left `seq_len × seq_len` block, row-major
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `seq_len` exceeds the mask size.
    pub fn crop(&self, seq_len: usize) -> Result<Vec<bool>> {
        if seq_len > self.size {
            return Err(PuckError::range(format!(
                "sequence length {} exceeds context of {}",
                seq_len, self.size
            )));
        }
        Ok(self
            .future
            .chunks(self.size.max(1))
            .take(seq_len)
            .flat_map(|row| row[..seq_len].iter().copied())
            .collect())
    }
}

/// One head of causal self-attention
#[derive(Clone, Debug)]
pub struct CausalHead {
    pub key: Linear,
    pub query: Linear,
    pub value: Linear,
    pub dropout: Dropout,
    embedding_dim: usize,
}

impl CausalHead {
    /// Create a new attention head
    ///
    /// # Arguments
    ///
    /// * `embedding_dim` - Width of the input (and of the score scaling)
    /// * `head_size` - Width of this head's key/query/value projections
    /// * `dropout_rate` - Dropout applied to the attention weights
    /// * `rng` - Generator for weight initialization
    pub fn new<R: Rng + ?Sized>(
        embedding_dim: usize,
        head_size: usize,
        dropout_rate: f32,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(Self {
            key: Linear::without_bias(embedding_dim, head_size, rng)?,
            query: Linear::without_bias(embedding_dim, head_size, rng)?,
            value: Linear::without_bias(embedding_dim, head_size, rng)?,
            dropout: Dropout::new(dropout_rate)?,
            embedding_dim,
        })
    }

    pub fn head_size(&self) -> usize {
        self.value.out_features()
    }

    /// Post-softmax attention weights `[batch, seq, seq]`, before dropout
    ///
    /// Every row sums to 1 and every entry above the diagonal is exactly 0.
    pub fn attention_weights(&self, x: &Tensor, mask: &CausalMask) -> Result<Tensor> {
        if x.ndim() != 3 || x.last_dim() != self.embedding_dim {
            return Err(PuckError::shape(format!(
                "attention expects [batch, seq, {}], got {:?}",
                self.embedding_dim, x.shape
            )));
        }
        let future = mask.crop(x.shape[1])?;

        let k = self.key.forward(x)?;
        let q = self.query.forward(x)?;

        let scale = (self.embedding_dim as f32).powf(-0.5);
        let scores = q.matmul(&k.transpose(-2, -1)).mul_scalar(scale);

        Ok(scores.masked_fill(&future, f32::NEG_INFINITY).softmax())
    }

    /// Forward pass
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor [batch, seq, embedding_dim]
    /// * `mask` - Shared causal mask, at least `seq` wide
    /// * `mode` - Enables dropout on the weights when training
    ///
    /// # Returns
    ///
    /// Attended values [batch, seq, head_size]
    pub fn forward(&self, x: &Tensor, mask: &CausalMask, mode: &mut Mode<'_>) -> Result<Tensor> {
        let weights = self.attention_weights(x, mask)?;
        let weights = self.dropout.forward(&weights, mode);
        let v = self.value.forward(x)?;
        Ok(weights.matmul(&v))
    }
}

/// Several causal heads run side by side and recombined by a projection
#[derive(Clone, Debug)]
pub struct MultiHeadAttention {
    pub heads: Vec<CausalHead>,
    pub projection: Linear,
    pub dropout: Dropout,
}

impl MultiHeadAttention {
    /// Create multi-head attention
    ///
    /// # Errors
    ///
    /// `Configuration` if `num_heads` is zero or does not divide
    /// `embedding_dim`.
    pub fn new<R: Rng + ?Sized>(
        embedding_dim: usize,
        num_heads: usize,
        dropout_rate: f32,
        rng: &mut R,
    ) -> Result<Self> {
        if num_heads == 0 || embedding_dim % num_heads != 0 {
            return Err(PuckError::config(format!(
                "embedding_dim {} is not divisible into {} heads",
                embedding_dim, num_heads
            )));
        }
        let head_size = embedding_dim / num_heads;

        let heads = (0..num_heads)
            .map(|_| CausalHead::new(embedding_dim, head_size, dropout_rate, rng))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            heads,
            projection: Linear::new(embedding_dim, embedding_dim, rng)?,
            dropout: Dropout::new(dropout_rate)?,
        })
    }

    pub fn num_heads(&self) -> usize {
        self.heads.len()
    }

    /// Forward pass: [batch, seq, d] -> [batch, seq, d]
    pub fn forward(&self, x: &Tensor, mask: &CausalMask, mode: &mut Mode<'_>) -> Result<Tensor> {
        let mut outputs = Vec::with_capacity(self.heads.len());
        for head in &self.heads {
            outputs.push(head.forward(x, mask, mode)?);
        }

        let concat = Tensor::concat_last(&outputs);
        let projected = self.projection.forward(&concat)?;
        Ok(self.dropout.forward(&projected, mode))
    }
}
