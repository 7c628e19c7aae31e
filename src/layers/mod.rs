//! Neural network layers
//!
//! Building blocks of the decoder-only transformer, smallest first:
//!
//! - [`Linear`]: affine projection, with or without bias
//! - [`Embedding`] and [`PositionalEmbedding`]: lookup tables
//! - [`LayerNorm`]: per-position normalization
//! - [`Dropout`] and [`Mode`]: training-time regularization
//! - [`relu`]: activation
//! - [`CausalHead`] and [`MultiHeadAttention`]: masked self-attention
//! - [`FeedForward`]: position-wise MLP
//! - [`TransformerBlock`]: both sublayers with residuals

pub mod activation;
pub mod attention;
pub mod block;
pub mod dropout;
pub mod embedding;
pub mod feed_forward;
pub mod layer_norm;
pub mod linear;
pub mod positional;

pub use activation::relu;
pub use attention::{CausalHead, CausalMask, MultiHeadAttention};
pub use block::TransformerBlock;
pub use dropout::{Dropout, Mode};
pub use embedding::Embedding;
pub use feed_forward::FeedForward;
pub use layer_norm::LayerNorm;
pub use linear::Linear;
pub use positional::PositionalEmbedding;
