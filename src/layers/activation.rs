//! Activation Functions
//!
//! ## ReLU (Rectified Linear Unit)
//!
//! The feed-forward sublayer uses ReLU between its two projections:
//!
//! ```text
//! ReLU(x) = max(0, x)
//! ```
//!
//! Negative pre-activations are clamped to zero; everything else passes
//! through unchanged. It is applied element-wise, so the input shape is
//! preserved.

use crate::tensor::Tensor;
use rayon::prelude::*;

/// ReLU activation, element-wise in parallel
pub fn relu(x: &Tensor) -> Tensor {
    let result = x.data.par_iter().map(|&v| v.max(0.0)).collect();
    Tensor::new(result, x.shape.clone())
}
