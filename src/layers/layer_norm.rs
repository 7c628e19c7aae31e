//! Layer Normalization
//!
//! Normalizes each position's feature vector to zero mean and unit variance,
//! then applies a learned scale (gamma) and shift (beta).
//!
//! ```text
//! mean = mean(x, axis=-1)
//! var  = mean((x - mean)², axis=-1)
//! y    = gamma * (x - mean) / sqrt(var + eps) + beta
//! ```
//!
//! The variance is the population variance (divide by n, not n - 1), and
//! `eps = 1e-5`. Every block normalizes twice (before attention and before the
//! feed-forward) and the model applies a final norm before the vocabulary
//! projection.

use crate::error::{PuckError, Result};
use crate::tensor::Tensor;

/// Numerical stability term added to the variance
pub const LAYER_NORM_EPS: f32 = 1e-5;

#[derive(Clone, Debug)]
pub struct LayerNorm {
    /// Scale parameter: [dim]
    pub gamma: Tensor,
    /// Shift parameter: [dim]
    pub beta: Tensor,
    pub eps: f32,
}

impl LayerNorm {
    /// Create a layer norm with gamma = 1 and beta = 0
    pub fn new(dim: usize) -> Self {
        Self {
            gamma: Tensor::full(vec![dim], 1.0),
            beta: Tensor::zeros(vec![dim]),
            eps: LAYER_NORM_EPS,
        }
    }

    pub fn dim(&self) -> usize {
        self.gamma.data.len()
    }

    /// Normalize over the last axis
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if the last dimension of `x` is not `dim`.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        if x.ndim() == 0 || x.last_dim() != self.dim() {
            return Err(PuckError::shape(format!(
                "layer norm over {} features got input {:?}",
                self.dim(),
                x.shape
            )));
        }

        let mean = x.mean_last();
        let var = x.var_last();
        let normalized = x.sub(&mean).div(&var.add_scalar(self.eps).sqrt());

        Ok(normalized.mul(&self.gamma).add(&self.beta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_rows() {
        let ln = LayerNorm::new(4);
        let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 10.0, 10.0, 10.0, 10.0], vec![2, 4]);
        let y = ln.forward(&x).unwrap();

        let first = &y.data[..4];
        let mean: f32 = first.iter().sum::<f32>() / 4.0;
        let var: f32 = first.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-3);

        // A constant row has zero variance and normalizes to zero
        assert!(y.data[4..].iter().all(|v| v.abs() < 1e-3));
    }

    #[test]
    fn test_gamma_beta_applied() {
        let mut ln = LayerNorm::new(2);
        ln.gamma = Tensor::new(vec![2.0, 2.0], vec![2]);
        ln.beta = Tensor::new(vec![1.0, 1.0], vec![2]);
        let y = ln.forward(&Tensor::new(vec![-1.0, 1.0], vec![1, 1, 2])).unwrap();
        assert!((y.data[0] - -1.0).abs() < 1e-3);
        assert!((y.data[1] - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_wrong_width() {
        let ln = LayerNorm::new(3);
        assert!(ln.forward(&Tensor::zeros(vec![2, 4])).is_err());
    }
}
