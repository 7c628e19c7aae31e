//! Linear Layer (Fully Connected)
//!
//! Performs an affine transformation: `y = x @ W + b`
//!
//! ```text
//! Input:  x [*, in_features]
//! Weight: W [in_features, out_features]
//! Bias:   b [out_features]        (optional)
//! Output: y [*, out_features]
//! ```
//!
//! Attention heads use bias-free projections for key, query and value; every
//! other projection carries a bias.
//!
//! ## Initialization
//!
//! Weights are drawn from N(0, 0.02) following GPT-2, biases start at zero.
//! The caller supplies the generator so that a seed fully determines the
//! initial parameters.

use crate::error::{PuckError, Result};
use crate::tensor::Tensor;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Standard deviation of the initial weight distribution
pub const INIT_STD: f32 = 0.02;

/// Draw `size` values from N(0, std)
pub fn normal_init<R: Rng + ?Sized>(size: usize, std: f32, rng: &mut R) -> Result<Vec<f32>> {
    let normal = Normal::new(0.0, std)
        .map_err(|e| PuckError::config(format!("invalid init std {}: {}", std, e)))?;
    Ok((0..size).map(|_| normal.sample(rng)).collect())
}

/// Fully connected layer
#[derive(Clone, Debug)]
pub struct Linear {
    /// Weight matrix: [in_features, out_features]
    pub weight: Tensor,
    /// Bias vector: [out_features]
    pub bias: Option<Tensor>,
}

impl Linear {
    /// Create a linear layer with a zero-initialised bias
    pub fn new<R: Rng + ?Sized>(in_features: usize, out_features: usize, rng: &mut R) -> Result<Self> {
        let mut layer = Self::without_bias(in_features, out_features, rng)?;
        layer.bias = Some(Tensor::zeros(vec![out_features]));
        Ok(layer)
    }

    /// Create a linear layer with no additive bias term
    pub fn without_bias<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let weight = Tensor::new(
            normal_init(in_features * out_features, INIT_STD, rng)?,
            vec![in_features, out_features],
        );
        Ok(Self { weight, bias: None })
    }

    pub fn in_features(&self) -> usize {
        self.weight.shape[0]
    }

    pub fn out_features(&self) -> usize {
        self.weight.shape[1]
    }

    /// Forward pass: y = x @ W (+ b)
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor `[rows, in_features]` or `[batch, seq, in_features]`
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if `x` is not rank 2 or 3 or its last dimension is not
    /// `in_features`.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        if !(2..=3).contains(&x.ndim()) || x.last_dim() != self.in_features() {
            return Err(PuckError::shape(format!(
                "linear layer expects [.., {}] (rank 2 or 3), got {:?}",
                self.in_features(),
                x.shape
            )));
        }

        let y = x.matmul(&self.weight);
        Ok(match &self.bias {
            Some(bias) => y.add(bias),
            None => y,
        })
    }
}
