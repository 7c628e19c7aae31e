//! Dropout Layer
//!
//! Dropout is a regularization technique that randomly zeros out activations
//! during training to prevent overfitting. During inference, it passes values
//! through unchanged.
//!
//! ## Explicit randomness
//!
//! No layer owns or reaches for a global random generator. Every forward pass
//! receives a [`Mode`]: either [`Mode::Inference`], where dropout is the
//! identity, or [`Mode::Training`], which carries the caller's seeded
//! generator. The same seed therefore always drops the same activations.

use crate::error::{PuckError, Result};
use crate::tensor::Tensor;
use rand::{Rng, RngCore};

/// How a forward pass treats stochastic layers
pub enum Mode<'a> {
    /// Deterministic pass; dropout disabled
    Inference,
    /// Dropout enabled, drawing from the given generator
    Training(&'a mut dyn RngCore),
}

impl Mode<'_> {
    pub fn is_training(&self) -> bool {
        matches!(self, Mode::Training(_))
    }
}

/// Inverted dropout: kept values are scaled by `1 / (1 - rate)` so the
/// expected activation is unchanged and inference needs no rescaling.
#[derive(Clone, Debug)]
pub struct Dropout {
    pub rate: f32,
}

impl Dropout {
    /// Create a new dropout layer
    ///
    /// # Arguments
    ///
    /// * `rate` - Drop probability, in `[0.0, 1.0)`
    pub fn new(rate: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&rate) {
            return Err(PuckError::config(format!(
                "dropout rate must be in [0, 1), got {}",
                rate
            )));
        }
        Ok(Self { rate })
    }

    pub fn forward(&self, x: &Tensor, mode: &mut Mode<'_>) -> Tensor {
        let rng = match mode {
            Mode::Training(rng) if self.rate > 0.0 => rng,
            _ => return x.clone(),
        };

        let scale = 1.0 / (1.0 - self.rate);
        let data = x
            .data
            .iter()
            .map(|&v| {
                if rng.random::<f32>() < self.rate {
                    0.0
                } else {
                    v * scale
                }
            })
            .collect();

        Tensor::new(data, x.shape.clone())
    }
}
