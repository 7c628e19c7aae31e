//! Cross-Entropy Loss and Evaluation
//!
//! The loss compares logits `[batch, seq, V]` against target ids
//! `[batch, seq]`. Batch and sequence axes are flattened, so every position
//! counts as one prediction:
//!
//! ```text
//! loss = mean over positions of  -log softmax(logits[p])[target[p]]
//!      = mean of  logsumexp(logits[p]) - logits[p][target[p]]
//! ```
//!
//! The log-sum-exp subtracts the row maximum first, so large logits do not
//! overflow.
//!
//! Perplexity is `exp(loss)`: the effective number of characters the model
//! is choosing between at each step.

use crate::data::WindowedDataset;
use crate::error::{PuckError, Result};
use crate::model::LanguageModel;
use crate::tensor::Tensor;
use rayon::prelude::*;

/// Mean token-wise cross-entropy
///
/// # Arguments
///
/// * `logits` - Raw scores [batch, seq, vocab_size]
/// * `targets` - Expected ids [batch, seq]
///
/// # Errors
///
/// - `ShapeMismatch` if the target grid does not match the logits
/// - `OutOfRange` if a target id is `>= vocab_size`
pub fn cross_entropy(logits: &Tensor, targets: &[Vec<usize>]) -> Result<f32> {
    if logits.ndim() != 3 {
        return Err(PuckError::shape(format!(
            "logits must be [batch, seq, vocab], got {:?}",
            logits.shape
        )));
    }
    let (batch, seq, vocab) = (logits.shape[0], logits.shape[1], logits.shape[2]);
    if targets.len() != batch || targets.iter().any(|row| row.len() != seq) {
        return Err(PuckError::shape(format!(
            "targets do not match logits of shape {:?}",
            logits.shape
        )));
    }
    if let Some(&bad) = targets.iter().flatten().find(|&&t| t >= vocab) {
        return Err(PuckError::range(format!(
            "target id {} outside [0, {})",
            bad, vocab
        )));
    }
    if batch * seq == 0 {
        return Err(PuckError::shape("cannot compute loss over zero positions"));
    }

    let flat_targets: Vec<usize> = targets.iter().flatten().copied().collect();
    let total: f32 = logits
        .data
        .par_chunks(vocab)
        .zip(flat_targets.par_iter())
        .map(|(row, &target)| {
            let max_logit = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
            let exp_sum: f32 = row.iter().map(|&x| (x - max_logit).exp()).sum();
            // Subtract before adding the log-sum so large logits cancel exactly
            (max_logit - row[target]) + exp_sum.ln()
        })
        .sum();

    Ok(total / (batch * seq) as f32)
}

/// Perplexity corresponding to a mean cross-entropy
pub fn perplexity(loss: f32) -> f32 {
    loss.exp()
}

/// Mean loss over every batch of a dataset, in inference mode
///
/// # Errors
///
/// `OutOfRange` if the dataset has no complete batch, plus any error from
/// the forward pass.
pub fn evaluate(model: &LanguageModel, dataset: &WindowedDataset) -> Result<f32> {
    if dataset.is_empty() {
        return Err(PuckError::range(format!(
            "dataset of {} rows has no batch of {}",
            dataset.num_rows(),
            dataset.batch_size()
        )));
    }

    let mut total = 0.0;
    for index in 0..dataset.len() {
        let batch = dataset.get(index)?;
        let logits = model.forward(&batch.input)?;
        let loss = cross_entropy(&logits, &batch.target)?;
        log::debug!("Batch {}/{}: loss {:.4}", index + 1, dataset.len(), loss);
        total += loss;
    }

    let mean = total / dataset.len() as f32;
    log::info!(
        "Evaluated {} batches: loss {:.4}, perplexity {:.2}",
        dataset.len(),
        mean,
        perplexity(mean)
    );
    Ok(mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_uniform_logits() {
        let logits = Tensor::zeros(vec![2, 3, 4]);
        let targets = vec![vec![0, 1, 2], vec![3, 3, 0]];
        let loss = cross_entropy(&logits, &targets).unwrap();
        assert!((loss - 4f32.ln()).abs() < 1e-6);
        assert!((perplexity(loss) - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_confident_prediction() {
        let logits = Tensor::new(vec![100.0, 0.0, 0.0, 0.0, 100.0, 0.0], vec![1, 2, 3]);
        let right = cross_entropy(&logits, &[vec![0, 1]]).unwrap();
        let wrong = cross_entropy(&logits, &[vec![2, 2]]).unwrap();
        assert!(right < 1e-6);
        assert!((wrong - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_large_logits_are_stable() {
        let logits = Tensor::new(vec![1000.0, 1000.0], vec![1, 1, 2]);
        let loss = cross_entropy(&logits, &[vec![0]]).unwrap();
        assert!(loss.is_finite());
        assert!((loss - 2f32.ln()).abs() < 1e-5);

        let logits = Tensor::new(vec![5000.0, 4999.0, 4000.0], vec![1, 1, 3]);
        let loss = cross_entropy(&logits, &[vec![1]]).unwrap();
        let expected = 1.0 + (1.0 + (-1.0f32).exp()).ln();
        assert!((loss - expected).abs() < 1e-5);
    }

    #[test]
    fn test_mismatched_targets() {
        let logits = Tensor::zeros(vec![1, 2, 3]);
        assert!(matches!(
            cross_entropy(&logits, &[vec![0]]),
            Err(PuckError::ShapeMismatch(_))
        ));
        assert!(matches!(
            cross_entropy(&logits, &[vec![0, 3]]),
            Err(PuckError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_evaluate_dataset() {
        let config = ModelConfig::tiny(5);
        let mut rng = StdRng::seed_from_u64(42);
        let model = LanguageModel::new(config, &mut rng).unwrap();

        let tokens: Vec<usize> = (0..16 * 6).map(|i| i % 5).collect();
        let dataset = WindowedDataset::from_tokens(&tokens, 16, 2).unwrap();
        let loss = evaluate(&model, &dataset).unwrap();

        // Freshly initialised weights predict close to uniformly
        assert!((loss - 5f32.ln()).abs() < 0.5, "loss {}", loss);

        let empty = WindowedDataset::new(vec![vec![0; 16]], 16, 2).unwrap();
        assert!(evaluate(&model, &empty).is_err());
    }
}
