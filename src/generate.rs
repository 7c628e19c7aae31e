//! Autoregressive Generation
//!
//! Text is produced one token at a time. Each step:
//!
//! ```text
//! context = last L tokens of the sequence      (older context is dropped)
//! logits  = model(context)[-1]                 (final position only, [V])
//! probs   = softmax(logits)
//! next    = sample(probs)                      (cumulative draw, not argmax)
//! sequence.push(next)
//! ```
//!
//! Exactly `k` tokens are appended; there is no early stop on an
//! end-of-text token, that is a caller policy.
//!
//! ## Sampling
//!
//! A uniform value `u` in `[0, 1)` is drawn from the caller's generator and
//! the first id whose cumulative probability exceeds `u` is chosen. With a
//! fixed seed the whole generated sequence is reproducible.

use crate::error::{PuckError, Result};
use crate::layers::Mode;
use crate::model::LanguageModel;
use crate::tensor::softmax_row;
use crate::tokenizer::CharTokenizer;
use rand::Rng;

/// Draw an index from a categorical distribution
///
/// # Arguments
///
/// * `probs` - Probabilities summing to 1
/// * `rng` - Source of the uniform draw
pub fn sample_categorical<R: Rng + ?Sized>(probs: &[f32], rng: &mut R) -> usize {
    let u: f32 = rng.random();

    let mut cumsum = 0.0;
    for (i, &p) in probs.iter().enumerate() {
        cumsum += p;
        if u < cumsum {
            return i;
        }
    }

    // Rounding left the total just under u; fall back to the last possible id
    probs.iter().rposition(|&p| p > 0.0).unwrap_or(0)
}

/// Next-token distribution after `sequence`, using at most the last L tokens
///
/// # Errors
///
/// `ShapeMismatch` for an empty sequence, plus any forward-pass error.
pub fn next_token_probs(model: &LanguageModel, sequence: &[usize]) -> Result<Vec<f32>> {
    if sequence.is_empty() {
        return Err(PuckError::shape("generation needs at least one context token"));
    }

    let context_len = model.config().seq_len;
    let start = sequence.len().saturating_sub(context_len);
    let context = vec![sequence[start..].to_vec()];

    let logits = model.forward_with(&context, &mut Mode::Inference)?;
    let vocab = model.config().vocab_size;
    let last = logits.data.len() - vocab;
    Ok(softmax_row(&logits.data[last..]))
}

/// Extend `prompt` by exactly `max_new_tokens` sampled tokens
///
/// # Arguments
///
/// * `model` - Model in inference mode
/// * `prompt` - Starting ids, at least one
/// * `max_new_tokens` - Number of tokens to append (k)
/// * `rng` - Generator for the categorical draws
///
/// # Returns
///
/// The prompt followed by the `k` new tokens
///
/// # Example
///
/// ```rust
/// # use puck::{generate, LanguageModel, ModelConfig};
/// # use rand::{rngs::StdRng, SeedableRng};
/// let mut rng = StdRng::seed_from_u64(42);
/// let model = LanguageModel::new(ModelConfig::tiny(10), &mut rng)?;
/// let tokens = generate(&model, &[1, 2, 3], 5, &mut rng)?;
/// assert_eq!(tokens.len(), 8);
/// # Ok::<(), puck::PuckError>(())
/// ```
pub fn generate<R: Rng + ?Sized>(
    model: &LanguageModel,
    prompt: &[usize],
    max_new_tokens: usize,
    rng: &mut R,
) -> Result<Vec<usize>> {
    if prompt.is_empty() {
        return Err(PuckError::shape("generation needs at least one prompt token"));
    }

    let mut sequence = Vec::with_capacity(prompt.len() + max_new_tokens);
    sequence.extend_from_slice(prompt);

    for step in 0..max_new_tokens {
        let probs = next_token_probs(model, &sequence)?;
        let next = sample_categorical(&probs, rng);
        log::debug!("Step {}: sampled token {} (p = {:.4})", step, next, probs[next]);
        sequence.push(next);
    }

    Ok(sequence)
}

/// Encode a text prompt, generate, and decode the full sequence
///
/// `max_new_tokens` defaults to `L - 1` when `None`.
pub fn generate_text<R: Rng + ?Sized>(
    model: &LanguageModel,
    tokenizer: &CharTokenizer,
    prompt: &str,
    max_new_tokens: Option<usize>,
    rng: &mut R,
) -> Result<String> {
    let k = max_new_tokens.unwrap_or(model.config().seq_len.saturating_sub(1));
    let ids = tokenizer.encode(prompt)?;
    let generated = generate(model, &ids, k, rng)?;
    tokenizer.decode(&generated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn model(vocab_size: usize) -> LanguageModel {
        let mut rng = StdRng::seed_from_u64(0);
        let config = ModelConfig {
            seq_len: 4,
            ..ModelConfig::tiny(vocab_size)
        };
        LanguageModel::new(config, &mut rng).unwrap()
    }

    #[test]
    fn test_sample_one_hot() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            assert_eq!(sample_categorical(&[0.0, 0.0, 1.0, 0.0], &mut rng), 2);
        }
    }

    #[test]
    fn test_sample_frequencies() {
        let mut rng = StdRng::seed_from_u64(2);
        let probs = [0.2, 0.5, 0.3];
        let mut counts = [0usize; 3];
        for _ in 0..10_000 {
            counts[sample_categorical(&probs, &mut rng)] += 1;
        }
        for (count, p) in counts.iter().zip(probs) {
            let freq = *count as f32 / 10_000.0;
            assert!((freq - p).abs() < 0.03, "freq {} vs {}", freq, p);
        }
    }

    #[test]
    fn test_length_and_prefix() {
        let model = model(6);
        let mut rng = StdRng::seed_from_u64(3);
        let prompt = [1, 2];
        let out = generate(&model, &prompt, 7, &mut rng).unwrap();
        assert_eq!(out.len(), prompt.len() + 7);
        assert_eq!(&out[..2], &prompt);
        assert!(out.iter().all(|&t| t < 6));
    }

    #[test]
    fn test_zero_tokens_returns_prompt() {
        let model = model(6);
        let mut rng = StdRng::seed_from_u64(4);
        assert_eq!(generate(&model, &[5, 4, 3], 0, &mut rng).unwrap(), vec![5, 4, 3]);
    }

    #[test]
    fn test_empty_prompt() {
        let model = model(6);
        let mut rng = StdRng::seed_from_u64(5);
        assert!(matches!(
            generate(&model, &[], 3, &mut rng),
            Err(PuckError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_long_context_is_cropped() {
        let model = model(6);
        let long = [0, 1, 2, 3, 4, 5, 1, 2];
        let tail = &long[long.len() - 4..];

        let from_long = next_token_probs(&model, &long).unwrap();
        let from_tail = next_token_probs(&model, tail).unwrap();
        assert_eq!(from_long, from_tail);

        let logits = model.forward(&[tail.to_vec()]).unwrap();
        let expected = softmax_row(&logits.data[3 * 6..]);
        assert_eq!(from_long, expected);
    }

    #[test]
    fn test_prompt_longer_than_context() {
        let model = model(6);
        let mut rng = StdRng::seed_from_u64(6);
        let out = generate(&model, &[1; 10], 3, &mut rng).unwrap();
        assert_eq!(out.len(), 13);
    }

    #[test]
    fn test_same_seed_same_tokens() {
        let model = model(6);
        let a = generate(&model, &[1], 10, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = generate(&model, &[1], 10, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_out_of_vocab_prompt() {
        let model = model(6);
        let mut rng = StdRng::seed_from_u64(8);
        assert!(matches!(
            generate(&model, &[6], 1, &mut rng),
            Err(PuckError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_text_round_trip() {
        let corpus = "to be or not to be";
        let tokenizer = CharTokenizer::from_corpus(corpus);
        let model = model(tokenizer.vocab_size());
        let mut rng = StdRng::seed_from_u64(9);

        let text = generate_text(&model, &tokenizer, "to", None, &mut rng).unwrap();
        assert_eq!(text.chars().count(), 2 + 3);
        assert!(text.starts_with("to"));

        let ids = tokenizer.encode(&text).unwrap();
        assert_eq!(tokenizer.decode(&ids).unwrap(), text);
    }
}
