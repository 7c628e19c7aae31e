//! Language Model
//!
//! A decoder-only transformer over character ids.
//!
//! ## Architecture
//!
//! ```text
//! Input: token ids [batch, seq_len]
//!   ↓
//! Token Embedding + Positional Embedding
//!   ↓
//! TransformerBlock × num_layers
//!   ├─ x + MultiHeadAttention(LayerNorm(x))
//!   └─ x + FeedForward(LayerNorm(x))
//!   ↓
//! Final LayerNorm
//!   ↓
//! Linear projection to vocabulary (with bias)
//!   ↓
//! Output: logits [batch, seq_len, vocab_size]
//! ```
//!
//! The logits are raw scores; softmax belongs to whoever consumes them (the
//! loss or the generator).
//!
//! ## Ownership
//!
//! The model owns its embedding tables, its blocks and one [`CausalMask`]
//! sized for `seq_len`. The mask is lent read-only to every block on every
//! pass. Weights are never modified by a forward pass; an external optimizer
//! may update them between passes through [`LanguageModel::parameters_mut`].

use crate::config::ModelConfig;
use crate::error::{PuckError, Result};
use crate::layers::{
    CausalMask, Embedding, LayerNorm, Linear, Mode, PositionalEmbedding, TransformerBlock,
};
use crate::tensor::Tensor;
use rand::Rng;

#[derive(Clone, Debug)]
pub struct LanguageModel {
    config: ModelConfig,
    pub token_embedding: Embedding,
    pub positional_embedding: PositionalEmbedding,
    pub blocks: Vec<TransformerBlock>,
    pub norm: LayerNorm,
    pub lm_head: Linear,
    mask: CausalMask,
}

impl LanguageModel {
    /// Build a freshly initialised model
    ///
    /// # Arguments
    ///
    /// * `config` - Architecture; validated before any weight is allocated
    /// * `rng` - Generator for weight initialization
    ///
    /// # Errors
    ///
    /// `Configuration` if the config is not buildable.
    pub fn new<R: Rng + ?Sized>(config: ModelConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;

        let d = config.embedding_dim;
        let token_embedding = Embedding::new(config.vocab_size, d, rng)?;
        let positional_embedding = PositionalEmbedding::new(config.seq_len, d, rng)?;
        let blocks = (0..config.num_layers)
            .map(|_| TransformerBlock::new(d, config.num_heads, config.dropout, rng))
            .collect::<Result<Vec<_>>>()?;
        let norm = LayerNorm::new(d);
        let lm_head = Linear::new(d, config.vocab_size, rng)?;
        let mask = CausalMask::new(config.seq_len);

        let model = Self {
            config,
            token_embedding,
            positional_embedding,
            blocks,
            norm,
            lm_head,
            mask,
        };

        log::info!(
            "Built language model: {} layers, {} heads, embedding {}, context {}, vocab {}, {} parameters",
            model.config.num_layers,
            model.config.num_heads,
            model.config.embedding_dim,
            model.config.seq_len,
            model.config.vocab_size,
            model.count_parameters()
        );

        Ok(model)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn mask(&self) -> &CausalMask {
        &self.mask
    }

    /// Inference forward pass (dropout disabled)
    ///
    /// # Arguments
    ///
    /// * `ids` - Token ids [batch, seq_len], rectangular, `seq_len <= L`
    ///
    /// # Returns
    ///
    /// Logits [batch, seq_len, vocab_size]
    pub fn forward(&self, ids: &[Vec<usize>]) -> Result<Tensor> {
        self.forward_with(ids, &mut Mode::Inference)
    }

    /// Forward pass in an explicit mode
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` for an empty or ragged batch
    /// - `OutOfRange` if `seq_len > L` or any id is `>= vocab_size`
    pub fn forward_with(&self, ids: &[Vec<usize>], mode: &mut Mode<'_>) -> Result<Tensor> {
        let seq_len = ids.first().map(Vec::len).unwrap_or(0);
        if seq_len > self.config.seq_len {
            return Err(PuckError::range(format!(
                "sequence length {} exceeds context of {}",
                seq_len, self.config.seq_len
            )));
        }

        let tokens = self.token_embedding.forward(ids)?;
        let positions = self.positional_embedding.forward(seq_len)?;
        let mut x = tokens.add(&positions);

        for block in &self.blocks {
            x = block.forward(&x, &self.mask, mode)?;
        }

        let x = self.norm.forward(&x)?;
        self.lm_head.forward(&x)
    }

    /// Every learned tensor with its stable name, in checkpoint order
    pub fn parameters(&self) -> Vec<(String, &Tensor)> {
        let mut params = vec![
            ("token_embedding.weight".to_string(), &self.token_embedding.weight),
            (
                "positional_embedding.weight".to_string(),
                &self.positional_embedding.table.weight,
            ),
        ];

        for (i, block) in self.blocks.iter().enumerate() {
            let prefix = format!("blocks.{}", i);
            push_norm(&mut params, &format!("{}.norm1", prefix), &block.norm1);
            for (h, head) in block.attention.heads.iter().enumerate() {
                let head_prefix = format!("{}.attention.heads.{}", prefix, h);
                push_linear(&mut params, &format!("{}.key", head_prefix), &head.key);
                push_linear(&mut params, &format!("{}.query", head_prefix), &head.query);
                push_linear(&mut params, &format!("{}.value", head_prefix), &head.value);
            }
            push_linear(
                &mut params,
                &format!("{}.attention.projection", prefix),
                &block.attention.projection,
            );
            push_norm(&mut params, &format!("{}.norm2", prefix), &block.norm2);
            push_linear(&mut params, &format!("{}.feed_forward.fc1", prefix), &block.feed_forward.fc1);
            push_linear(&mut params, &format!("{}.feed_forward.fc2", prefix), &block.feed_forward.fc2);
        }

        push_norm(&mut params, "norm", &self.norm);
        push_linear(&mut params, "lm_head", &self.lm_head);
        params
    }

    /// Mutable view of [`parameters`](Self::parameters), same names and order
    pub fn parameters_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        let Self {
            token_embedding,
            positional_embedding,
            blocks,
            norm,
            lm_head,
            ..
        } = self;

        let mut params = vec![
            ("token_embedding.weight".to_string(), &mut token_embedding.weight),
            (
                "positional_embedding.weight".to_string(),
                &mut positional_embedding.table.weight,
            ),
        ];

        for (i, block) in blocks.iter_mut().enumerate() {
            let prefix = format!("blocks.{}", i);
            let TransformerBlock {
                norm1,
                attention,
                norm2,
                feed_forward,
            } = block;

            push_norm_mut(&mut params, &format!("{}.norm1", prefix), norm1);
            for (h, head) in attention.heads.iter_mut().enumerate() {
                let head_prefix = format!("{}.attention.heads.{}", prefix, h);
                push_linear_mut(&mut params, &format!("{}.key", head_prefix), &mut head.key);
                push_linear_mut(&mut params, &format!("{}.query", head_prefix), &mut head.query);
                push_linear_mut(&mut params, &format!("{}.value", head_prefix), &mut head.value);
            }
            push_linear_mut(
                &mut params,
                &format!("{}.attention.projection", prefix),
                &mut attention.projection,
            );
            push_norm_mut(&mut params, &format!("{}.norm2", prefix), norm2);
            push_linear_mut(&mut params, &format!("{}.feed_forward.fc1", prefix), &mut feed_forward.fc1);
            push_linear_mut(&mut params, &format!("{}.feed_forward.fc2", prefix), &mut feed_forward.fc2);
        }

        push_norm_mut(&mut params, "norm", norm);
        push_linear_mut(&mut params, "lm_head", lm_head);
        params
    }

    /// Count total number of learned scalars
    pub fn count_parameters(&self) -> usize {
        self.parameters().iter().map(|(_, t)| t.data.len()).sum()
    }
}

fn push_linear<'a>(params: &mut Vec<(String, &'a Tensor)>, prefix: &str, linear: &'a Linear) {
    params.push((format!("{}.weight", prefix), &linear.weight));
    if let Some(bias) = &linear.bias {
        params.push((format!("{}.bias", prefix), bias));
    }
}

fn push_norm<'a>(params: &mut Vec<(String, &'a Tensor)>, prefix: &str, norm: &'a LayerNorm) {
    params.push((format!("{}.gamma", prefix), &norm.gamma));
    params.push((format!("{}.beta", prefix), &norm.beta));
}

fn push_linear_mut<'a>(
    params: &mut Vec<(String, &'a mut Tensor)>,
    prefix: &str,
    linear: &'a mut Linear,
) {
    params.push((format!("{}.weight", prefix), &mut linear.weight));
    if let Some(bias) = linear.bias.as_mut() {
        params.push((format!("{}.bias", prefix), bias));
    }
}

fn push_norm_mut<'a>(
    params: &mut Vec<(String, &'a mut Tensor)>,
    prefix: &str,
    norm: &'a mut LayerNorm,
) {
    params.push((format!("{}.gamma", prefix), &mut norm.gamma));
    params.push((format!("{}.beta", prefix), &mut norm.beta));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::WindowedDataset;
    use crate::loss::cross_entropy;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> ModelConfig {
        ModelConfig {
            vocab_size: 4,
            seq_len: 3,
            embedding_dim: 8,
            num_heads: 2,
            num_layers: 2,
            dropout: 0.0,
        }
    }

    fn model(config: ModelConfig, seed: u64) -> LanguageModel {
        let mut rng = StdRng::seed_from_u64(seed);
        LanguageModel::new(config, &mut rng).unwrap()
    }

    #[test]
    fn test_logits_shape() {
        let model = model(config(), 0);
        let logits = model.forward(&[vec![0, 1, 2]]).unwrap();
        assert_eq!(logits.shape, vec![1, 3, 4]);

        let logits = model.forward(&[vec![3, 1], vec![2, 2]]).unwrap();
        assert_eq!(logits.shape, vec![2, 2, 4]);
    }

    #[test]
    fn test_single_window_end_to_end() {
        let model = model(config(), 0);
        let dataset = WindowedDataset::new(vec![vec![1, 2, 3]], 3, 1).unwrap();
        assert_eq!(dataset.len(), 1);

        let batch = dataset.get(0).unwrap();
        assert_eq!(batch.input, vec![vec![0, 1, 2]]);
        assert_eq!(batch.target, vec![vec![1, 2, 3]]);

        let logits = model.forward(&batch.input).unwrap();
        assert_eq!(logits.shape, vec![1, 3, 4]);
        assert!(cross_entropy(&logits, &batch.target).unwrap().is_finite());
    }

    #[test]
    fn test_rejects_long_sequence() {
        let model = model(config(), 0);
        let err = model.forward(&[vec![0, 1, 2, 3]]).unwrap_err();
        assert!(matches!(err, PuckError::OutOfRange(_)));
    }

    #[test]
    fn test_rejects_unknown_token() {
        let model = model(config(), 0);
        let err = model.forward(&[vec![0, 4]]).unwrap_err();
        assert!(matches!(err, PuckError::OutOfRange(_)));
    }

    #[test]
    fn test_rejects_ragged_and_empty() {
        let model = model(config(), 0);
        assert!(matches!(
            model.forward(&[vec![0, 1], vec![1]]),
            Err(PuckError::ShapeMismatch(_))
        ));
        assert!(matches!(model.forward(&[]), Err(PuckError::ShapeMismatch(_))));
    }

    #[test]
    fn test_invalid_config() {
        let mut rng = StdRng::seed_from_u64(0);
        let bad = ModelConfig {
            num_heads: 3,
            ..config()
        };
        assert!(matches!(
            LanguageModel::new(bad, &mut rng),
            Err(PuckError::Configuration(_))
        ));
    }

    #[test]
    fn test_earlier_logits_ignore_later_tokens() {
        let model = model(config(), 1);
        let a = model.forward(&[vec![1, 2, 0]]).unwrap();
        let b = model.forward(&[vec![1, 2, 3]]).unwrap();
        for i in 0..2 * 4 {
            assert!((a.data[i] - b.data[i]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_prefix_logits_match_shorter_input() {
        let model = model(config(), 2);
        let full = model.forward(&[vec![3, 1, 2]]).unwrap();
        let prefix = model.forward(&[vec![3, 1]]).unwrap();
        for (a, b) in prefix.data.iter().zip(&full.data[..2 * 4]) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_same_seed_same_weights() {
        let a = model(config(), 9);
        let b = model(config(), 9);
        let c = model(config(), 10);
        assert_eq!(a.parameters(), b.parameters());
        assert_ne!(a.parameters(), c.parameters());
    }

    #[test]
    fn test_training_mode_dropout() {
        let cfg = ModelConfig {
            dropout: 0.5,
            ..config()
        };
        let model = model(cfg, 3);
        let ids = [vec![1, 2, 3]];

        let inference = model.forward(&ids).unwrap();
        let mut rng_a = StdRng::seed_from_u64(5);
        let mut rng_b = StdRng::seed_from_u64(5);
        let train_a = model.forward_with(&ids, &mut Mode::Training(&mut rng_a)).unwrap();
        let train_b = model.forward_with(&ids, &mut Mode::Training(&mut rng_b)).unwrap();

        assert_eq!(train_a, train_b);
        assert_ne!(train_a, inference);
        assert_eq!(model.forward(&ids).unwrap(), inference);
    }

    #[test]
    fn test_parameter_names_and_count() {
        let model = model(config(), 0);
        let names: Vec<String> = model.parameters().into_iter().map(|(n, _)| n).collect();

        assert_eq!(names[0], "token_embedding.weight");
        assert_eq!(names[1], "positional_embedding.weight");
        assert_eq!(names[2], "blocks.0.norm1.gamma");
        assert_eq!(names[4], "blocks.0.attention.heads.0.key.weight");
        assert!(names.contains(&"blocks.1.attention.heads.1.value.weight".to_string()));
        assert!(names.contains(&"blocks.1.feed_forward.fc2.bias".to_string()));
        assert_eq!(names[names.len() - 2], "lm_head.weight");
        assert_eq!(names[names.len() - 1], "lm_head.bias");

        let (v, l, d) = (4, 3, 8);
        let per_block = 2 * d       // norm1
            + 3 * d * d             // key/query/value across heads
            + d * d + d             // projection
            + 2 * d                 // norm2
            + d * 4 * d + 4 * d     // fc1
            + 4 * d * d + d; // fc2
        let expected = v * d + l * d + 2 * per_block + 2 * d + d * v + v;
        assert_eq!(model.count_parameters(), expected);
    }

    #[test]
    fn test_parameters_mut_matches_order() {
        let mut model = model(config(), 0);
        let names: Vec<String> = model.parameters().into_iter().map(|(n, _)| n).collect();
        let names_mut: Vec<String> = model.parameters_mut().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, names_mut);

        for (_, t) in model.parameters_mut() {
            t.data.iter_mut().for_each(|v| *v = 0.0);
        }
        assert!(model.parameters().iter().all(|(_, t)| t.data.iter().all(|&v| v == 0.0)));
    }
}
