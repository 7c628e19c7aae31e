//! Puck: Character-Level Transformer Language Model
//!
//! A small decoder-only transformer implemented from scratch in Rust for
//! learning how language models compute. Named after the mischievous sprite
//! of *A Midsummer Night's Dream*, and trained on Shakespeare one character
//! at a time.
//!
//! # Pipeline
//!
//! ```text
//! text ──CharTokenizer──> ids ──segment_into_rows──> rows [N, L]
//!                                                      │
//!                            WindowedDataset ──> (input, target) batches
//!                                                      │
//!                     LanguageModel::forward ──> logits [B, L, V]
//!                           │                          │
//!                     generate (sampling)        cross_entropy (loss)
//! ```
//!
//! # Modules
//!
//! - [`tensor`] - Row-major `f32` tensor with rayon-parallel kernels
//! - [`layers`] - Linear, embeddings, layer norm, dropout, attention, blocks
//! - [`model`] - The [`LanguageModel`] forward pass and parameter listing
//! - [`generate`] - Autoregressive sampling
//! - [`data`] - Corpus segmentation and windowed batches
//! - [`tokenizer`] - Character vocabulary
//! - [`loss`] - Cross-entropy and dataset evaluation
//! - [`checkpoint`] - Binary save/load
//! - [`config`] - Model presets and run settings
//!
//! # Randomness
//!
//! Nothing in the crate keeps hidden random state. Weight initialization,
//! dropout, shuffling and sampling all draw from a generator the caller
//! passes in, so one seed reproduces a whole run.
//!
//! # Example
//!
//! ```rust
//! use puck::{generate_text, CharTokenizer, LanguageModel, ModelConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let corpus = "Shall I compare thee to a summer's day?";
//! let tokenizer = CharTokenizer::from_corpus(corpus);
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let model = LanguageModel::new(ModelConfig::tiny(tokenizer.vocab_size()), &mut rng)?;
//!
//! let text = generate_text(&model, &tokenizer, "Shall", Some(10), &mut rng)?;
//! assert!(text.starts_with("Shall"));
//! # Ok::<(), puck::PuckError>(())
//! ```

pub mod checkpoint;
pub mod config;
pub mod data;
pub mod error;
pub mod generate;
pub mod layers;
pub mod loss;
pub mod model;
pub mod tensor;
pub mod tokenizer;

// Re-export main types for convenience
pub use config::{ModelConfig, RunConfig};
pub use data::{segment_into_rows, shuffle_rows, Batch, TrainValidation, WindowedDataset};
pub use error::{PuckError, Result};
pub use generate::{generate, generate_text, next_token_probs, sample_categorical};
pub use layers::Mode;
pub use loss::{cross_entropy, evaluate, perplexity};
pub use model::LanguageModel;
pub use tensor::Tensor;
pub use tokenizer::CharTokenizer;
