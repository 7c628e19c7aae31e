//! Generate Text
//!
//! Samples Shakespeare-style text from a prompt, one character at a time.
//! Without a checkpoint the model is freshly initialised from a preset, which
//! produces noise but exercises the whole pipeline.
//!
//! ## Usage
//!
//! ```bash
//! # From a trained checkpoint
//! cargo run --release --example generate -- \
//!     --checkpoint checkpoints/shakespeare.bin --prompt "ROMEO:" --tokens 200
//!
//! # Checkpoint, vocabulary and seed from a run config
//! cargo run --release --example generate -- --config run.json --prompt "ROMEO:"
//!
//! # Untrained model from a preset
//! cargo run --release --example generate -- --preset tiny --prompt "To be"
//! ```

use clap::Parser;
use puck::{
    checkpoint, generate_text, CharTokenizer, LanguageModel, ModelConfig, PuckError, RunConfig,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "generate", about = "Sample text from a character-level model")]
struct Args {
    /// Run config JSON; supplies the checkpoint, vocabulary and seed
    #[arg(long)]
    config: Option<PathBuf>,

    /// Trained checkpoint; omit to use a randomly initialised preset
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Preset used when no checkpoint is given (tiny, small, shakespeare, default)
    #[arg(long, default_value = "shakespeare")]
    preset: String,

    /// Character vocabulary JSON
    #[arg(long, default_value = "data/vocab.json")]
    vocab: PathBuf,

    /// Text to continue
    #[arg(long, default_value = "\n")]
    prompt: String,

    /// Characters to generate (defaults to context length - 1)
    #[arg(long)]
    tokens: Option<usize>,

    /// Seed for initialization and sampling
    #[arg(long, default_value = "42")]
    seed: u64,
}

fn main() -> puck::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let mut args = Args::parse();

    if let Some(path) = &args.config {
        let run = RunConfig::from_file(path)?;
        args.checkpoint.get_or_insert(run.save_path);
        args.vocab = run.vocab_file;
        args.seed = run.seed;
    }

    let tokenizer = CharTokenizer::load(&args.vocab)?;
    let mut rng = StdRng::seed_from_u64(args.seed);

    let model = match &args.checkpoint {
        Some(path) => checkpoint::load(path)?,
        None => {
            let config = ModelConfig::preset(&args.preset, tokenizer.vocab_size())?;
            LanguageModel::new(config, &mut rng)?
        }
    };

    if model.config().vocab_size != tokenizer.vocab_size() {
        return Err(PuckError::Configuration(format!(
            "model expects {} tokens but the vocabulary has {}",
            model.config().vocab_size,
            tokenizer.vocab_size()
        )));
    }

    let text = generate_text(&model, &tokenizer, &args.prompt, args.tokens, &mut rng)?;
    println!("{}", text);

    Ok(())
}
