//! Build a Character Vocabulary
//!
//! Collects every distinct character of a text corpus and writes the
//! `{character: id}` vocabulary JSON used by the other demos.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --example build_vocab -- \
//!     --corpus data/shakespeare.txt --output data/vocab.json
//! ```
//!
//! ## Prerequisites
//!
//! Download the tiny-shakespeare corpus:
//! ```bash
//! curl -o data/shakespeare.txt \
//!     https://raw.githubusercontent.com/karpathy/char-rnn/master/data/tinyshakespeare/input.txt
//! ```

use clap::Parser;
use puck::{CharTokenizer, PuckError};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "build_vocab", about = "Build a character vocabulary from a text corpus")]
struct Args {
    /// Text corpus (.txt)
    #[arg(long, default_value = "data/shakespeare.txt")]
    corpus: PathBuf,

    /// Destination vocabulary file (.json)
    #[arg(long, default_value = "data/vocab.json")]
    output: PathBuf,

    /// Overwrite an existing vocabulary file
    #[arg(long)]
    force: bool,
}

fn main() -> puck::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.corpus.extension().and_then(|e| e.to_str()) != Some("txt") {
        return Err(PuckError::Configuration(format!(
            "corpus must be a .txt file, got {}",
            args.corpus.display()
        )));
    }
    if args.output.extension().and_then(|e| e.to_str()) != Some("json") {
        return Err(PuckError::Configuration(format!(
            "vocabulary must be a .json file, got {}",
            args.output.display()
        )));
    }
    if args.output.exists() && !args.force {
        return Err(PuckError::Configuration(format!(
            "{} already exists (pass --force to overwrite)",
            args.output.display()
        )));
    }

    let corpus = fs::read_to_string(&args.corpus)?;
    let tokenizer = CharTokenizer::from_corpus(&corpus);
    tokenizer.save(&args.output)?;

    println!("Vocabulary: {} characters", tokenizer.vocab_size());
    let sample: String = (0..tokenizer.vocab_size())
        .filter_map(|id| tokenizer.itos(id).ok())
        .filter(|c| !c.is_control())
        .collect();
    println!("Characters: {:?}", sample);

    Ok(())
}
