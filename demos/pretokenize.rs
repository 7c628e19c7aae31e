//! Pretokenize a Corpus
//!
//! Encodes a text corpus, cuts it into rows of `seq_len` tokens (padding the
//! last row), shuffles the rows and saves them as JSON. Then splits the rows
//! into training and validation sets and shows what the model is asked to
//! predict for the first batch.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --example pretokenize -- \
//!     --corpus data/shakespeare.txt --vocab data/vocab.json \
//!     --output data/shakespeare_rows.json --seq-len 32
//!
//! # Or take every setting from a run config
//! cargo run --release --example pretokenize -- --config run.json
//! ```

use clap::Parser;
use puck::data::{save_rows, START_TOKEN};
use puck::{segment_into_rows, shuffle_rows, CharTokenizer, RunConfig, WindowedDataset};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pretokenize", about = "Encode, segment and shuffle a text corpus")]
struct Args {
    /// Run config JSON; its data, vocabulary, context and seed settings win
    #[arg(long)]
    config: Option<PathBuf>,

    /// Text corpus
    #[arg(long, default_value = "data/shakespeare.txt")]
    corpus: PathBuf,

    /// Character vocabulary JSON
    #[arg(long, default_value = "data/vocab.json")]
    vocab: PathBuf,

    /// Destination for the token rows
    #[arg(long, default_value = "data/shakespeare_rows.json")]
    output: PathBuf,

    /// Tokens per row (the model context length)
    #[arg(long, default_value = "32")]
    seq_len: usize,

    /// Rows per batch
    #[arg(long, default_value = "16")]
    batch_size: usize,

    /// Fraction of rows used for training
    #[arg(long, default_value = "0.9")]
    split: f32,

    /// Shuffle seed
    #[arg(long, default_value = "42")]
    seed: u64,
}

fn main() -> puck::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let mut args = Args::parse();

    if let Some(path) = &args.config {
        let run = RunConfig::from_file(path)?;
        args.corpus = run.data_file;
        args.vocab = run.vocab_file;
        args.seq_len = run.model.seq_len;
        args.batch_size = run.batch_size;
        args.split = run.split;
        args.seed = run.seed;
    }

    let tokenizer = CharTokenizer::load(&args.vocab)?;
    let text = fs::read_to_string(&args.corpus)?;
    let tokens = tokenizer.encode(&text)?;
    println!("Encoded {} characters", tokens.len());

    let mut rows = segment_into_rows(&tokens, args.seq_len, START_TOKEN)?;
    let mut rng = StdRng::seed_from_u64(args.seed);
    shuffle_rows(&mut rows, &mut rng);
    save_rows(&args.output, &rows)?;

    let data = WindowedDataset::split(rows, args.split, args.seq_len, args.batch_size)?;
    println!(
        "Train: {} rows x {} | Valid: {} rows x {}",
        data.train.num_rows(),
        args.seq_len,
        data.val.num_rows(),
        args.seq_len
    );

    if data.train.is_empty() {
        println!("Not enough rows for a single training batch");
        return Ok(());
    }

    let batch = data.train.get(0)?;
    let (input, target) = (&batch.input[0], &batch.target[0]);

    println!("\nIn token space:");
    for i in 1..=args.seq_len.min(8) {
        println!("  When input is {:?}, target is {}", &input[..i], target[i - 1]);
    }

    println!("\nIn character space:");
    for i in 1..=args.seq_len.min(8) {
        println!(
            "  When input is {:?}, target is {:?}",
            tokenizer.decode(&input[1..i])?,
            tokenizer.decode(&target[i - 1..i])?
        );
    }

    Ok(())
}
