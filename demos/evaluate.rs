//! Evaluate a Checkpoint
//!
//! Reports cross-entropy and perplexity of a model on the validation rows of
//! a pretokenized corpus (see the `pretokenize` demo).
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --example evaluate -- \
//!     --checkpoint checkpoints/shakespeare.bin \
//!     --rows data/shakespeare_rows.json --batch-size 16 --split 0.9
//!
//! # Checkpoint, batch size and split from a run config
//! cargo run --release --example evaluate -- --config run.json
//! ```

use clap::Parser;
use puck::data::load_rows;
use puck::{checkpoint, evaluate, perplexity, PuckError, RunConfig, WindowedDataset};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "evaluate", about = "Validation loss and perplexity of a checkpoint")]
struct Args {
    /// Run config JSON; supplies the checkpoint, batch size and split
    #[arg(long)]
    config: Option<PathBuf>,

    /// Trained checkpoint (required without --config)
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Pretokenized rows JSON
    #[arg(long, default_value = "data/shakespeare_rows.json")]
    rows: PathBuf,

    /// Rows per batch
    #[arg(long, default_value = "16")]
    batch_size: usize,

    /// Fraction of rows that were used for training
    #[arg(long, default_value = "0.9")]
    split: f32,

    /// Also evaluate the training rows
    #[arg(long)]
    train: bool,
}

fn main() -> puck::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let mut args = Args::parse();

    if let Some(path) = &args.config {
        let run = RunConfig::from_file(path)?;
        args.checkpoint.get_or_insert(run.save_path);
        args.batch_size = run.batch_size;
        args.split = run.split;
    }

    let checkpoint_path = args
        .checkpoint
        .as_ref()
        .ok_or_else(|| PuckError::Configuration("pass --checkpoint or --config".into()))?;
    let model = checkpoint::load(checkpoint_path)?;
    let rows = load_rows(&args.rows)?;
    let data = WindowedDataset::split(rows, args.split, model.config().seq_len, args.batch_size)?;

    if args.train {
        let loss = evaluate(&model, &data.train)?;
        println!("Train loss: {:.4} | perplexity: {:.2}", loss, perplexity(loss));
    }

    let loss = evaluate(&model, &data.val)?;
    println!("Validation loss: {:.4} | perplexity: {:.2}", loss, perplexity(loss));

    Ok(())
}
