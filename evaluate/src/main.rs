use std::fs::File;
use std::path::PathBuf;

use clap::Parser;
use langid::{read_dataset, Checkpoint, LinearScorer, Tokenizer, Trainer};

#[derive(Parser, Debug)]
#[command(about = "A program to evaluate the accuracy of language identification models.")]
struct Args {
    /// The model file to evaluate
    #[arg(long)]
    model: PathBuf,

    /// The directory holding the labeled evaluation corpus
    #[arg(long)]
    data: PathBuf,

    /// The batch budget, counted in segments
    #[arg(long, default_value = "1")]
    batch_size: usize,

    /// The fraction of corpus sentences to use
    #[arg(long, default_value = "1.0")]
    ratio: f32,

    /// The segment capacity, counted in units including the segment marker
    #[arg(long, default_value = "64")]
    seg_len: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    eprintln!("Loading model file...");
    let mut f = zstd::Decoder::new(File::open(args.model)?)?;
    let checkpoint = Checkpoint::read(&mut f)?;
    let mut scorer = LinearScorer::new(checkpoint.params, 0.0)?;

    eprintln!("Loading dataset...");
    let tokenizer = Tokenizer::default();
    let data = read_dataset(
        &args.data,
        &tokenizer,
        &checkpoint.vocab,
        &checkpoint.labels,
        args.ratio,
    )?;
    eprintln!("# of sentences: {}", data.len());

    // The learning rate is unused without parameter updates; any positive
    // value satisfies the constructor.
    let trainer = Trainer::new(args.batch_size, 1.0, args.seg_len)?;
    let stats = trainer.run_epoch(&mut scorer, &data, &checkpoint.vocab, false)?;

    println!("f1: {} acc: {}", stats.macro_f1(), stats.accuracy());

    Ok(())
}
