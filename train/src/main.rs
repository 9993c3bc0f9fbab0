use std::fs::File;
use std::path::PathBuf;

use clap::Parser;
use langid::{
    read_dataset, scan_characters, scan_labels, Checkpoint, LabelSet, LinearScorer, ModelConfig,
    ScorerParams, Tokenizer, Trainer, Vocabulary,
};

#[derive(Parser, Debug)]
#[command(about = "A program to train language identification models.")]
struct Args {
    /// The directory holding the training corpus, one file per labeled source
    #[arg(long)]
    train: PathBuf,

    /// The directory holding the held-out corpus used for early stopping
    #[arg(long)]
    dev: Option<PathBuf>,

    /// The file to write checkpoints to
    #[arg(long)]
    model: PathBuf,

    /// The batch budget, counted in segments
    #[arg(long, default_value = "1")]
    batch_size: usize,

    /// The dropout probability used during training
    #[arg(long, default_value = "0.1")]
    dropout: f32,

    /// The learning rate
    #[arg(long, default_value = "0.001")]
    lr: f32,

    /// The fraction of corpus sentences to use
    #[arg(long, default_value = "1.0")]
    ratio: f32,

    /// The hidden dimension
    #[arg(long, default_value = "512")]
    dim: u32,

    /// The number of word-encoder layers
    #[arg(long, default_value = "2")]
    word_layer: u32,

    /// The number of segment-encoder layers
    #[arg(long, default_value = "2")]
    seg_layer: u32,

    /// The number of recurrent sentence layers
    #[arg(long, default_value = "1")]
    sent_layer: u32,

    /// The number of attention heads
    #[arg(long, default_value = "8")]
    head: u32,

    /// Characters with at most this training-corpus frequency are dropped
    /// from the vocabulary
    #[arg(long, default_value = "0")]
    cutoff: usize,

    /// The segment capacity, counted in units including the segment marker
    #[arg(long, default_value = "64")]
    seg_len: usize,

    /// The maximum number of epochs
    #[arg(long, default_value = "100")]
    max_epochs: usize,

    /// Write a checkpoint every this many epochs
    #[arg(long, default_value = "1")]
    checkpoint_interval: usize,

    /// The number of workers for zstd (0 means multithreaded will be disabled)
    #[arg(long, default_value = "0")]
    zstd_workers: u32,
}

fn write_checkpoint(args: &Args, checkpoint: &Checkpoint) -> Result<(), Box<dyn std::error::Error>> {
    let mut f = zstd::Encoder::new(File::create(&args.model)?, 19)?;
    f.multithread(args.zstd_workers)?;
    checkpoint.write(&mut f)?;
    f.finish()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    eprintln!("Scanning vocabulary...");
    let chars = scan_characters(&args.train, args.cutoff, args.ratio)?;
    let vocab = Vocabulary::new(chars)?;
    let labels = LabelSet::new(scan_labels(&args.train)?)?;
    eprintln!("# of characters: {}", vocab.len());
    eprintln!("# of labels: {}", labels.len());

    eprintln!("Loading dataset...");
    let tokenizer = Tokenizer::default();
    let train_data = read_dataset(&args.train, &tokenizer, &vocab, &labels, args.ratio)?;
    eprintln!("# of training sentences: {}", train_data.len());
    let dev_data = match &args.dev {
        Some(dir) => {
            let data = read_dataset(dir, &tokenizer, &vocab, &labels, 1.0)?;
            eprintln!("# of held-out sentences: {}", data.len());
            Some(data)
        }
        None => None,
    };

    let config = ModelConfig {
        hidden_dim: args.dim,
        word_layers: args.word_layer,
        word_heads: args.head,
        seg_layers: args.seg_layer,
        seg_heads: args.head,
        sent_layers: args.sent_layer,
    };
    let params = ScorerParams::init(
        vocab.len() as u32,
        args.dim,
        args.sent_layer,
        labels.len() as u32,
    );
    let mut scorer = LinearScorer::new(params, args.dropout)?;
    let trainer = Trainer::new(args.batch_size, args.lr, args.seg_len)?;

    eprintln!("Start training...");
    let mut iteration = 0u64;
    let mut prev_f1 = f64::NEG_INFINITY;
    for epoch in 1..=args.max_epochs {
        let stats = trainer.run_epoch(&mut scorer, &train_data, &vocab, true)?;
        iteration += stats.iterations() as u64;
        eprintln!(
            "epoch: {epoch} loss: {} f1: {} acc: {}",
            stats.mean_loss(),
            stats.macro_f1(),
            stats.accuracy()
        );

        let f1 = match &dev_data {
            Some(data) => {
                let dev_stats = trainer.run_epoch(&mut scorer, data, &vocab, false)?;
                eprintln!(
                    "epoch: {epoch} dev f1: {} dev acc: {}",
                    dev_stats.macro_f1(),
                    dev_stats.accuracy()
                );
                dev_stats.macro_f1()
            }
            None => stats.macro_f1(),
        };
        if f1 <= prev_f1 {
            eprintln!("Metric stopped improving, stopping.");
            break;
        }
        prev_f1 = f1;

        if epoch % args.checkpoint_interval == 0 || epoch == args.max_epochs {
            let checkpoint = Checkpoint {
                iteration,
                config: config.clone(),
                labels: labels.clone(),
                vocab: vocab.clone(),
                params: scorer.params().clone(),
            };
            write_checkpoint(&args, &checkpoint)?;
            eprintln!("Wrote {:?} at iteration {iteration}", args.model);
        }
    }
    eprintln!("Finish training.");

    Ok(())
}
