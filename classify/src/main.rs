use std::fs::File;
use std::path::PathBuf;

use clap::Parser;
use langid::{
    read_documents, Checkpoint, LinearScorer, StreamingClassifier, Tokenizer,
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_SEGMENT_CAP,
};

#[derive(Parser, Debug)]
#[command(about = "A program to identify the language of documents.")]
struct Args {
    /// The model file to use when analyzing text
    #[arg(long)]
    model: PathBuf,

    /// The directory holding the documents to classify, one document per file
    #[arg(long)]
    data: PathBuf,

    /// The probability above which classification stops early
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    threshold: f32,

    /// The maximum number of segments read per document
    #[arg(long, default_value_t = DEFAULT_SEGMENT_CAP)]
    cap: usize,

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
    let classifier = StreamingClassifier::new(args.threshold, args.cap)?;

    let tokenizer = Tokenizer::default();
    let documents = read_documents(&args.data, &tokenizer, &checkpoint.vocab)?;

    for (path, tokens) in documents {
        if tokens.is_empty() {
            eprintln!("Warning: skipping empty document {}", path.display());
            continue;
        }
        let p = classifier.classify(&mut scorer, &checkpoint.vocab, &tokens, args.seg_len)?;
        let label = checkpoint
            .labels
            .name(p.label)
            .ok_or("predicted label is not in the label set")?;
        println!(
            "{}\t{}\t{:.4}\t{} segments",
            path.display(),
            label,
            p.probability,
            p.segments_read
        );
    }

    Ok(())
}
