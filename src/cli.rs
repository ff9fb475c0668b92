use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "postforge")]
#[command(
    author,
    version,
    about = "Media post-production pipeline: backup, audio normalization, captions, enhancement, thumbnails"
)]
pub struct Cli {
    /// Input video to process
    #[arg(required = true)]
    pub input: PathBuf,

    /// Directory for generated outputs (default: a sibling of the input
    /// named after it)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Validate input, config, and tools without processing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
