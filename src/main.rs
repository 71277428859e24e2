//! ranged-lines - parallel line-aligned file transformation
//!
//! Reverses (or otherwise transforms) a large text file using one worker per
//! line-aligned range.

use anyhow::{Context, Result};
use clap::Parser;
use ranged_lines::{
    Config, DEFAULT_BUFFER_SIZE, DEFAULT_ENCODING, OutputTarget, Placement, ReadMode,
    TerminatorPolicy, TransformKind, transform_file,
};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ranged-lines", version, about)]
#[command(long_about = "Transforms every line of a large text file in parallel. \
    Without --output the input file is replaced once every slice has been written.")]
struct Cli {
    /// File to transform
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Write to this file instead of replacing the input
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Number of ranges and worker threads
    #[arg(short, long, default_value_t = 5)]
    threads: usize,

    /// Character encoding label (UTF-8, GBK, latin1, ...)
    #[arg(short, long, default_value = DEFAULT_ENCODING)]
    encoding: String,

    /// Bytes per read window; 0 reads each range at once
    #[arg(short, long, default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Line transform: reverse | xor
    #[arg(long, default_value = "reverse")]
    transform: TransformKind,

    /// Output placement: mirrored | identity
    #[arg(long, default_value = "mirrored")]
    placement: Placement,

    /// Treat `\r\n` as one terminator
    #[arg(long)]
    crlf: bool,

    /// Read through file handles instead of memory maps
    #[arg(long)]
    buffered: bool,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> Config {
        Config::default()
            .threads(self.threads)
            .encoding(self.encoding.as_str())
            .buffer_size(self.buffer_size)
            .terminators(if self.crlf {
                TerminatorPolicy::CrLfAware
            } else {
                TerminatorPolicy::Bytewise
            })
            .read_mode(if self.buffered {
                ReadMode::Buffered
            } else {
                ReadMode::Mapped
            })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if !cli.input.is_file() {
        anyhow::bail!("Not a regular file: {}", cli.input.display());
    }

    let target = match &cli.output {
        Some(path) => OutputTarget::File(path.clone()),
        None => OutputTarget::ReplaceInput,
    };

    let summary = transform_file(
        &cli.input,
        target,
        cli.config(),
        cli.placement,
        cli.transform.build(),
    )
    .with_context(|| format!("failed to transform {}", cli.input.display()))?;

    println!(
        "{} lines in {} ranges, {} bytes, {}ms",
        summary.lines(),
        summary.ranges().len(),
        summary.input_len(),
        summary.elapsed().as_millis()
    );

    if !summary.is_complete() {
        for failure in summary.failures() {
            eprintln!("range {}: {}", failure.range, failure.error);
        }
        anyhow::bail!("{} range(s) failed", summary.failures().len());
    }

    Ok(())
}
