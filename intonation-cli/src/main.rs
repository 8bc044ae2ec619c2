//! # Intonation - Command Line Host
//!
//! Wires the intonation core to the outside world.
//!
//! ## Architecture
//! - **listen**: CPAL capture on the audio thread, frames over a crossbeam
//!   channel, the live monitor on the main thread
//! - **analyze**: WAV decoding, then one segmentation pass on a worker thread
//! - **reference**: equal-tempered frequency of a note name

mod listen;
mod wav;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use intonation_core::{Config, SegmentAnalyzer, audio::DecodeSource, tuning};
use tracing_subscriber::EnvFilter;

use crate::wav::WavDecoder;

#[derive(Parser, Debug)]
#[command(name = "intonation", version, about = "Pitch monitor and note segmenter")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Monitor the default microphone and report detected notes
    Listen {
        /// Stop after this many seconds (runs until the stream ends otherwise)
        #[arg(long)]
        seconds: Option<u64>,

        /// Reference note to tune against, e.g. "A" or "C#4"; auto-detect if omitted
        #[arg(long)]
        reference: Option<String>,
    },

    /// Segment a WAV recording into notes
    Analyze {
        file: PathBuf,

        /// Print events as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the reference frequency of a note, e.g. "A4"
    Reference { note: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Command::Listen { seconds, reference } => listen::run(config.monitor, seconds, reference.as_deref()),
        Command::Analyze { file, json } => analyze(config, file, json),
        Command::Reference { note } => {
            let (note_index, octave) = tuning::parse_note_name(&note)?;
            let frequency = tuning::reference_frequency(note_index, octave)?;
            println!("{}{}: {:.2} Hz", tuning::NOTE_NAMES[note_index as usize], octave, frequency);
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn analyze(config: Config, file: PathBuf, json: bool) -> Result<()> {
    let buffer = WavDecoder::new(&file)
        .decode()
        .with_context(|| format!("decoding {}", file.display()))?;
    tracing::info!("[MAIN] Analyzing {:.2}s of audio...", buffer.duration());

    let analyzer = SegmentAnalyzer::new(config.analyzer);
    let events = analyzer
        .analyze_in_background(buffer)
        .recv()
        .context("analysis worker exited without a result")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    println!("{:>8}  {:>8}  {:<5} {:>10}  {:>6}", "start", "length", "note", "frequency", "cents");
    for event in &events {
        println!(
            "{:>7.2}s  {:>7.2}s  {:<5} {:>7.1} Hz  {:>+6}",
            event.start_time,
            event.duration,
            event.label.to_string(),
            event.frequency,
            event.label.cents
        );
    }
    println!("{} notes", events.len());
    Ok(())
}
