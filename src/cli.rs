//! Command line arguments for the replay binary.

use std::path::PathBuf;

use clap::Parser;

/// Replay reassembled flow payloads through the decode engine and write
/// observations as JSON lines.
#[derive(Parser, Debug)]
#[command(name = "flowsift", version, about)]
pub struct Args {
    /// Input file of JSON-lines replay records; `-` reads stdin.
    pub input: PathBuf,

    /// Path to a TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Capture device label stamped on observations (overrides the
    /// configuration).
    #[arg(short, long)]
    pub device: Option<String>,

    /// Verbose output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
