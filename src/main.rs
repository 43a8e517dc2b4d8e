//! Replay binary
//!
//! Feeds a JSON-lines file of reassembled flow payloads through a decode
//! engine and writes the resulting observations to stdout as JSON lines.
//! One record per line:
//!
//! ```json
//! {"time":"2024-05-01T12:00:00Z","transport":"udp","src":"10.0.0.1:49172",
//!  "dst":"10.0.0.2:5060","payload":"4f5054494f4e53..."}
//! ```
//!
//! A record with `"close": true` instead of a payload is an explicit
//! flow-teardown signal.

mod cli;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::SocketAddr;

use anyhow::{bail, Context as _, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use flowsift::config::Config;
use flowsift::core::{Endpoint, JsonLinesSink, PduSlice, Transport};
use flowsift::engine::Engine;

use cli::Args;

/// One replay input line.
#[derive(Debug, Deserialize)]
struct ReplayRecord {
    time: DateTime<Utc>,
    transport: Transport,
    src: SocketAddr,
    dst: SocketAddr,
    #[serde(default)]
    payload: Option<String>,
    #[serde(default)]
    close: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if args.device.is_some() {
        config.engine.device = args.device.clone();
    }

    let engine = Engine::new(config);
    engine.add_sink(Box::new(JsonLinesSink::new(std::io::stdout())));

    let reader: Box<dyn BufRead> = if args.input.as_os_str() == "-" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(&args.input).with_context(
            || format!("opening input file {}", args.input.display()),
        )?))
    };

    let mut delivered = 0u64;
    let mut closed = 0u64;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading input line {}", lineno + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ReplayRecord = serde_json::from_str(&line)
            .with_context(|| format!("parsing replay record on line {}", lineno + 1))?;

        let src = Endpoint::new(record.src.ip(), record.src.port());
        let dst = Endpoint::new(record.dst.ip(), record.dst.port());

        if record.close {
            engine.close_flow(record.transport, src, dst, record.time);
            closed += 1;
            continue;
        }

        let Some(payload) = &record.payload else {
            bail!("line {}: record has neither payload nor close", lineno + 1);
        };
        let bytes = parse_hex(payload)
            .with_context(|| format!("decoding payload hex on line {}", lineno + 1))?;

        let slice = PduSlice::new(&bytes, record.time);
        engine.deliver(record.transport, src, dst, &slice);
        delivered += 1;
    }

    info!(delivered, closed, contexts = engine.context_count(), "replay finished");
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "flowsift=info",
        1 => "flowsift=debug",
        _ => "flowsift=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Decode a hex string, ignoring interior whitespace.
fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() % 2 != 0 {
        bail!("odd number of hex digits");
    }
    (0..compact.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&compact[i..i + 2], 16)
                .with_context(|| format!("invalid hex at offset {}", i))
        })
        .collect()
}
