// TriageCrab - GPL-3.0-or-later
// This file is part of TriageCrab.
//
// Copyright (C) 2025 Daniel Freiermuth
//
// TriageCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// TriageCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with TriageCrab.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use triagecrab::config::AnalysisConfig;
use triagecrab::core::Pipeline;
use triagecrab::parser;

#[cfg(feature = "ram-profiling")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

#[derive(Parser, Debug)]
#[command(name = "triagecrab")]
#[command(author = "TriageCrab Team")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"))]
#[command(about = "Score, cluster and forecast Windows security events", long_about = None)]
struct Args {
    /// JSON lines file with one security event per line
    #[arg(value_name = "EVENTS")]
    events: PathBuf,

    /// Analysis config (default: the user config file, else built-in defaults)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Forecast reference time; its UTC day and later count as open
    #[arg(long = "as-of", value_name = "RFC3339")]
    as_of: Option<DateTime<Utc>>,

    /// Forecast horizon in days
    #[arg(long, value_name = "DAYS")]
    horizon: Option<u32>,

    /// Baseline from the N oldest events of each account class
    #[arg(long = "baseline-window", value_name = "N")]
    baseline_window: Option<usize>,

    /// Write the assessment here instead of stdout
    #[arg(long, short, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Leave out the per-event records
    #[arg(long = "summary-only")]
    summary_only: bool,

    /// Single-line JSON
    #[arg(long)]
    compact: bool,

    /// Path for the DHAT heap profiling output (only used when built with --features ram-profiling)
    #[cfg(feature = "ram-profiling")]
    #[arg(
        long = "profile-output",
        value_name = "PROFILE_FILE",
        default_value = "dhat-heap.json"
    )]
    profile_output: PathBuf,
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the assessment.
    // Set RUST_LOG to override (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::info!(
        "TriageCrab starting up (version {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    #[cfg(feature = "ram-profiling")]
    let _profiler = {
        tracing::info!("RAM profiling enabled, output: {:?}", args.profile_output);
        dhat::Profiler::builder()
            .file_name(args.profile_output.clone())
            .build()
    };

    #[cfg(feature = "cpu-profiling")]
    {
        tracing::info!("CPU profiling enabled with Tracy - run Tracy profiler to connect");
    }

    let mut config = match &args.config {
        Some(path) => AnalysisConfig::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnalysisConfig::load().context("loading user config")?,
    };
    if let Some(horizon) = args.horizon {
        config.forecast_horizon_days = horizon;
    }
    if args.baseline_window.is_some() {
        config.baseline_window = args.baseline_window;
    }
    let pipeline = Pipeline::new(config).context("invalid analysis config")?;

    let report = parser::load_events(&args.events)
        .with_context(|| format!("reading events from {}", args.events.display()))?;
    if !report.rejected.is_empty() {
        tracing::warn!("{} input lines were skipped", report.rejected.len());
    }

    let as_of = args.as_of.unwrap_or_else(Utc::now);
    let assessment = pipeline.run(report.events, as_of);

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };
    match (args.summary_only, args.compact) {
        (true, true) => serde_json::to_writer(&mut out, &assessment.summary()),
        (true, false) => serde_json::to_writer_pretty(&mut out, &assessment.summary()),
        (false, true) => serde_json::to_writer(&mut out, &assessment),
        (false, false) => serde_json::to_writer_pretty(&mut out, &assessment),
    }
    .context("writing assessment")?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
