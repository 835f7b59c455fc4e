//! CLI argument parsing for execdiff

use crate::diff::Strategy;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for diff reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary (default)
    Text,
    /// Serialized report for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "execdiff")]
#[command(version)]
#[command(about = "Structural diff of two recorded execution traces", long_about = None)]
pub struct Cli {
    /// First trace (.json, or .ndjson/.jsonl with one event per line)
    #[arg(value_name = "TRACE_A")]
    pub trace_a: PathBuf,

    /// Second trace
    #[arg(value_name = "TRACE_B")]
    pub trace_b: PathBuf,

    /// Matching strategy (overrides the config file)
    #[arg(short, long, value_enum)]
    pub strategy: Option<Strategy>,

    /// Cost per unmatched step (overrides the config file)
    #[arg(long = "skip-cost", value_name = "COST")]
    pub skip_cost: Option<u64>,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// List every matched pair in text output
    #[arg(long = "show-pairs")]
    pub show_pairs: bool,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}
