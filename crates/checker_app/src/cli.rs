use std::path::PathBuf;

use clap::Parser;

/// Checks every handle in a CSV file against a lookup endpoint and writes the
/// rows whose account exists.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "handle-checker")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// CSV file with a header row and one handle per row
    #[arg(short, long)]
    pub input: PathBuf,

    /// Column holding the handle (default: username, user, handle, account,
    /// login, else the first column)
    #[arg(long)]
    pub key_column: Option<String>,

    /// RON file with `run` and `probe` settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Where to write the found rows (default: found-<UTC timestamp>.csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write the results log to this CSV file
    #[arg(long)]
    pub results: Option<PathBuf>,

    /// Lookup URL containing a `{key}` placeholder
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Extra request header, repeatable
    #[arg(long = "header", value_name = "NAME: VALUE")]
    pub headers: Vec<String>,

    /// Maximum probes in flight
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Probe attempts per handle before giving up
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Per-probe timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Retry unparsable responses instead of failing the handle
    #[arg(long)]
    pub retry_malformed: bool,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Log retries and print every informational event
    #[arg(short, long)]
    pub verbose: bool,
}
