//! CLI argument definitions for sendkit.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `send` | Send one request through the pipeline |
//! | `batch` | Send many requests concurrently |
//!
//! # Global Options
//!
//! Unset options fall back to `SENDKIT_*` environment variables, then to
//! built-in defaults.
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--base-url` | none | Prefix for relative paths |
//! | `--timeout-ms` | `3000` | Per-attempt timeout |
//! | `--retries` | `2` | Retries after the first attempt |
//! | `--retry-delay-ms` | `500` | Pause between attempts |
//! | `--breaker-threshold` | `3` | Failures before the breaker opens |
//! | `--breaker-open-secs` | `30` | How long the breaker stays open |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! sendkit send https://httpbin.org/json --pretty
//! sendkit --base-url https://api.example.test send /items --method post --body '{"name":"n"}'
//! sendkit batch "https://api.example.test/items/{id}" --tasks 20 --concurrency 4
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use sendkit_core::HttpMethod;

/// Resilient HTTP sender with caching, retries and a circuit breaker.
#[derive(Debug, Parser)]
#[command(name = "sendkit", author, version, about = "Resilient HTTP send pipeline")]
pub struct Cli {
    /// Base URL joined to relative request paths.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Per-attempt timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Retries after the first failed attempt.
    #[arg(long, global = true)]
    pub retries: Option<u32>,

    /// Fixed delay between attempts in milliseconds.
    #[arg(long, global = true)]
    pub retry_delay_ms: Option<u64>,

    /// Consecutive failures that open the circuit breaker.
    #[arg(long, global = true)]
    pub breaker_threshold: Option<u32>,

    /// Seconds the breaker stays open before a probe.
    #[arg(long, global = true)]
    pub breaker_open_secs: Option<u64>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send one request and print the resulting unit.
    ///
    /// # Examples
    ///
    ///   sendkit send https://httpbin.org/json
    ///   sendkit send /items --method post --body '{"name":"n"}' --header x-trace:abc
    Send(SendArgs),

    /// Send one request per task id, bounded by --concurrency.
    ///
    /// Every `{id}` in the path is replaced with the task id.
    ///
    /// # Examples
    ///
    ///   sendkit batch "https://api.example.test/items/{id}" --tasks 10 --concurrency 3
    Batch(BatchArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Get,
    Post,
    Put,
    Delete,
}

impl From<MethodArg> for HttpMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Get => Self::Get,
            MethodArg::Post => Self::Post,
            MethodArg::Put => Self::Put,
            MethodArg::Delete => Self::Delete,
        }
    }
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Absolute URL or path relative to --base-url.
    pub path: String,

    #[arg(long, value_enum, default_value_t = MethodArg::Get)]
    pub method: MethodArg,

    /// JSON request body.
    #[arg(long)]
    pub body: Option<String>,

    /// Request header as NAME:VALUE. Repeatable.
    #[arg(long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    /// Cache lifetime in minutes; 0 disables caching for this request.
    #[arg(long)]
    pub cache_minutes: Option<i64>,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Path template; `{id}` is replaced by each task id.
    pub path: String,

    #[arg(long, value_enum, default_value_t = MethodArg::Get)]
    pub method: MethodArg,

    /// Number of tasks to run.
    #[arg(long)]
    pub tasks: Option<usize>,

    /// Requests in flight at once.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Cache lifetime in minutes; 0 disables caching.
    #[arg(long)]
    pub cache_minutes: Option<i64>,
}
