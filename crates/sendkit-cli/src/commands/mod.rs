mod batch;
mod send;

use sendkit_core::{HttpMethod, PipelineConfig};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub struct CommandResult {
    pub data: Value,
    /// At least one request ended without a successful response.
    pub failed: bool,
    pub cancelled: bool,
}

pub async fn run(cli: &Cli, cancel: &CancellationToken) -> Result<CommandResult, CliError> {
    let config = pipeline_config(cli, PipelineConfig::from_env()?)?;

    match &cli.command {
        Command::Send(args) => send::run(args, config, cancel).await,
        Command::Batch(args) => batch::run(args, config, cancel).await,
    }
}

/// Global flags override whatever the environment supplied.
fn pipeline_config(cli: &Cli, mut config: PipelineConfig) -> Result<PipelineConfig, CliError> {
    if let Some(base_url) = &cli.base_url {
        config.base_url = Some(base_url.clone());
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(retries) = cli.retries {
        config.retry.max_retry_attempts = retries;
    }
    if let Some(retry_delay_ms) = cli.retry_delay_ms {
        config.retry.retry_delay_ms = retry_delay_ms;
    }
    if let Some(threshold) = cli.breaker_threshold {
        config.breaker.failure_threshold = threshold;
    }
    if let Some(open_secs) = cli.breaker_open_secs {
        config.breaker.open_duration_secs = open_secs;
    }

    config.validate()?;
    Ok(config)
}

/// Only GETs are cached unless the caller asks otherwise; the cache key is
/// the path alone.
fn cache_minutes(method: HttpMethod, requested: Option<i64>, config: &PipelineConfig) -> i64 {
    match (requested, method) {
        (Some(minutes), _) => minutes,
        (None, HttpMethod::Get) => config.cache.default_minutes,
        (None, _) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "sendkit",
            "--base-url",
            "https://api.example.test",
            "--retries",
            "4",
            "--breaker-threshold",
            "9",
            "send",
            "/x",
        ])
        .expect("valid arguments");

        let config = pipeline_config(&cli, PipelineConfig::default()).expect("valid config");

        assert_eq!(config.base_url.as_deref(), Some("https://api.example.test"));
        assert_eq!(config.retry.max_retry_attempts, 4);
        assert_eq!(config.breaker.failure_threshold, 9);
        assert_eq!(config.timeout_ms, 3_000);
    }

    #[test]
    fn invalid_flag_values_fail_validation() {
        let cli = Cli::try_parse_from(["sendkit", "--timeout-ms", "0", "send", "/x"])
            .expect("valid arguments");

        let error = pipeline_config(&cli, PipelineConfig::default()).expect_err("zero timeout");
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn only_gets_default_to_cached() {
        let config = PipelineConfig::default();

        assert_eq!(cache_minutes(HttpMethod::Get, None, &config), 1);
        assert_eq!(cache_minutes(HttpMethod::Post, None, &config), 0);
        assert_eq!(cache_minutes(HttpMethod::Post, Some(5), &config), 5);
    }
}
