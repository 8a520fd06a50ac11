use sendkit_core::{PipelineBuilder, PipelineConfig, RequestUnit, Sender, ValidationError};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::cli::SendArgs;
use crate::error::CliError;

use super::{cache_minutes, CommandResult};

pub async fn run(
    args: &SendArgs,
    config: PipelineConfig,
    cancel: &CancellationToken,
) -> Result<CommandResult, CliError> {
    let unit = build_unit(args, &config)?;
    let pipeline = PipelineBuilder::new(config).build()?;

    let unit = pipeline.send(unit, cancel).await?;

    Ok(CommandResult {
        failed: !unit.is_success(),
        cancelled: cancel.is_cancelled(),
        data: serde_json::to_value(&unit)?,
    })
}

fn build_unit(args: &SendArgs, config: &PipelineConfig) -> Result<RequestUnit<Value>, CliError> {
    let method = args.method.into();
    let mut unit = RequestUnit::new(method, args.path.clone())
        .with_cache_minutes(cache_minutes(method, args.cache_minutes, config));

    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        unit = unit.with_header(name, value);
    }

    if let Some(body) = &args.body {
        serde_json::from_str::<Value>(body).map_err(|error| CliError::InvalidBody(error.to_string()))?;
        unit = unit.with_body(body.clone());
    }

    Ok(unit)
}

fn parse_header(raw: &str) -> Result<(&str, &str), ValidationError> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value.trim())),
        _ => Err(ValidationError::InvalidHeader {
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::MethodArg;
    use sendkit_core::HttpMethod;

    fn args(method: MethodArg) -> SendArgs {
        SendArgs {
            path: String::from("/items"),
            method,
            body: None,
            headers: Vec::new(),
            cache_minutes: None,
        }
    }

    #[test]
    fn header_needs_name_and_colon() {
        assert_eq!(parse_header("X-Trace: abc"), Ok(("X-Trace", "abc")));
        assert_eq!(parse_header("accept:"), Ok(("accept", "")));
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(":value").is_err());
    }

    #[test]
    fn unit_carries_headers_and_body() {
        let mut send = args(MethodArg::Post);
        send.headers = vec![String::from("X-Trace:abc")];
        send.body = Some(String::from("{\"name\":\"n\"}"));

        let unit = build_unit(&send, &PipelineConfig::default()).expect("valid args");

        assert_eq!(unit.method, HttpMethod::Post);
        assert_eq!(unit.headers.get("x-trace").map(String::as_str), Some("abc"));
        assert_eq!(unit.request_body.as_deref(), Some("{\"name\":\"n\"}"));
        assert_eq!(unit.cache_duration_minutes, 0);
    }

    #[test]
    fn malformed_body_is_rejected() {
        let mut send = args(MethodArg::Put);
        send.body = Some(String::from("{not json"));

        let error = build_unit(&send, &PipelineConfig::default()).expect_err("bad body");
        assert!(matches!(error, CliError::InvalidBody(_)));
    }
}
