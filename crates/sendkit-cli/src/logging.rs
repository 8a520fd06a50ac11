//! Subscriber setup. Events go to stderr so stdout stays parseable JSON.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::CliError;

const LOG_ENV: &str = "SENDKIT_LOG";
const DEFAULT_DIRECTIVE: &str = "sendkit=info,sendkit_core=info";

pub fn init() -> Result<(), CliError> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(DEFAULT_DIRECTIVE))
        .map_err(|error| CliError::Logging(error.to_string()))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|error| CliError::Logging(error.to_string()))
}
