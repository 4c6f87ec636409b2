use std::{fmt as stdfmt, io, sync::OnceLock};

use tracing_subscriber::{
    fmt::{self as tracing_fmt, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use url_triage_util::{AppConfig, Environment};

#[derive(Debug)]
pub enum TelemetryError {
    Tracing(tracing_subscriber::util::TryInitError),
}

impl stdfmt::Display for TelemetryError {
    fn fmt(&self, f: &mut stdfmt::Formatter<'_>) -> stdfmt::Result {
        match self {
            Self::Tracing(err) => write!(f, "failed to initialize tracing: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {}

impl From<tracing_subscriber::util::TryInitError> for TelemetryError {
    fn from(value: tracing_subscriber::util::TryInitError) -> Self {
        Self::Tracing(value)
    }
}

static TRACING_INIT: OnceLock<()> = OnceLock::new();

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log line shape: human readable locally, JSON lines when collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::Json,
            Environment::Development | Environment::Test => Self::Pretty,
        }
    }
}

fn fmt_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    // The run's stdout stays free for whatever wraps the job; logs go to stderr.
    let layer = tracing_fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_timer(UtcTime::rfc_3339());

    match format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

/// Installs the global subscriber once and records the job parameters.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryError> {
    if TRACING_INIT.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let format = LogFormat::for_environment(config.environment);

    tracing_subscriber::registry()
        .with(fmt_layer(format))
        .with(env_filter)
        .try_init()?;

    TRACING_INIT.set(()).ok();
    tracing::info!(
        stage = "telemetry",
        env = %config.environment.as_str(),
        version = BUILD_VERSION,
        git_sha = option_env!("GIT_SHA").unwrap_or("unknown"),
        source = %config.store.source_link(),
        results = %config.store.results_link(),
        netcraft = %config.netcraft_base_url,
        lookback_secs = config.lookback.as_secs(),
        "reconciliation job configured"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_logs_as_json() {
        assert_eq!(
            LogFormat::for_environment(Environment::Production),
            LogFormat::Json
        );
        assert_eq!(
            LogFormat::for_environment(Environment::Development),
            LogFormat::Pretty
        );
        assert_eq!(
            LogFormat::for_environment(Environment::Test),
            LogFormat::Pretty
        );
    }
}
