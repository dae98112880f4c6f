use app_config::{AppConfig, CONFIG_PATH_VAR, LogFormat, LoggingConfig, SentryConfig};
use app_error::{AppError, AppErrorExt, AppResult};
use std::borrow::Cow;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. Output goes to stderr; stdout carries command results.
pub fn init_logging(config: &LoggingConfig) -> AppResult<()> {
    let filter = log_filter(&config.level)?;

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(sentry_tracing::layer())
            .try_init()
            .server_err()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(sentry_tracing::layer())
            .try_init()
            .server_err()?,
    }

    info!("Logging initialized with level: {}", config.level);
    Ok(())
}

/// `RUST_LOG` wins over the configured level
pub fn log_filter(level: &str) -> AppResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Invalid log level '{}': {}", level, e))
        }),
    }
}

/// Sentry options for a configured DSN, or `None` when reporting is off
pub fn sentry_options(
    sentry: &SentryConfig,
    environment: &str,
    hide_secrets: bool,
) -> AppResult<Option<sentry::ClientOptions>> {
    if sentry.dsn.is_empty() {
        return Ok(None);
    }

    let dsn: sentry::types::Dsn = sentry
        .dsn
        .expose()
        .trim()
        .parse()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid Sentry DSN: {}", e)))?;

    Ok(Some(sentry::ClientOptions {
        dsn: Some(dsn),
        release: sentry::release_name!(),
        environment: Some(Cow::Owned(environment.to_string())),
        sample_rate: sentry.sample_rate,
        traces_sample_rate: sentry.traces_sample_rate,
        send_default_pii: !hide_secrets,
        ..Default::default()
    }))
}

/// Report where configuration came from. Called after `init`, since loading runs first.
pub fn log_config_source(config_path: Option<&str>) {
    match config_path {
        Some(path) => info!("Configuration loaded from {}", path),
        None => warn!("{} is not set. Using default configuration.", CONFIG_PATH_VAR),
    }
}

/// Start Sentry and logging. Keep the guard alive for the life of the process.
pub fn init(config: &AppConfig) -> AppResult<Option<sentry::ClientInitGuard>> {
    let logging = &config.monitoring.logging;
    let guard = sentry_options(
        &config.monitoring.sentry,
        &config.environment,
        logging.hide_secrets,
    )?
    .map(sentry::init);

    init_logging(logging)?;

    if guard.is_some() {
        info!("Sentry reporting enabled");
    }
    Ok(guard)
}
