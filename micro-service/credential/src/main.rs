use app_config::{AppConfig, CONFIG_PATH_VAR};
use clap::Parser;
use micro_credential::cli::{self, Cli, ERROR_EXIT_CODE};
use micro_credential::telemetry;
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    let cli = Cli::parse();

    dotenv::dotenv().ok();

    let config_path = cli
        .config
        .as_ref()
        .map(|path| path.to_string_lossy().to_string());
    let lookup = |key: &str| {
        if key == CONFIG_PATH_VAR && config_path.is_some() {
            return config_path.clone();
        }
        std::env::var(key).ok()
    };

    // Logging is not installed yet; the source is reported once it is
    let config_source = lookup(CONFIG_PATH_VAR);

    // Each command validates the sections it needs
    let config = match AppConfig::resolve_with(&lookup) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::from(ERROR_EXIT_CODE);
        }
    };

    let _guard = match telemetry::init(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            return ExitCode::from(ERROR_EXIT_CODE);
        }
    };

    telemetry::log_config_source(config_source.as_deref());
    info!("Starting credential command at {}", chrono::Utc::now());

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout().lock();

    match cli::run(&cli.command, &config, &mut input, &mut output) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            error!(error_code = e.error_code(), "{}", e);
            ExitCode::from(ERROR_EXIT_CODE)
        }
    }
}
