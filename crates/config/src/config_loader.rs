use serde::{Deserialize, Serialize};
use std::{fs, path::Path, str::FromStr};
use tracing::{debug, info, warn};

use app_error::{AppError, AppErrorExt, AppResult};

use crate::{PasswordAlgorithm, Secret};

pub const CONFIG_PATH_VAR: &str = "APP_CONFIG_PATH";
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 3600;
pub const DEFAULT_PASSWORD_COST: u32 = 10;
pub const DEFAULT_MAX_PASSWORD_COST: u32 = 12;
/// Hard ceiling for any configured cost cap (bcrypt's own limit).
pub const ABSOLUTE_MAX_PASSWORD_COST: u32 = 31;
pub const SUPPORTED_JWT_ALGORITHM: &str = "HS256";
const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Complete application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub environment: String,
    pub security: SecurityConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SecurityConfig {
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct JwtConfig {
    pub secret: Secret,
    pub ttl_seconds: u64,
    pub algorithm: String,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Secret>, ttl_seconds: u64) -> Self {
        Self {
            secret: secret.into(),
            ttl_seconds,
            algorithm: SUPPORTED_JWT_ALGORITHM.to_string(),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::new(Secret::default(), DEFAULT_TOKEN_TTL_SECONDS)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PasswordConfig {
    pub algorithm: PasswordAlgorithm,
    pub cost: u32,
    pub max_cost: u32,
    pub argon2: Argon2Config,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            algorithm: PasswordAlgorithm::Bcrypt,
            cost: DEFAULT_PASSWORD_COST,
            max_cost: DEFAULT_MAX_PASSWORD_COST,
            argon2: Argon2Config::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Argon2Config {
    pub memory_kib: u32,
    pub parallelism: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_kib: 19456,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MonitoringConfig {
    pub sentry: SentryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SentryConfig {
    pub dsn: Secret,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: Secret::default(),
            sample_rate: 1.0,
            traces_sample_rate: 0.2,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub hide_secrets: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            hide_secrets: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))
            .config_err()?;
        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e))
            .config_err()?;
        debug!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from `APP_CONFIG_PATH` and the process environment
    pub fn load() -> AppResult<Self> {
        if dotenv::dotenv().is_ok() {
            debug!("Loaded environment from .env");
        }
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` in place of the process environment
    pub fn load_with<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::resolve_with(&lookup)?;
        config.validate()?;

        info!("Loaded configuration for environment: {}", config.environment);
        Ok(config)
    }

    /// File and overrides without validation, for callers that check only a section
    pub fn resolve_with<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(path)?,
            None => {
                warn!("{} is not set. Using default configuration.", CONFIG_PATH_VAR);
                Self::default()
            }
        };

        config.apply_overrides(&lookup)?;
        Ok(config)
    }

    /// Apply environment overrides on top of file or default values
    pub fn apply_overrides<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(environment) = lookup("APP_ENVIRONMENT") {
            self.environment = environment;
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.security.jwt.secret = Secret::new(secret);
        }
        if let Some(ttl) = lookup("JWT_TTL_SECONDS") {
            self.security.jwt.ttl_seconds = parse_override("JWT_TTL_SECONDS", &ttl)?;
        }
        if let Some(algorithm) = lookup("PASSWORD_ALGORITHM") {
            self.security.password.algorithm = PasswordAlgorithm::from_str(&algorithm)
                .map_err(|e| AppError::ConfigError(anyhow::anyhow!("PASSWORD_ALGORITHM: {}", e)))?;
        }
        if let Some(cost) = lookup("PASSWORD_COST") {
            self.security.password.cost = parse_override("PASSWORD_COST", &cost)?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.monitoring.logging.level = level;
        }
        if let Some(dsn) = lookup("SENTRY_DSN") {
            self.monitoring.sentry.dsn = Secret::new(dsn);
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Validate the configuration
    pub fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        let is_production = self.is_production();

        self.validate_jwt_config(&self.security.jwt, is_production, &mut errors);
        self.validate_password_config(&self.security.password, &mut errors);

        if self.monitoring.logging.level.trim().is_empty() {
            errors.push("Logging level cannot be empty".to_string());
        }

        if is_production && !self.monitoring.logging.hide_secrets {
            errors.push("hide_secrets must stay enabled in production".to_string());
        }

        config_result(errors)
    }

    /// Validate only the password hashing section
    pub fn validate_password(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        self.validate_password_config(&self.security.password, &mut errors);
        config_result(errors)
    }

    fn validate_jwt_config(&self, jwt: &JwtConfig, is_production: bool, errors: &mut Vec<String>) {
        if jwt.secret.is_empty() {
            errors.push("JWT secret must be supplied via configuration or JWT_SECRET".to_string());
        } else if is_production && jwt.secret.len() < MIN_PRODUCTION_SECRET_LEN {
            errors.push(format!(
                "JWT secret must be at least {} bytes in production",
                MIN_PRODUCTION_SECRET_LEN
            ));
        }

        if jwt.algorithm != SUPPORTED_JWT_ALGORITHM {
            errors.push(format!(
                "JWT algorithm '{}' is not supported; only {} is accepted",
                jwt.algorithm, SUPPORTED_JWT_ALGORITHM
            ));
        }

        if jwt.ttl_seconds == 0 {
            errors.push("JWT ttl_seconds must be greater than 0".to_string());
        }
    }

    fn validate_password_config(&self, password: &PasswordConfig, errors: &mut Vec<String>) {
        let min_cost = password.algorithm.min_cost();

        if password.max_cost > ABSOLUTE_MAX_PASSWORD_COST {
            errors.push(format!(
                "Password max_cost {} exceeds the hard limit of {}",
                password.max_cost, ABSOLUTE_MAX_PASSWORD_COST
            ));
        }

        if password.cost < min_cost || password.cost > password.max_cost {
            errors.push(format!(
                "Password cost {} must be between {} and {} for {}",
                password.cost, min_cost, password.max_cost, password.algorithm
            ));
        }

        if password.algorithm == PasswordAlgorithm::Argon2id {
            if password.argon2.parallelism == 0 {
                errors.push("Argon2 parallelism must be greater than 0".to_string());
            }
            if password.argon2.memory_kib < password.argon2.parallelism.saturating_mul(8) {
                errors.push("Argon2 memory_kib must be at least 8 x parallelism".to_string());
            }
        }
    }
}

fn config_result(errors: Vec<String>) -> AppResult<()> {
    if errors.is_empty() {
        return Ok(());
    }
    Err(AppError::ConfigError(anyhow::anyhow!(
        "Invalid configuration: {}",
        errors.join(", ")
    )))
}

fn parse_override<T: FromStr>(name: &str, value: &str) -> AppResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("{}='{}': {}", name, value, e)))
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            security: SecurityConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}
