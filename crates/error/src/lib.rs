pub mod macros;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    ConfigError(anyhow::Error),
    ServerError(anyhow::Error),
    InputError(String),
    CorruptHashError(String),
    ResourceExhaustionError(String),
    AuthenticationError(String),
    CryptoError(String),
}

impl AppError {
    // User-friendly authentication errors
    pub fn invalid_credentials() -> Self {
        Self::AuthenticationError(
            "Invalid username or password. Please check your credentials and try again."
                .to_string(),
        )
    }

    pub fn token_expired() -> Self {
        Self::AuthenticationError(
            "Your session has expired. Please log in again to continue.".to_string(),
        )
    }

    pub fn token_invalid() -> Self {
        Self::AuthenticationError("Invalid authentication token. Please log in again.".to_string())
    }

    // Input errors
    pub fn invalid_input(field: &str, message: &str) -> Self {
        Self::InputError(format!("Invalid value for '{}': {}", field, message))
    }

    // Signing secret absent at call time
    pub fn missing_signing_secret() -> Self {
        Self::ConfigError(anyhow::anyhow!(
            "JWT signing secret is not configured; set security.jwt.secret or JWT_SECRET"
        ))
    }

    pub fn cost_exceeds_policy(cost: u32, max_cost: u32) -> Self {
        Self::ResourceExhaustionError(format!(
            "Hash cost {} exceeds the configured maximum of {}",
            cost, max_cost
        ))
    }

    pub fn corrupt_hash(reason: impl fmt::Display) -> Self {
        Self::CorruptHashError(format!("Stored password hash is malformed: {}", reason))
    }

    /// Whether the error stems from deployment setup rather than the request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigError(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InputError(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InputError(_) => "INVALID_INPUT",
            Self::CorruptHashError(_) => "CORRUPT_HASH",
            Self::ResourceExhaustionError(_) => "RESOURCE_EXHAUSTED",
            Self::AuthenticationError(_) => "AUTH_ERROR",
            Self::ServerError(_) | Self::CryptoError(_) => "SERVER_ERROR",
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::ServerError(error)
    }
}

// Human-friendly error messages
impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError(e) => write!(f, "Configuration error: {}", e),
            Self::ServerError(e) => write!(f, "Server error: {}", e),
            Self::InputError(msg) => write!(f, "Invalid input: {}", msg),
            Self::CorruptHashError(msg) => write!(f, "Corrupt hash: {}", msg),
            Self::ResourceExhaustionError(msg) => write!(f, "Resource exhaustion: {}", msg),
            Self::AuthenticationError(msg) => write!(f, "Authentication error: {}", msg),
            Self::CryptoError(msg) => write!(f, "Crypto error: {}", msg),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        let status = error.status_code();
        let (message, help) = match error {
            AppError::InputError(msg) => (
                msg.as_str(),
                Some("Please review your input and try again."),
            ),
            AppError::AuthenticationError(msg) => (
                msg.as_str(),
                Some("Please log in to access this resource."),
            ),
            AppError::ConfigError(_) => ("System configuration error", None),
            AppError::CorruptHashError(_) => ("Stored credential data is invalid", None),
            _ => ("Internal server error", None),
        };

        Self {
            status: status.to_string(),
            message: message.to_string(),
            code: error.error_code().to_string(),
            // Don't expose internal error details to clients
            details: if status.is_server_error() {
                None
            } else {
                Some(error.to_string())
            },
            help: help.map(String::from),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        let log_message = format!("[{}] {}: {}", error_code, status, self);
        if status.is_server_error() {
            tracing::error!(error_code = error_code, status_code = %status.as_u16(), "{}", log_message);
        } else {
            tracing::warn!(error_code = error_code, status_code = %status.as_u16(), "{}", log_message);
        }

        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

// Extension trait to wrap foreign errors with specific context
pub trait AppErrorExt<T> {
    fn config_err(self) -> AppResult<T>;
    fn server_err(self) -> AppResult<T>;
}

impl<T, E> AppErrorExt<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn config_err(self) -> AppResult<T> {
        self.map_err(|e| AppError::ConfigError(e.into()))
    }

    fn server_err(self) -> AppResult<T> {
        self.map_err(|e| AppError::ServerError(e.into()))
    }
}
