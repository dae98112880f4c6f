use app_config::AppConfig;
use app_error::{AppError, AppResult, input_error};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    jwt::{TokenAuthenticator, TokenValidation},
    logging::{SecurityEvent, log_security_event, sanitize_for_logging},
    password::{PasswordHasher, StoredHash, hasher_from_config},
};

/// Trait defining the credential service interface
pub trait CredentialServiceTrait: Send + Sync {
    /// Hash a new secret for storage
    fn enroll(&self, secret: &str) -> AppResult<StoredHash>;

    /// Enroll a secret for `subject` and issue its first token
    fn register(&self, subject: &str, secret: &str) -> AppResult<RegisterResponse>;

    /// Check a secret against its stored hash and issue a token for `subject`
    fn authenticate(&self, subject: &str, secret: &str, stored: &StoredHash)
    -> AppResult<AuthResponse>;

    /// Validate a presented token
    fn check_token(&self, token: &str) -> AppResult<TokenValidation>;

    /// Get the token authenticator
    fn get_token_authenticator(&self) -> Arc<TokenAuthenticator>;
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub subject: String,
    pub expires_at: DateTime<Utc>,
    /// Replacement hash when the stored one used an outdated scheme or cost
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rehash: Option<StoredHash>,
}

/// Result of a registration. The stored hash is for the caller to persist, not to send.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    #[serde(skip_serializing)]
    pub stored: StoredHash,
    pub token: String,
    pub subject: String,
    pub expires_at: DateTime<Utc>,
}

/// Implementation of the credential service
#[derive(Debug, Clone)]
pub struct CredentialService {
    hasher: Arc<dyn PasswordHasher>,
    authenticator: Arc<TokenAuthenticator>,
    cost: u32,
}

impl CredentialService {
    pub fn new(
        hasher: Arc<dyn PasswordHasher>,
        authenticator: Arc<TokenAuthenticator>,
        cost: u32,
    ) -> Self {
        Self {
            hasher,
            authenticator,
            cost,
        }
    }

    /// Build the service from validated configuration
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let authenticator = TokenAuthenticator::from_config(&config.security.jwt)?;
        let password = &config.security.password;

        info!(
            algorithm = %password.algorithm,
            cost = password.cost,
            ttl_seconds = config.security.jwt.ttl_seconds,
            "Credential service configured"
        );

        Ok(Self::new(
            hasher_from_config(password),
            Arc::new(authenticator),
            password.cost,
        ))
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn hasher(&self) -> &dyn PasswordHasher {
        self.hasher.as_ref()
    }
}

impl CredentialServiceTrait for CredentialService {
    fn get_token_authenticator(&self) -> Arc<TokenAuthenticator> {
        Arc::clone(&self.authenticator)
    }

    fn enroll(&self, secret: &str) -> AppResult<StoredHash> {
        let result = self.hasher.hash(secret.as_bytes(), self.cost);

        match &result {
            Ok(_) => log_security_event(SecurityEvent::PasswordHashed, None, true, None),
            Err(e) => log_security_event(
                SecurityEvent::PasswordHashed,
                None,
                false,
                Some(e.error_code()),
            ),
        }

        result
    }

    fn register(&self, subject: &str, secret: &str) -> AppResult<RegisterResponse> {
        if subject.trim().is_empty() {
            return input_error!("subject", "must not be empty");
        }

        let stored = self.enroll(secret)?;
        let issued = self.authenticator.issue_default(subject)?;
        info!(
            subject = %sanitize_for_logging(subject),
            "Credentials registered"
        );

        Ok(RegisterResponse {
            stored,
            token: issued.token,
            subject: issued.subject,
            expires_at: issued.expires_at,
        })
    }

    fn authenticate(
        &self,
        subject: &str,
        secret: &str,
        stored: &StoredHash,
    ) -> AppResult<AuthResponse> {
        if subject.trim().is_empty() {
            return input_error!("subject", "must not be empty");
        }

        let is_valid = self.hasher.verify(secret.as_bytes(), stored).map_err(|e| {
            error!("Stored hash for login could not be decoded: {}", e);
            e
        })?;

        log_security_event(SecurityEvent::PasswordVerified, Some(subject), is_valid, None);

        if !is_valid {
            return Err(AppError::invalid_credentials());
        }

        let rehash = if self.hasher.needs_rehash(stored, self.cost) {
            // login still succeeds without the upgrade
            match self.hasher.hash(secret.as_bytes(), self.cost) {
                Ok(fresh) => Some(fresh),
                Err(e) => {
                    warn!("Failed to upgrade stored hash: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let issued = self.authenticator.issue_default(subject)?;

        Ok(AuthResponse {
            token: issued.token,
            subject: issued.subject,
            expires_at: issued.expires_at,
            rehash,
        })
    }

    fn check_token(&self, token: &str) -> AppResult<TokenValidation> {
        self.authenticator.validate(token)
    }
}
