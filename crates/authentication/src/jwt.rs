use app_config::{JwtConfig, SUPPORTED_JWT_ALGORITHM};
use app_error::{AppError, AppResult, input_error};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error};
use uuid::Uuid;

use crate::logging::{SecurityEvent, log_security_event};

/// The only algorithm tokens are signed with or accepted under.
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    pub iat: i64,    // Issued at
    pub exp: i64,    // Expiration time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>, // Token ID
}

impl Claims {
    fn new(subject: &str, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            sub: subject.to_string(),
            iat: issued_at.timestamp(),
            // rounded up so the lifetime is never shorter than requested
            exp: expires_at.timestamp() + i64::from(expires_at.timestamp_subsec_nanos() > 0),
            jti: Some(Uuid::new_v4().to_string()),
        }
    }

    /// Expired once `now` reaches `exp`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Valid,
    Expired,
    InvalidSignature,
    UnsupportedAlgorithm,
    Malformed,
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Valid => "valid",
            Self::Expired => "expired",
            Self::InvalidSignature => "invalid_signature",
            Self::UnsupportedAlgorithm => "unsupported_algorithm",
            Self::Malformed => "malformed",
        };
        f.write_str(name)
    }
}

/// Outcome of checking a presented token. Rejection is a value, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenValidation {
    /// Set only when the signature checked out
    pub subject: Option<String>,
    pub status: TokenStatus,
}

impl TokenValidation {
    fn accepted(subject: String) -> Self {
        Self {
            subject: Some(subject),
            status: TokenStatus::Valid,
        }
    }

    fn expired(subject: String) -> Self {
        Self {
            subject: Some(subject),
            status: TokenStatus::Expired,
        }
    }

    fn rejected(status: TokenStatus) -> Self {
        Self {
            subject: None,
            status,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == TokenStatus::Valid
    }

    /// Subject of a valid token, or the authentication error an HTTP layer should return
    pub fn into_subject(self) -> AppResult<String> {
        match (self.status, self.subject) {
            (TokenStatus::Valid, Some(subject)) => Ok(subject),
            (TokenStatus::Expired, _) => Err(AppError::token_expired()),
            _ => Err(AppError::token_invalid()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Issues and validates HS256 tokens under a single signing secret
pub struct TokenAuthenticator {
    keys: Option<SigningKeys>,
    default_ttl: Duration,
    validation: Validation,
}

impl fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("algorithm", &TOKEN_ALGORITHM)
            .field("default_ttl", &self.default_ttl)
            .field("keys", &self.keys.as_ref().map(|_| "[hidden]"))
            .finish()
    }
}

impl TokenAuthenticator {
    /// An empty or all-whitespace secret is accepted here; every call then fails with a
    /// configuration error.
    pub fn new(secret: &[u8], default_ttl: Duration) -> Self {
        let keys = if secret.trim_ascii().is_empty() {
            None
        } else {
            Some(SigningKeys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
            })
        };

        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.leeway = 0;
        // exp is compared against the caller's clock in validate_at
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            keys,
            default_ttl,
            validation,
        }
    }

    pub fn from_config(config: &JwtConfig) -> AppResult<Self> {
        if config.algorithm != SUPPORTED_JWT_ALGORITHM {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT algorithm '{}' is not supported",
                config.algorithm
            )));
        }
        let ttl_seconds = i64::try_from(config.ttl_seconds).map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!("JWT ttl_seconds is out of range"))
        })?;

        let default_ttl = Duration::try_seconds(ttl_seconds).ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!("JWT ttl_seconds is out of range"))
        })?;

        Ok(Self::new(config.secret.as_bytes(), default_ttl))
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn keys(&self) -> AppResult<&SigningKeys> {
        self.keys.as_ref().ok_or_else(|| {
            error!("Token operation attempted without a signing secret");
            AppError::missing_signing_secret()
        })
    }

    pub fn issue(&self, subject: &str, ttl: Duration) -> AppResult<String> {
        self.issue_token(subject, ttl, Utc::now()).map(|issued| issued.token)
    }

    pub fn issue_default(&self, subject: &str) -> AppResult<IssuedToken> {
        self.issue_token(subject, self.default_ttl, Utc::now())
    }

    /// Issue a token whose lifetime starts at `now`
    pub fn issue_token(
        &self,
        subject: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> AppResult<IssuedToken> {
        let keys = self.keys()?;

        if subject.trim().is_empty() {
            return input_error!("subject", "must not be empty");
        }
        // exp has whole-second resolution
        if ttl.num_seconds() <= 0 {
            return input_error!("ttl", "must be at least one second");
        }

        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AppError::invalid_input("ttl", "is too large"))?;

        let claims = Claims::new(subject, now, expires_at);
        let token = encode(&Header::new(TOKEN_ALGORITHM), &claims, &keys.encoding).map_err(|e| {
            error!("Failed to generate token: {}", e);
            AppError::CryptoError(format!("Failed to generate token: {}", e))
        })?;

        log_security_event(SecurityEvent::TokenIssued, Some(subject), true, None);

        Ok(IssuedToken {
            token,
            subject: claims.sub,
            issued_at: now,
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or(expires_at),
        })
    }

    pub fn validate(&self, token: &str) -> AppResult<TokenValidation> {
        self.validate_at(token, Utc::now())
    }

    /// Validate against the instant `now`. Errors only when no signing secret is configured.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> AppResult<TokenValidation> {
        let keys = self.keys()?;

        let validation = match decode::<Claims>(token, &keys.decoding, &self.validation) {
            Ok(data) if data.claims.sub.trim().is_empty() => {
                TokenValidation::rejected(TokenStatus::Malformed)
            }
            Ok(data) if data.claims.is_expired_at(now) => TokenValidation::expired(data.claims.sub),
            Ok(data) => TokenValidation::accepted(data.claims.sub),
            Err(e) => {
                debug!("Token rejected: {}", e);
                TokenValidation::rejected(classify(e.kind()))
            }
        };

        log_security_event(
            SecurityEvent::TokenValidated,
            validation.subject.as_deref(),
            validation.is_valid(),
            Some(validation.status.to_string().as_str()),
        );

        Ok(validation)
    }

    /// Token check used by request guards: any failure means not authenticated
    pub fn is_authenticated(&self, token: &str) -> bool {
        matches!(self.validate(token), Ok(validation) if validation.is_valid())
    }

    /// Validate the value of an `Authorization` header
    pub fn validate_bearer(&self, header_value: &str) -> AppResult<TokenValidation> {
        match extract_bearer(header_value) {
            Some(token) => self.validate(token),
            None => {
                self.keys()?;
                Ok(TokenValidation::rejected(TokenStatus::Malformed))
            }
        }
    }
}

fn classify(kind: &ErrorKind) -> TokenStatus {
    match kind {
        ErrorKind::InvalidSignature => TokenStatus::InvalidSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            TokenStatus::UnsupportedAlgorithm
        }
        _ => TokenStatus::Malformed,
    }
}

/// Token part of a `Bearer <token>` header value; the scheme is case-insensitive
pub fn extract_bearer(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}
