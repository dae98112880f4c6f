//! Configuration is read from an optional JSON file named by
//! `APP_CONFIG_PATH`, then overridden from the environment (and `.env`).
//! Nothing secret is compiled into the binary: the defaults carry an empty
//! signing secret and fail validation until one is supplied.

use serde::{Deserialize, Serialize};
use std::fmt;

mod config_loader;
pub use config_loader::*;

/// A configuration value that must never appear in logs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Blank when empty or ASCII whitespace only; such a secret cannot sign tokens.
    pub fn is_empty(&self) -> bool {
        self.as_bytes().trim_ascii().is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Password hashing scheme named in the stored hash and in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordAlgorithm {
    Bcrypt,
    Argon2id,
}

impl PasswordAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bcrypt => "bcrypt",
            Self::Argon2id => "argon2id",
        }
    }

    /// Smallest work factor the scheme accepts.
    pub fn min_cost(&self) -> u32 {
        match self {
            Self::Bcrypt => 4,
            Self::Argon2id => 1,
        }
    }
}

impl fmt::Display for PasswordAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PasswordAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bcrypt" => Ok(Self::Bcrypt),
            "argon2id" | "argon2" => Ok(Self::Argon2id),
            other => Err(format!("unknown password algorithm '{}'", other)),
        }
    }
}
