//! Shared fixtures for the system and integration tests.

use app_authentication::{BcryptHasher, CredentialService, TokenAuthenticator};
use app_config::{AppConfig, JwtConfig};
use chrono::Duration;
use std::sync::Arc;

pub const TEST_SECRET: &str = "test_secret_key_for_system_testing_only";

/// Lowest bcrypt cost, so tests stay fast
pub const TEST_COST: u32 = 4;

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.security.jwt = JwtConfig::new(TEST_SECRET, 3600);
    config.security.password.cost = TEST_COST;
    config
}

pub fn test_authenticator() -> Arc<TokenAuthenticator> {
    Arc::new(TokenAuthenticator::new(
        TEST_SECRET.as_bytes(),
        Duration::hours(1),
    ))
}

pub fn test_service() -> Arc<CredentialService> {
    Arc::new(CredentialService::new(
        Arc::new(BcryptHasher::default()),
        test_authenticator(),
        TEST_COST,
    ))
}
