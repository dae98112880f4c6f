pub mod jwt;
pub mod logging;
pub mod password;
pub mod service;

// Re-export key items for convenience
pub use app_config::PasswordAlgorithm;
pub use jwt::{Claims, IssuedToken, TokenAuthenticator, TokenStatus, TokenValidation};
pub use password::{
    Argon2Hasher, BcryptHasher, PasswordHasher, StoredHash, hasher_from_config, verify_password,
};
pub use service::{AuthResponse, CredentialService, CredentialServiceTrait, RegisterResponse};
