use app_config::{
    ABSOLUTE_MAX_PASSWORD_COST, Argon2Config, PasswordAlgorithm, PasswordConfig,
};
use app_error::{AppError, AppResult, corrupt_hash, input_error};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        self, PasswordHash, PasswordHasher as Argon2PasswordHasher, PasswordVerifier, SaltString,
        rand_core::OsRng,
    },
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// bcrypt ignores everything past this many bytes of input.
pub const BCRYPT_MAX_SECRET_LEN: usize = 72;

const BCRYPT_PREFIXES: [&str; 4] = ["$2a$", "$2b$", "$2x$", "$2y$"];
const ARGON2ID_PREFIX: &str = "$argon2id$";

/// Encoded, salted one-way hash of a password, as persisted by the caller.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoredHash(String);

impl StoredHash {
    /// Wraps an encoded hash read back from storage. The encoding is only
    /// checked when it is verified against.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scheme named by the hash prefix, if recognised.
    pub fn algorithm(&self) -> Option<PasswordAlgorithm> {
        if BCRYPT_PREFIXES.iter().any(|p| self.0.starts_with(p)) {
            Some(PasswordAlgorithm::Bcrypt)
        } else if self.0.starts_with(ARGON2ID_PREFIX) {
            Some(PasswordAlgorithm::Argon2id)
        } else {
            None
        }
    }

    /// Work factor embedded in the hash: bcrypt's cost, or Argon2's `t`.
    pub fn cost(&self) -> Option<u32> {
        match self.algorithm()? {
            // $2b$<cost>$<salt+digest>
            PasswordAlgorithm::Bcrypt => self.0.split('$').nth(2)?.parse().ok(),
            // $argon2id$v=19$m=..,t=..,p=..$<salt>$<digest>
            PasswordAlgorithm::Argon2id => self
                .0
                .split('$')
                .nth(3)?
                .split(',')
                .find_map(|param| param.strip_prefix("t="))?
                .parse()
                .ok(),
        }
    }
}

impl fmt::Debug for StoredHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredHash")
            .field("algorithm", &self.algorithm())
            .field("cost", &self.cost())
            .finish()
    }
}

impl fmt::Display for StoredHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for StoredHash {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Trait for password hashing operations
pub trait PasswordHasher: Send + Sync + fmt::Debug {
    /// Scheme this hasher produces
    fn algorithm(&self) -> PasswordAlgorithm;

    /// Largest cost this hasher will accept
    fn max_cost(&self) -> u32;

    /// Hash a secret with a fresh random salt
    fn hash(&self, secret: &[u8], cost: u32) -> AppResult<StoredHash>;

    /// Verify a secret against a stored hash of any supported scheme
    fn verify(&self, secret: &[u8], stored: &StoredHash) -> AppResult<bool> {
        verify_password(secret, stored)
    }

    /// Whether `stored` should be replaced by a hash at `cost` from this hasher
    fn needs_rehash(&self, stored: &StoredHash, cost: u32) -> bool {
        stored.algorithm() != Some(self.algorithm()) || stored.cost() != Some(cost)
    }
}

fn check_request(algorithm: PasswordAlgorithm, secret: &[u8], cost: u32, max_cost: u32) -> AppResult<()> {
    if secret.is_empty() {
        return input_error!("secret", "must not be empty");
    }
    if cost < algorithm.min_cost() {
        return Err(AppError::invalid_input(
            "cost",
            &format!("{} requires a cost of at least {}", algorithm, algorithm.min_cost()),
        ));
    }
    if cost > max_cost {
        return Err(AppError::cost_exceeds_policy(cost, max_cost));
    }
    Ok(())
}

/// bcrypt hasher, the scheme used by the original user service
#[derive(Debug, Clone)]
pub struct BcryptHasher {
    max_cost: u32,
}

impl BcryptHasher {
    pub fn new(max_cost: u32) -> Self {
        Self {
            max_cost: max_cost.min(ABSOLUTE_MAX_PASSWORD_COST),
        }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(app_config::DEFAULT_MAX_PASSWORD_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn algorithm(&self) -> PasswordAlgorithm {
        PasswordAlgorithm::Bcrypt
    }

    fn max_cost(&self) -> u32 {
        self.max_cost
    }

    fn hash(&self, secret: &[u8], cost: u32) -> AppResult<StoredHash> {
        check_request(self.algorithm(), secret, cost, self.max_cost)?;
        if secret.len() > BCRYPT_MAX_SECRET_LEN {
            return Err(AppError::invalid_input(
                "secret",
                &format!("bcrypt accepts at most {} bytes", BCRYPT_MAX_SECRET_LEN),
            ));
        }

        debug!(cost, "Hashing password with bcrypt");
        bcrypt::hash(secret, cost)
            .map(StoredHash::new)
            .map_err(|e| {
                error!("Failed to hash password: {}", e);
                AppError::CryptoError(format!("Failed to hash password: {}", e))
            })
    }
}

/// Argon2id hasher; the cost factor is the iteration count
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    max_cost: u32,
    memory_kib: u32,
    parallelism: u32,
}

impl Argon2Hasher {
    pub fn new(max_cost: u32, config: &Argon2Config) -> Self {
        Self {
            max_cost: max_cost.min(ABSOLUTE_MAX_PASSWORD_COST),
            memory_kib: config.memory_kib,
            parallelism: config.parallelism,
        }
    }

    fn argon2(&self, cost: u32) -> AppResult<Argon2<'static>> {
        let params = Params::new(self.memory_kib, cost, self.parallelism, None).map_err(|e| {
            AppError::invalid_input("argon2", &format!("invalid parameters: {}", e))
        })?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl PasswordHasher for Argon2Hasher {
    fn algorithm(&self) -> PasswordAlgorithm {
        PasswordAlgorithm::Argon2id
    }

    fn max_cost(&self) -> u32 {
        self.max_cost
    }

    fn hash(&self, secret: &[u8], cost: u32) -> AppResult<StoredHash> {
        check_request(self.algorithm(), secret, cost, self.max_cost)?;

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = self.argon2(cost)?;

        debug!(cost, memory_kib = self.memory_kib, "Hashing password with argon2id");
        let password_hash = argon2
            .hash_password(secret, &salt)
            .map_err(|e| {
                error!("Failed to hash password: {}", e);
                AppError::CryptoError(format!("Failed to hash password: {}", e))
            })?
            .to_string();

        Ok(StoredHash::new(password_hash))
    }
}

/// Build the hasher named by configuration
pub fn hasher_from_config(config: &PasswordConfig) -> Arc<dyn PasswordHasher> {
    match config.algorithm {
        PasswordAlgorithm::Bcrypt => Arc::new(BcryptHasher::new(config.max_cost)),
        PasswordAlgorithm::Argon2id => Arc::new(Argon2Hasher::new(config.max_cost, &config.argon2)),
    }
}

/// Verify a secret against a stored hash, dispatching on its algorithm prefix.
///
/// A mismatch is `Ok(false)`. Only an undecodable hash is an error.
pub fn verify_password(secret: &[u8], stored: &StoredHash) -> AppResult<bool> {
    let is_valid = match stored.algorithm() {
        Some(PasswordAlgorithm::Bcrypt) => {
            // Longer input would be truncated to a prefix that could match.
            if secret.len() > BCRYPT_MAX_SECRET_LEN {
                false
            } else {
                corrupt_hash!(bcrypt::verify(secret, stored.as_str()), "Invalid bcrypt hash")?
            }
        }
        Some(PasswordAlgorithm::Argon2id) => {
            let parsed = corrupt_hash!(PasswordHash::new(stored.as_str()), "Invalid argon2 hash")?;
            if parsed.salt.is_none() || parsed.hash.is_none() {
                error!("Invalid argon2 hash: missing salt or digest");
                return Err(AppError::corrupt_hash("argon2 hash is missing salt or digest"));
            }
            match Argon2::default().verify_password(secret, &parsed) {
                Ok(()) => true,
                Err(password_hash::Error::Password) => false,
                Err(e) => {
                    error!("Invalid argon2 hash: {}", e);
                    return Err(AppError::corrupt_hash(e));
                }
            }
        }
        None => {
            error!("Stored hash has no recognised algorithm identifier");
            return Err(AppError::corrupt_hash("unrecognised algorithm identifier"));
        }
    };

    debug!("Password verification result: {}", is_valid);
    Ok(is_valid)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    fn argon2_hasher() -> Argon2Hasher {
        Argon2Hasher::new(
            12,
            &Argon2Config {
                memory_kib: 1024,
                parallelism: 1,
            },
        )
    }

    #[test]
    fn test_bcrypt_hash_and_verify() {
        let hasher = BcryptHasher::default();
        let stored = hasher.hash(b"correct horse battery staple", 10).unwrap();

        assert_eq!(stored.algorithm(), Some(PasswordAlgorithm::Bcrypt));
        assert_eq!(stored.cost(), Some(10));
        assert!(hasher.verify(b"correct horse battery staple", &stored).unwrap());
        assert!(!hasher.verify(b"wrong password", &stored).unwrap());
    }

    #[test]
    fn test_hash_is_unique() {
        let hasher = BcryptHasher::default();

        let hash1 = hasher.hash(b"same secret", TEST_COST).unwrap();
        let hash2 = hasher.hash(b"same secret", TEST_COST).unwrap();

        assert_ne!(hash1, hash2);
        assert!(verify_password(b"same secret", &hash1).unwrap());
        assert!(verify_password(b"same secret", &hash2).unwrap());
    }

    #[test]
    fn test_empty_secret_rejected() {
        let err = BcryptHasher::default().hash(b"", TEST_COST).unwrap_err();
        assert!(matches!(err, AppError::InputError(_)));

        let err = argon2_hasher().hash(b"", 1).unwrap_err();
        assert!(matches!(err, AppError::InputError(_)));
    }

    #[test]
    fn test_cost_above_policy_is_resource_exhaustion() {
        let err = BcryptHasher::new(12).hash(b"secret", 13).unwrap_err();
        assert!(matches!(err, AppError::ResourceExhaustionError(_)));

        let err = argon2_hasher().hash(b"secret", 20).unwrap_err();
        assert!(matches!(err, AppError::ResourceExhaustionError(_)));
    }

    #[test]
    fn test_cost_below_minimum_is_input_error() {
        let err = BcryptHasher::default().hash(b"secret", 3).unwrap_err();
        assert!(matches!(err, AppError::InputError(_)));

        let err = argon2_hasher().hash(b"secret", 0).unwrap_err();
        assert!(matches!(err, AppError::InputError(_)));
    }

    #[test]
    fn test_bcrypt_rejects_overlong_secret() {
        let hasher = BcryptHasher::default();
        let long = vec![b'a'; BCRYPT_MAX_SECRET_LEN + 1];
        assert!(matches!(
            hasher.hash(&long, TEST_COST).unwrap_err(),
            AppError::InputError(_)
        ));

        // A 72-byte prefix must not unlock a hash of the prefix
        let prefix = vec![b'a'; BCRYPT_MAX_SECRET_LEN];
        let stored = hasher.hash(&prefix, TEST_COST).unwrap();
        assert!(verify_password(&prefix, &stored).unwrap());
        assert!(!verify_password(&long, &stored).unwrap());
    }

    #[test]
    fn test_argon2_hash_and_verify() {
        let hasher = argon2_hasher();
        let stored = hasher.hash(b"my_secure_password", 2).unwrap();

        assert!(stored.as_str().starts_with("$argon2id$v=19$m=1024,t=2,p=1$"));
        assert_eq!(stored.algorithm(), Some(PasswordAlgorithm::Argon2id));
        assert_eq!(stored.cost(), Some(2));
        assert!(hasher.verify(b"my_secure_password", &stored).unwrap());
        assert!(!hasher.verify(b"wrong_password", &stored).unwrap());
    }

    #[test]
    fn test_verify_across_schemes() {
        let bcrypt_hash = BcryptHasher::default().hash(b"migrate me", TEST_COST).unwrap();
        let argon2_hash = argon2_hasher().hash(b"migrate me", 1).unwrap();

        assert!(argon2_hasher().verify(b"migrate me", &bcrypt_hash).unwrap());
        assert!(BcryptHasher::default().verify(b"migrate me", &argon2_hash).unwrap());
    }

    #[test]
    fn test_corrupt_hash_is_error() {
        for encoded in [
            "",
            "invalid_hash_format",
            "$2b$10$tooshort",
            "$2b$xx$abcdefghijklmnopqrstuvabcdefghijklmnopqrstuvwxyzABCDE",
            "$argon2id$v=19$m=1024,t=2,p=1$!!!$???",
            "$argon2id$garbage",
        ] {
            let result = verify_password(b"password", &StoredHash::new(encoded));
            assert!(
                matches!(result, Err(AppError::CorruptHashError(_))),
                "expected corrupt hash error for {:?}",
                encoded
            );
        }
    }

    #[test]
    fn test_needs_rehash() {
        let bcrypt = BcryptHasher::default();
        let stored = bcrypt.hash(b"secret", TEST_COST).unwrap();

        assert!(!bcrypt.needs_rehash(&stored, TEST_COST));
        assert!(bcrypt.needs_rehash(&stored, TEST_COST + 1));
        assert!(argon2_hasher().needs_rehash(&stored, TEST_COST));
        assert!(bcrypt.needs_rehash(&StoredHash::new("junk"), TEST_COST));
    }

    #[test]
    fn test_debug_hides_digest() {
        let stored = BcryptHasher::default().hash(b"secret", TEST_COST).unwrap();
        let debug = format!("{:?}", stored);

        assert!(debug.contains("Bcrypt"));
        assert!(!debug.contains(stored.as_str()));
    }

    #[test]
    fn test_hasher_from_config() {
        let mut config = PasswordConfig::default();
        assert_eq!(hasher_from_config(&config).algorithm(), PasswordAlgorithm::Bcrypt);

        config.algorithm = PasswordAlgorithm::Argon2id;
        config.max_cost = 6;
        let hasher = hasher_from_config(&config);
        assert_eq!(hasher.algorithm(), PasswordAlgorithm::Argon2id);
        assert_eq!(hasher.max_cost(), 6);
    }
}
