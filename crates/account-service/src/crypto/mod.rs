//! Credential hashing.
//!
//! New digests are Argon2id PHC strings
//! (`$argon2id$v=19$m=<kib>,t=<iterations>,p=<lanes>$<salt>$<hash>`), so every
//! digest carries the salt and cost parameters needed to verify it. Digests in
//! bcrypt modular-crypt format (`$2a$`, `$2b$`, `$2y$`) written by earlier
//! deployments still verify.

use crate::config::HashingParams;
use crate::config::{MAX_ARGON2_ITERATIONS, MAX_ARGON2_MEMORY_KIB, MAX_ARGON2_PARALLELISM};
use crate::config::{MIN_ARGON2_ITERATIONS, MIN_ARGON2_MEMORY_KIB, MIN_ARGON2_PARALLELISM};
use crate::errors::AccountError;
use crate::observability::metrics::record_hash_duration;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use std::time::Instant;
use tracing::instrument;

/// Salt length in bytes (128 bits).
const SALT_LEN: usize = 16;

/// Input for the digest used to equalize unknown-user latency.
const DUMMY_SECRET: &str = "account-service-timing-equalization";

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

/// Argon2id credential hasher.
///
/// Holds the configured cost parameters and a digest computed once at
/// construction for [`CredentialHasher::verify_dummy`].
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    params: HashingParams,
    dummy_digest: String,
}

impl fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl CredentialHasher {
    /// Build a hasher for the given Argon2id parameters.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Crypto` if any parameter is outside the
    /// supported range, even if config validation was bypassed.
    pub fn new(params: HashingParams) -> Result<Self, AccountError> {
        validate_params(&params)?;

        let argon_params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            None,
        )
        .map_err(|e| AccountError::Crypto(format!("Invalid argon2 parameters: {}", e)))?;

        let mut hasher = Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params),
            params,
            dummy_digest: String::new(),
        };
        hasher.dummy_digest = hasher.hash(DUMMY_SECRET)?;

        Ok(hasher)
    }

    pub fn params(&self) -> HashingParams {
        self.params
    }

    /// Hash a secret with a fresh random salt.
    ///
    /// Two calls with the same secret return different digests.
    #[instrument(skip_all)]
    pub fn hash(&self, secret: &str) -> Result<String, AccountError> {
        let start = Instant::now();

        let salt_bytes = generate_random_bytes(SALT_LEN)?;
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| AccountError::Crypto(format!("Salt encoding failed: {}", e)))?;

        let digest = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| AccountError::Crypto(format!("Password hashing failed: {}", e)))?
            .to_string();

        record_hash_duration("hash", start.elapsed());
        Ok(digest)
    }

    /// Verify a secret against a stored digest.
    ///
    /// Uses the salt and parameters embedded in the digest, not the hasher's
    /// current configuration. Malformed or unrecognized digests return `false`.
    #[instrument(skip_all)]
    pub fn verify(&self, secret: &str, digest: &str) -> bool {
        let start = Instant::now();

        let is_valid = if is_bcrypt_digest(digest) {
            bcrypt::verify(secret, digest).unwrap_or(false)
        } else {
            match PasswordHash::new(digest) {
                Ok(parsed) => self
                    .argon2
                    .verify_password(secret.as_bytes(), &parsed)
                    .is_ok(),
                Err(_) => false,
            }
        };

        record_hash_duration("verify", start.elapsed());
        is_valid
    }

    /// Run a full verification whose result is discarded.
    ///
    /// Called when no account exists so the caller pays the same hashing cost
    /// as for a wrong password.
    pub fn verify_dummy(&self, secret: &str) {
        let _ = self.verify(secret, &self.dummy_digest);
    }
}

fn is_bcrypt_digest(digest: &str) -> bool {
    BCRYPT_PREFIXES
        .iter()
        .any(|prefix| digest.starts_with(prefix))
}

fn validate_params(params: &HashingParams) -> Result<(), AccountError> {
    if !(MIN_ARGON2_MEMORY_KIB..=MAX_ARGON2_MEMORY_KIB).contains(&params.memory_kib) {
        return Err(AccountError::Crypto(format!(
            "Invalid argon2 memory cost: {} KiB (must be {}-{})",
            params.memory_kib, MIN_ARGON2_MEMORY_KIB, MAX_ARGON2_MEMORY_KIB
        )));
    }
    if !(MIN_ARGON2_ITERATIONS..=MAX_ARGON2_ITERATIONS).contains(&params.iterations) {
        return Err(AccountError::Crypto(format!(
            "Invalid argon2 iterations: {} (must be {}-{})",
            params.iterations, MIN_ARGON2_ITERATIONS, MAX_ARGON2_ITERATIONS
        )));
    }
    if !(MIN_ARGON2_PARALLELISM..=MAX_ARGON2_PARALLELISM).contains(&params.parallelism) {
        return Err(AccountError::Crypto(format!(
            "Invalid argon2 parallelism: {} (must be {}-{})",
            params.parallelism, MIN_ARGON2_PARALLELISM, MAX_ARGON2_PARALLELISM
        )));
    }
    Ok(())
}

/// Generate cryptographically secure random bytes
pub fn generate_random_bytes(len: usize) -> Result<Vec<u8>, AccountError> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|e| AccountError::Crypto(format!("Random bytes generation failed: {}", e)))?;
    Ok(bytes)
}
