//! HMAC signing algorithms and the shared secret key

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ring::rand::SecureRandom;
use serde::{Deserialize, Serialize};

use crate::error;

/// HMAC signing algorithms usable with a [`SecretKey`]
///
/// Only symmetric algorithms are supported; asymmetric signing is out of
/// scope for this credential format.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[allow(clippy::upper_case_acronyms)]
#[non_exhaustive]
pub enum Algorithm {
    /// HMAC using SHA-256
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
}

impl Algorithm {
    /// Recommended secret size in bytes for this algorithm
    #[must_use]
    fn recommended_key_size(self) -> usize {
        self.signature_size()
    }

    /// The size in bytes of a signature produced by this algorithm
    #[must_use]
    pub fn signature_size(self) -> usize {
        match self {
            Self::HS256 => 256 / 8,
            Self::HS384 => 384 / 8,
            Self::HS512 => 512 / 8,
        }
    }

    fn into_ring_algorithm(self) -> ring::hmac::Algorithm {
        match self {
            Self::HS256 => ring::hmac::HMAC_SHA256,
            Self::HS384 => ring::hmac::HMAC_SHA384,
            Self::HS512 => ring::hmac::HMAC_SHA512,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        };

        f.write_str(s)
    }
}

/// The shared secret used to sign and verify credentials
///
/// Derived once from configuration at startup and shared read-only for
/// the process lifetime. The secret is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
#[must_use]
pub struct SecretKey {
    secret: Vec<u8>,
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("SecretKey { secret }")
    }
}

impl SecretKey {
    /// A secret key over the given raw bytes
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Decodes a secret from its configured base64 form (standard
    /// alphabet, padded)
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid base64.
    pub fn from_base64(encoded: &str) -> Result<Self, error::InvalidSecret> {
        let secret = STANDARD.decode(encoded).map_err(error::invalid_secret)?;
        Ok(Self { secret })
    }

    /// Generates a new random secret of the recommended size for `alg`
    ///
    /// # Errors
    ///
    /// Unable to obtain randomness from the system.
    pub fn generate(alg: Algorithm) -> Result<Self, error::Unexpected> {
        Self::generate_with_rng(alg, &ring::rand::SystemRandom::new())
    }

    /// Generates a new random secret using the provided source of randomness
    ///
    /// # Errors
    ///
    /// Unable to generate a secret from the provided RNG.
    pub fn generate_with_rng(
        alg: Algorithm,
        rng: &dyn SecureRandom,
    ) -> Result<Self, error::Unexpected> {
        let mut secret = vec![0; alg.recommended_key_size()];

        rng.fill(&mut secret)
            .map_err(|_| error::unexpected("random number generator failure"))?;

        Ok(Self { secret })
    }

    /// Signs `data` with this secret under the given algorithm
    #[must_use]
    pub fn sign(&self, alg: Algorithm, data: &[u8]) -> Vec<u8> {
        let key = ring::hmac::Key::new(alg.into_ring_algorithm(), &self.secret);
        let tag = ring::hmac::sign(&key, data);
        tag.as_ref().to_owned()
    }

    /// Verifies `signature` over `data` in constant time
    ///
    /// # Errors
    ///
    /// Returns an error if the signature does not match.
    pub fn verify(
        &self,
        alg: Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), error::SignatureMismatch> {
        let key = ring::hmac::Key::new(alg.into_ring_algorithm(), &self.secret);
        ring::hmac::verify(&key, data, signature).map_err(|_| error::signature_mismatch())
    }
}
