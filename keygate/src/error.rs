//! Failures of token signing and verification

use std::error::Error as StdError;

use thiserror::Error;

/// The token cannot be split into header, payload, and signature sections
#[derive(Clone, Copy, Debug, Error)]
#[error("malformed token")]
pub struct MalformedToken {
    _p: (),
}

pub(crate) const fn malformed_token() -> MalformedToken {
    MalformedToken { _p: () }
}

/// The token header section is not decodable
#[derive(Debug, Error)]
#[error("malformed token header")]
pub struct MalformedTokenHeader {
    #[from]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

pub(crate) fn malformed_token_header(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> MalformedTokenHeader {
    MalformedTokenHeader {
        source: source.into(),
    }
}

/// The token payload section is not decodable
#[derive(Debug, Error)]
#[error("malformed token payload")]
pub struct MalformedTokenPayload {
    #[from]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

pub(crate) fn malformed_token_payload(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> MalformedTokenPayload {
    MalformedTokenPayload {
        source: source.into(),
    }
}

/// The token signature section is not decodable
#[derive(Debug, Error)]
#[error("malformed token signature")]
pub struct MalformedTokenSignature {
    #[from]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

pub(crate) fn malformed_token_signature(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> MalformedTokenSignature {
    MalformedTokenSignature {
        source: source.into(),
    }
}

/// The signature does not match the signed message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
#[error("signature mismatch")]
pub struct SignatureMismatch {
    _p: (),
}

pub(crate) const fn signature_mismatch() -> SignatureMismatch {
    SignatureMismatch { _p: () }
}

/// The configured secret is not valid base64
#[derive(Debug, Error)]
#[error("invalid secret key encoding")]
pub struct InvalidSecret {
    #[from]
    source: base64::DecodeError,
}

pub(crate) fn invalid_secret(source: base64::DecodeError) -> InvalidSecret {
    InvalidSecret { source }
}

/// Unexpected error (possibly a bug)
#[derive(Debug, Error)]
#[error("unexpected error")]
pub struct Unexpected {
    #[from]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

pub(crate) fn unexpected(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> Unexpected {
    Unexpected {
        source: source.into(),
    }
}

/// The decoded claims were rejected by the validation plan
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClaimsRejected {
    /// The token algorithm is not approved
    #[error("invalid algorithm")]
    InvalidAlgorithm,

    /// The token issuer is not the required issuer
    #[error("invalid issuer")]
    InvalidIssuer,

    /// The expiration claim is at or before the current time
    #[error("token expired")]
    TokenExpired,

    /// A required claim is missing
    #[error("required {_0} claim missing")]
    MissingRequiredClaim(&'static str),
}

/// An error occurring while verifying a signed token
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TokenVerifyError {
    /// The token is malformed, without a discernible header, payload, and signature
    #[error(transparent)]
    MalformedToken(#[from] MalformedToken),

    /// The token header is malformed
    #[error(transparent)]
    MalformedTokenHeader(#[from] MalformedTokenHeader),

    /// The token payload is malformed
    #[error(transparent)]
    MalformedTokenPayload(#[from] MalformedTokenPayload),

    /// The token signature is malformed
    #[error(transparent)]
    MalformedTokenSignature(#[from] MalformedTokenSignature),

    /// The token signature does not match
    #[error(transparent)]
    SignatureMismatch(#[from] SignatureMismatch),

    /// The token claims were rejected
    #[error("token rejected by claims validator")]
    ClaimsRejected(#[from] ClaimsRejected),
}

impl TokenVerifyError {
    /// Whether verification failed because the token was expired
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::ClaimsRejected(ClaimsRejected::TokenExpired))
    }

    /// Whether verification failed because the signature did not match
    #[must_use]
    pub fn is_signature_mismatch(&self) -> bool {
        matches!(self, Self::SignatureMismatch(_))
    }
}

/// An error occurring while producing a signed token
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TokenSignError {
    /// The token header could not be serialized
    #[error(transparent)]
    MalformedTokenHeader(#[from] MalformedTokenHeader),

    /// The token payload could not be serialized
    #[error(transparent)]
    MalformedTokenPayload(#[from] MalformedTokenPayload),
}
