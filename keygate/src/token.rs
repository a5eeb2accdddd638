//! The compact signed credential and its validation plan
//!
//! A [`SignedToken`] is built from a JSON header and a JSON claims payload,
//! each serialized and base64url-encoded (no padding), joined by `.`, and
//! signed with a [`SecretKey`]. Verification reverses the process:
//! decompose, check the signature over the first two segments, decode the
//! payload, and subject the claims to a [`TokenValidator`].
//!
//! The header and payload of an unverified token are attacker-controlled
//! data. The only way to obtain a [`Validated`] value is through
//! verification, so holding one is proof that the checks have run.

use std::{fmt, time::Duration};

use aliri_braid::braid;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, System, UnixTime};
use crate::error;
use crate::hmac::{Algorithm, SecretKey};

/// The issuer of a signed token
#[braid(serde, ref_doc = "A borrowed reference to an [`Issuer`]")]
pub struct Issuer;

/// The subject of a signed token
#[braid(serde, ref_doc = "A borrowed reference to a [`Subject`]")]
pub struct Subject;

/// A compact signed credential
///
/// This type provides custom implementations of [`Display`][SignedTokenRef#impl-Display]
/// and [`Debug`][SignedTokenRef#impl-Debug] so that credentials do not leak
/// into logs wholesale.
#[braid(
    serde,
    debug = "owned",
    display = "owned",
    ord = "omit",
    ref_doc = "\
    A borrowed reference to a compact signed credential ([`SignedToken`])\n\
    \n\
    This type provides custom implementations of [`Display`][Self#impl-Display] and \
    [`Debug`][Self#impl-Debug] so that credentials do not leak into logs wholesale.
    "
)]
#[must_use]
pub struct SignedToken;

/// Prints a redaction placeholder unless the alternate flag (`{:#?}`) is
/// given; the alternate form reveals the header and payload segments but
/// always elides the signature.
impl fmt::Debug for SignedTokenRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            match self.0.rfind('.') {
                Some(idx) => write!(f, "\"{}…\"", &self.0[..=idx]),
                None => f.write_str("\"…\""),
            }
        } else {
            f.write_str(concat!("***", "TOKEN", "***"))
        }
    }
}

/// Prints a redaction placeholder unless the alternate flag (`{:#}`) is
/// given; the alternate form reveals the full credential.
impl fmt::Display for SignedTokenRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            f.write_str(&self.0)
        } else {
            f.write_str(concat!("***", "TOKEN", "***"))
        }
    }
}

/// The header segment of a signed token
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct TokenHeader {
    alg: Algorithm,
}

impl TokenHeader {
    /// A header naming the algorithm the token is signed with
    pub const fn new(alg: Algorithm) -> Self {
        Self { alg }
    }

    /// The signing algorithm named by this header
    pub const fn alg(&self) -> Algorithm {
        self.alg
    }
}

/// Claims common to all signed tokens issued by this system
///
/// Callers with richer payloads embed this with `#[serde(flatten)]` and
/// delegate their [`CoreClaims`] implementation to it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct BasicClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<Issuer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<Subject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<UnixTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<UnixTime>,
}

impl BasicClaims {
    /// Constructs a new, empty claims payload
    pub const fn new() -> Self {
        Self {
            iss: None,
            sub: None,
            iat: None,
            exp: None,
        }
    }

    /// Sets the `iss` claim
    pub fn with_issuer(mut self, iss: impl Into<Issuer>) -> Self {
        self.iss = Some(iss.into());
        self
    }

    /// Sets the `sub` claim
    pub fn with_subject(mut self, sub: impl Into<Subject>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    /// Sets the `iat` claim
    pub fn with_issued_at(mut self, time: UnixTime) -> Self {
        self.iat = Some(time);
        self
    }

    /// Sets the `exp` claim
    pub fn with_expiration(mut self, time: UnixTime) -> Self {
        self.exp = Some(time);
        self
    }
}

/// Claims a verifier consults when deciding whether to accept a token
pub trait CoreClaims {
    /// Issuer
    ///
    /// A verifier MUST reject this token if a required issuer is
    /// configured and this claim does not match it.
    fn iss(&self) -> Option<&IssuerRef>;

    /// Subject
    fn sub(&self) -> Option<&SubjectRef>;

    /// Issued at
    fn iat(&self) -> Option<UnixTime>;

    /// Expires
    ///
    /// A verifier MUST reject this token at or after the given time.
    fn exp(&self) -> Option<UnixTime>;
}

impl CoreClaims for BasicClaims {
    fn iss(&self) -> Option<&IssuerRef> {
        self.iss.as_deref()
    }

    fn sub(&self) -> Option<&SubjectRef> {
        self.sub.as_deref()
    }

    fn iat(&self) -> Option<UnixTime> {
        self.iat
    }

    fn exp(&self) -> Option<UnixTime> {
        self.exp
    }
}

/// The verified header and claims of a signed token
///
/// This type can _only_ be produced by this module, asserting that the
/// signature has been checked and the claims have passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validated<C = BasicClaims> {
    header: TokenHeader,
    claims: C,
}

impl<C> Validated<C> {
    /// The validated token header
    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    /// The validated token claims
    pub fn claims(&self) -> &C {
        &self.claims
    }

    /// Extracts the claims from the token
    pub fn into_claims(self) -> C {
        self.claims
    }
}

/// A signed token split into its parts, ready for verification
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct Decomposed<'a> {
    header: TokenHeader,
    message: &'a str,
    payload: &'a str,
    signature: Vec<u8>,
}

/// Splits off the final `.`-delimited segment, returning
/// `(segment, remainder)`
fn split_last_segment(s: &str) -> Option<(&str, &str)> {
    let idx = s.rfind('.')?;
    Some((&s[idx + 1..], &s[..idx]))
}

impl<'a> Decomposed<'a> {
    /// The algorithm named by the (unverified) token header
    pub fn alg(&self) -> Algorithm {
        self.header.alg()
    }

    /// The undecoded payload segment
    ///
    /// **WARNING:** *This payload has not been verified and should not be
    /// trusted.* An adversary can place arbitrary data in the payload of
    /// a token.
    pub fn untrusted_payload(&self) -> &'a str {
        self.payload
    }

    /// Verifies the decomposed token against the key and validation plan,
    /// using the system clock for expiry
    ///
    /// # Errors
    ///
    /// Returns an error if the signature does not match, the payload is
    /// not decodable, or the claims are rejected by the validator.
    pub fn verify<C>(
        self,
        key: &SecretKey,
        validator: &TokenValidator,
    ) -> Result<Validated<C>, error::TokenVerifyError>
    where
        C: for<'de> Deserialize<'de> + CoreClaims,
    {
        self.verify_with_clock(key, validator, &System)
    }

    /// Verifies the decomposed token, reading the current time from the
    /// provided clock
    ///
    /// # Errors
    ///
    /// Returns an error if the signature does not match, the payload is
    /// not decodable, or the claims are rejected by the validator.
    pub fn verify_with_clock<C, K>(
        self,
        key: &SecretKey,
        validator: &TokenValidator,
        clock: &K,
    ) -> Result<Validated<C>, error::TokenVerifyError>
    where
        C: for<'de> Deserialize<'de> + CoreClaims,
        K: Clock,
    {
        key.verify(self.header.alg(), self.message.as_bytes(), &self.signature)?;

        let p_raw = URL_SAFE_NO_PAD
            .decode(self.payload)
            .map_err(error::malformed_token_payload)?;

        let claims: C =
            serde_json::from_slice(&p_raw).map_err(error::malformed_token_payload)?;

        validator.validate_with_clock(&self.header, &claims, clock)?;

        Ok(Validated {
            header: self.header,
            claims,
        })
    }
}

impl SignedTokenRef {
    /// Splits the token into its parts, preparing it for verification
    ///
    /// # Errors
    ///
    /// Returns an error if the token does not have the three-segment
    /// compact shape or its header or signature segments are not decodable.
    pub fn decompose(&self) -> Result<Decomposed<'_>, error::TokenVerifyError> {
        let (s_str, message) =
            split_last_segment(self.as_str()).ok_or_else(error::malformed_token)?;
        let (payload, h_str) =
            split_last_segment(message).ok_or_else(error::malformed_token)?;

        let h_raw = URL_SAFE_NO_PAD
            .decode(h_str)
            .map_err(error::malformed_token_header)?;
        let header: TokenHeader =
            serde_json::from_slice(&h_raw).map_err(error::malformed_token_header)?;
        let signature = URL_SAFE_NO_PAD
            .decode(s_str)
            .map_err(error::malformed_token_signature)?;

        Ok(Decomposed {
            header,
            message,
            payload,
            signature,
        })
    }

    /// Verifies the token against the key and validation plan, using the
    /// system clock for expiry
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed or invalid according to
    /// the validator.
    pub fn verify<C>(
        &self,
        key: &SecretKey,
        validator: &TokenValidator,
    ) -> Result<Validated<C>, error::TokenVerifyError>
    where
        C: for<'de> Deserialize<'de> + CoreClaims,
    {
        self.decompose()?.verify(key, validator)
    }

    /// Verifies the token, reading the current time from the provided clock
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed or invalid according to
    /// the validator.
    pub fn verify_with_clock<C, K>(
        &self,
        key: &SecretKey,
        validator: &TokenValidator,
        clock: &K,
    ) -> Result<Validated<C>, error::TokenVerifyError>
    where
        C: for<'de> Deserialize<'de> + CoreClaims,
        K: Clock,
    {
        self.decompose()?.verify_with_clock(key, validator, clock)
    }
}

impl SignedToken {
    /// Constructs a new signed token from a header and claims payload,
    /// signed with the given key
    ///
    /// Header and claims are serialized as JSON. The output is
    /// deterministic for identical header, claims, and key.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization of the header or claims fails.
    pub fn try_from_parts<C: Serialize>(
        header: &TokenHeader,
        claims: &C,
        key: &SecretKey,
    ) -> Result<Self, error::TokenSignError> {
        use std::fmt::Write;

        let h_raw = URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(header).map_err(error::malformed_token_header)?);
        let p_raw = URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(claims).map_err(error::malformed_token_payload)?);

        let sig_len = (header.alg().signature_size() * 4 + 2) / 3;
        let mut message = String::with_capacity(h_raw.len() + p_raw.len() + sig_len + 2);
        write!(message, "{}.{}", h_raw, p_raw).expect("writes to strings never fail");

        let signature = URL_SAFE_NO_PAD.encode(key.sign(header.alg(), message.as_bytes()));
        write!(message, ".{}", signature).expect("writes to strings never fail");

        Ok(Self::new(message))
    }
}

/// The validation plan applied to decoded claims
///
/// The default plan approves every algorithm the crate supports, requires
/// an unexpired `exp` claim with no grace period, and does not constrain
/// the issuer.
#[derive(Clone, Debug)]
#[must_use]
pub struct TokenValidator {
    approved_algorithms: Vec<Algorithm>,
    leeway: Duration,
    validate_exp: bool,
    issuer: Option<Issuer>,
}

impl Default for TokenValidator {
    #[inline]
    fn default() -> Self {
        Self {
            approved_algorithms: Vec::new(),
            leeway: Duration::default(),
            validate_exp: true,
            issuer: None,
        }
    }
}

impl TokenValidator {
    /// Allows a grace period when evaluating the `exp` claim
    #[inline]
    pub fn with_leeway(self, leeway: Duration) -> Self {
        Self { leeway, ..self }
    }

    /// Enforces expiration checks (the default)
    #[inline]
    pub fn check_expiration(self) -> Self {
        Self {
            validate_exp: true,
            ..self
        }
    }

    /// Skips expiration checks
    #[inline]
    pub fn ignore_expiration(self) -> Self {
        Self {
            validate_exp: false,
            ..self
        }
    }

    /// Approves a single algorithm
    ///
    /// Once any algorithm has been approved, tokens naming an algorithm
    /// outside the approved set are rejected.
    #[inline]
    pub fn add_approved_algorithm(self, alg: Algorithm) -> Self {
        let mut this = self;
        this.approved_algorithms.push(alg);
        this
    }

    /// Requires that tokens specify a particular issuer
    #[inline]
    pub fn require_issuer(self, issuer: Issuer) -> Self {
        Self {
            issuer: Some(issuer),
            ..self
        }
    }

    /// Validates a header and claims payload against this plan, reading
    /// the current time from the provided clock
    ///
    /// A token whose `exp` claim is at or before the current time (less
    /// any leeway) is expired.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first check that rejected the
    /// claims.
    pub fn validate_with_clock<C, K>(
        &self,
        header: &TokenHeader,
        claims: &C,
        clock: &K,
    ) -> Result<(), error::ClaimsRejected>
    where
        C: CoreClaims,
        K: Clock,
    {
        let now = clock.now();

        if !self.approved_algorithms.is_empty()
            && !self.approved_algorithms.contains(&header.alg())
        {
            return Err(error::ClaimsRejected::InvalidAlgorithm);
        }

        if self.validate_exp {
            if let Some(exp) = claims.exp() {
                if exp.0 <= now.0.saturating_sub(self.leeway.as_secs()) {
                    return Err(error::ClaimsRejected::TokenExpired);
                }
            } else {
                return Err(error::ClaimsRejected::MissingRequiredClaim("exp"));
            }
        }

        if let Some(required) = &self.issuer {
            if let Some(iss) = claims.iss() {
                if iss != required {
                    return Err(error::ClaimsRejected::InvalidIssuer);
                }
            } else {
                return Err(error::ClaimsRejected::MissingRequiredClaim("iss"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;
    use crate::clock::TestClock;
    use crate::error::{ClaimsRejected, TokenVerifyError};

    fn sample_claims() -> BasicClaims {
        BasicClaims::new()
            .with_issuer(Issuer::from_static("authority"))
            .with_subject(Subject::from_static("svc-1"))
            .with_issued_at(UnixTime(40))
            .with_expiration(UnixTime(100))
    }

    fn sample_validator(alg: Algorithm) -> TokenValidator {
        TokenValidator::default()
            .add_approved_algorithm(alg)
            .require_issuer(Issuer::from_static("authority"))
    }

    fn round_trip(alg: Algorithm) -> Result<()> {
        let key = SecretKey::generate(alg)?;
        let claims = sample_claims();

        let token = SignedToken::try_from_parts(&TokenHeader::new(alg), &claims, &key)?;

        let clock = TestClock::new(UnixTime(50));
        let verified: Validated =
            token.verify_with_clock(&key, &sample_validator(alg), &clock)?;

        assert_eq!(verified.claims(), &claims);
        assert_eq!(verified.header(), &TokenHeader::new(alg));
        Ok(())
    }

    #[test]
    fn round_trip_hs256() -> Result<()> {
        round_trip(Algorithm::HS256)
    }

    #[test]
    fn round_trip_hs384() -> Result<()> {
        round_trip(Algorithm::HS384)
    }

    #[test]
    fn round_trip_hs512() -> Result<()> {
        round_trip(Algorithm::HS512)
    }

    #[test]
    fn expired_at_the_boundary() -> Result<()> {
        let key = SecretKey::generate(Algorithm::HS256)?;
        let token = SignedToken::try_from_parts(
            &TokenHeader::new(Algorithm::HS256),
            &sample_claims(),
            &key,
        )?;

        let clock = TestClock::new(UnixTime(100));
        let err = token
            .verify_with_clock::<BasicClaims, _>(&key, &sample_validator(Algorithm::HS256), &clock)
            .unwrap_err();
        assert!(err.is_expired());
        Ok(())
    }

    #[test]
    fn valid_just_before_expiry() -> Result<()> {
        let key = SecretKey::generate(Algorithm::HS256)?;
        let token = SignedToken::try_from_parts(
            &TokenHeader::new(Algorithm::HS256),
            &sample_claims(),
            &key,
        )?;

        let clock = TestClock::new(UnixTime(99));
        let verified = token.verify_with_clock::<BasicClaims, _>(
            &key,
            &sample_validator(Algorithm::HS256),
            &clock,
        );
        assert!(verified.is_ok());
        Ok(())
    }

    #[test]
    fn leeway_extends_past_expiry() -> Result<()> {
        let key = SecretKey::generate(Algorithm::HS256)?;
        let token = SignedToken::try_from_parts(
            &TokenHeader::new(Algorithm::HS256),
            &sample_claims(),
            &key,
        )?;

        let validator =
            sample_validator(Algorithm::HS256).with_leeway(Duration::from_secs(5));

        let mut clock = TestClock::new(UnixTime(104));
        assert!(token
            .verify_with_clock::<BasicClaims, _>(&key, &validator, &clock)
            .is_ok());

        clock.advance(1);
        let err = token
            .verify_with_clock::<BasicClaims, _>(&key, &validator, &clock)
            .unwrap_err();
        assert!(err.is_expired());
        Ok(())
    }

    #[test]
    fn missing_exp_is_rejected() -> Result<()> {
        let key = SecretKey::generate(Algorithm::HS256)?;
        let claims = BasicClaims::new().with_issuer(Issuer::from_static("authority"));
        let token =
            SignedToken::try_from_parts(&TokenHeader::new(Algorithm::HS256), &claims, &key)?;

        let err = token
            .verify::<BasicClaims>(&key, &sample_validator(Algorithm::HS256))
            .unwrap_err();
        assert!(matches!(
            err,
            TokenVerifyError::ClaimsRejected(ClaimsRejected::MissingRequiredClaim("exp"))
        ));
        Ok(())
    }

    #[test]
    fn wrong_issuer_is_rejected() -> Result<()> {
        let key = SecretKey::generate(Algorithm::HS256)?;
        let claims = sample_claims().with_issuer(Issuer::from_static("somebody else"));
        let token =
            SignedToken::try_from_parts(&TokenHeader::new(Algorithm::HS256), &claims, &key)?;

        let clock = TestClock::new(UnixTime(50));
        let err = token
            .verify_with_clock::<BasicClaims, _>(&key, &sample_validator(Algorithm::HS256), &clock)
            .unwrap_err();
        assert!(matches!(
            err,
            TokenVerifyError::ClaimsRejected(ClaimsRejected::InvalidIssuer)
        ));
        Ok(())
    }

    #[test]
    fn unapproved_algorithm_is_rejected() -> Result<()> {
        let key = SecretKey::generate(Algorithm::HS384)?;
        let token = SignedToken::try_from_parts(
            &TokenHeader::new(Algorithm::HS384),
            &sample_claims(),
            &key,
        )?;

        let clock = TestClock::new(UnixTime(50));
        let err = token
            .verify_with_clock::<BasicClaims, _>(&key, &sample_validator(Algorithm::HS256), &clock)
            .unwrap_err();
        assert!(matches!(
            err,
            TokenVerifyError::ClaimsRejected(ClaimsRejected::InvalidAlgorithm)
        ));
        Ok(())
    }

    #[test]
    fn tampered_signature_is_rejected() -> Result<()> {
        let key = SecretKey::generate(Algorithm::HS256)?;
        let token = SignedToken::try_from_parts(
            &TokenHeader::new(Algorithm::HS256),
            &sample_claims(),
            &key,
        )?;

        let mut tampered = token.as_str().to_owned();
        let last = tampered.pop().expect("token is not empty");
        tampered.push(if last == 'A' { 'B' } else { 'A' });
        let tampered = SignedToken::new(tampered);

        let clock = TestClock::new(UnixTime(50));
        let err = tampered
            .verify_with_clock::<BasicClaims, _>(&key, &sample_validator(Algorithm::HS256), &clock)
            .unwrap_err();
        assert!(err.is_signature_mismatch());
        Ok(())
    }

    #[test]
    fn tampered_payload_is_rejected() -> Result<()> {
        let key = SecretKey::generate(Algorithm::HS256)?;
        let token = SignedToken::try_from_parts(
            &TokenHeader::new(Algorithm::HS256),
            &sample_claims(),
            &key,
        )?;

        let original = token.as_str().to_owned();
        let first_dot = original.find('.').expect("compact tokens contain dots");
        let mut tampered = original.clone();
        let target = first_dot + 1;
        let replacement = if &original[target..=target] == "A" { "B" } else { "A" };
        tampered.replace_range(target..=target, replacement);
        let tampered = SignedToken::new(tampered);

        let clock = TestClock::new(UnixTime(50));
        let err = tampered
            .verify_with_clock::<BasicClaims, _>(&key, &sample_validator(Algorithm::HS256), &clock)
            .unwrap_err();
        assert!(err.is_signature_mismatch());
        Ok(())
    }

    #[test]
    fn token_without_three_segments_is_malformed() {
        let key = SecretKey::new(b"secret".to_vec());
        let validator = TokenValidator::default();

        for raw in ["garbage", "one.two", ""] {
            let err = SignedTokenRef::from_str(raw)
                .verify::<BasicClaims>(&key, &validator)
                .unwrap_err();
            assert!(
                matches!(err, TokenVerifyError::MalformedToken(_)),
                "{raw:?} should be malformed"
            );
        }
    }

    #[test]
    fn non_base64_segments_are_malformed() {
        let key = SecretKey::new(b"secret".to_vec());
        let validator = TokenValidator::default();

        let err = SignedTokenRef::from_str("!!.@@.##")
            .verify::<BasicClaims>(&key, &validator)
            .unwrap_err();
        assert!(matches!(err, TokenVerifyError::MalformedTokenHeader(_)));
    }

    #[test]
    fn unknown_header_algorithm_is_malformed() {
        let key = SecretKey::new(b"secret".to_vec());
        let validator = TokenValidator::default();

        // {"alg":"RS256"}
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
        let raw = format!("{header}.e30.AAAA");
        let err = SignedTokenRef::from_str(&raw)
            .verify::<BasicClaims>(&key, &validator)
            .unwrap_err();
        assert!(matches!(err, TokenVerifyError::MalformedTokenHeader(_)));
    }

    #[test]
    fn debug_and_display_redact_by_default() -> Result<()> {
        let key = SecretKey::generate(Algorithm::HS256)?;
        let token = SignedToken::try_from_parts(
            &TokenHeader::new(Algorithm::HS256),
            &sample_claims(),
            &key,
        )?;

        assert_eq!(format!("{}", token), "***TOKEN***");
        assert_eq!(format!("{:?}", token), "***TOKEN***");
        assert!(format!("{:#?}", token).ends_with(".…\""));
        assert_eq!(format!("{:#}", token), token.as_str());
        Ok(())
    }

    #[test]
    fn basic_claims_deserialize() -> Result<()> {
        const DATA: &str = r#"{
                "iss": "authority",
                "exp": 345
            }"#;

        let claims: BasicClaims = serde_json::from_str(DATA)?;
        assert_eq!(claims.iss(), Some(IssuerRef::from_str("authority")));
        assert_eq!(claims.exp(), Some(UnixTime(345)));
        Ok(())
    }
}
