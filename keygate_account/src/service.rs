//! Issuing and parsing service-account credentials

use std::time::Duration;

use keygate::clock::{Clock, System, UnixTime};
use keygate::error::TokenSignError;
use keygate::token::{BasicClaims, Issuer, IssuerRef, Subject, TokenHeader, TokenValidator};
use keygate::{Algorithm, SecretKey, SignedToken, SignedTokenRef};

use crate::account::{AccountClaims, ServiceAccount};

/// The issuer written into credentials when none is configured
pub const DEFAULT_ISSUER: &str = "service-account-starter";

fn build_validator(issuer: &Issuer, algorithm: Algorithm, leeway: Duration) -> TokenValidator {
    TokenValidator::default()
        .add_approved_algorithm(algorithm)
        .require_issuer(issuer.clone())
        .with_leeway(leeway)
}

/// Issues credentials for service accounts and parses them back
///
/// A stateless wrapper around the credential codec that applies issuer and
/// expiry policy. Shared freely across concurrent requests; nothing here
/// blocks or performs I/O.
///
/// Parsing intentionally collapses every failure — bad signature,
/// malformed token, expired token — into an absent result so that callers
/// cannot distinguish the reasons.
#[derive(Clone, Debug)]
pub struct TokenService<C = System> {
    key: SecretKey,
    issuer: Issuer,
    algorithm: Algorithm,
    leeway: Duration,
    validator: TokenValidator,
    clock: C,
}

impl TokenService {
    /// A token service signing with `key` and stamping `issuer`, using
    /// HS256 and the system clock
    pub fn new(key: SecretKey, issuer: Issuer) -> Self {
        let algorithm = Algorithm::HS256;
        let leeway = Duration::default();
        let validator = build_validator(&issuer, algorithm, leeway);
        Self {
            key,
            issuer,
            algorithm,
            leeway,
            validator,
            clock: System,
        }
    }
}

impl<C> TokenService<C> {
    /// Changes the signing algorithm
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self.validator = build_validator(&self.issuer, algorithm, self.leeway);
        self
    }

    /// Allows a grace period when evaluating expiry
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self.validator = build_validator(&self.issuer, self.algorithm, leeway);
        self
    }

    /// Replaces the time source
    ///
    /// Every `iat`/`exp` stamp and every expiry decision flows through the
    /// clock, so tests can drive time explicitly.
    #[must_use]
    pub fn with_clock<K: Clock>(self, clock: K) -> TokenService<K> {
        TokenService {
            key: self.key,
            issuer: self.issuer,
            algorithm: self.algorithm,
            leeway: self.leeway,
            validator: self.validator,
            clock,
        }
    }

    /// The issuer stamped into credentials
    pub fn issuer(&self) -> &IssuerRef {
        &self.issuer
    }
}

impl<C: Clock> TokenService<C> {
    /// Issues a credential for the given account, valid for `ttl_secs`
    /// seconds from now
    ///
    /// The subject claim is the account's client id. A positive ttl is
    /// expected; a zero ttl produces a credential that is already expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims payload cannot be serialized.
    pub fn issue(
        &self,
        account: &ServiceAccount,
        ttl_secs: u64,
    ) -> Result<SignedToken, TokenSignError> {
        let now = self.clock.now();
        let claims = AccountClaims {
            basic: BasicClaims::new()
                .with_issuer(self.issuer.clone())
                .with_subject(Subject::new(account.client_id().as_str().to_owned()))
                .with_issued_at(now)
                .with_expiration(UnixTime(now.0 + ttl_secs)),
            client_id: account.client_id().to_owned(),
            name: account.name().to_owned(),
            scopes: account.scopes().clone(),
        };

        SignedToken::try_from_parts(&TokenHeader::new(self.algorithm), &claims, &self.key)
    }

    /// Parses a credential into the service account it was issued for
    ///
    /// Returns [`None`] on any verification failure; the reason is logged
    /// at `debug` but never exposed to the caller.
    #[must_use]
    pub fn parse(&self, token: &SignedTokenRef) -> Option<ServiceAccount> {
        match token.verify_with_clock::<AccountClaims, _>(&self.key, &self.validator, &self.clock)
        {
            Ok(validated) => Some(ServiceAccount::from(validated.into_claims())),
            Err(err) => {
                tracing::debug!(error = %err, "credential rejected");
                None
            }
        }
    }

    /// Whether the credential passes signature and claims validation
    ///
    /// Checks the credential at the codec level without exposing the
    /// decoded claims.
    #[must_use]
    pub fn is_valid(&self, token: &SignedTokenRef) -> bool {
        token
            .verify_with_clock::<BasicClaims, _>(&self.key, &self.validator, &self.clock)
            .is_ok()
    }
}
