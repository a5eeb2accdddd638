//! Scope requirements attached to protected operations

use std::str::FromStr;

use thiserror::Error;

use crate::scope::{InvalidScopeToken, ScopeSet, ScopeToken};

fn join_tokens(tokens: &[ScopeToken]) -> String {
    tokens
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The caller held insufficient scope for a protected operation
///
/// Carries the missing scope names for operator diagnostics; authorization
/// decisions are made from the evaluation result alone.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("missing required scopes: [{}]", join_tokens(.missing))]
pub struct InsufficientScope {
    missing: Vec<ScopeToken>,
}

impl InsufficientScope {
    /// The required scope tokens the caller did not hold, sorted
    #[must_use]
    pub fn missing(&self) -> &[ScopeToken] {
        &self.missing
    }
}

/// The set of scopes a protected operation requires, with ALL-of semantics
///
/// Every listed scope must be held by the principal. An empty requirement
/// places no restriction and always evaluates successfully. Declaring a
/// single required scope and declaring a list are the same thing: the
/// single-scope case is a one-element set.
///
/// ```
/// use keygate_account::{scopes, ScopeRequirement};
///
/// let requirement = ScopeRequirement::from_static("read:data write:data");
///
/// assert!(requirement.evaluate(&scopes!["read:data", "write:data", "admin"]).is_ok());
///
/// let denied = requirement.evaluate(&scopes!["read:data"]).unwrap_err();
/// assert_eq!(denied.to_string(), "missing required scopes: [write:data]");
///
/// assert!(ScopeRequirement::none().evaluate(&scopes![]).is_ok());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct ScopeRequirement {
    required: ScopeSet,
}

impl ScopeRequirement {
    /// A requirement placing no restriction
    #[inline]
    pub fn none() -> Self {
        Self {
            required: ScopeSet::empty(),
        }
    }

    /// A requirement for a single scope
    #[inline]
    pub fn single(token: ScopeToken) -> Self {
        Self {
            required: ScopeSet::single(token),
        }
    }

    /// A requirement for every scope in the iterator
    #[inline]
    pub fn all<I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = ScopeToken>,
    {
        Self {
            required: tokens.into_iter().collect(),
        }
    }

    /// Parses a requirement from a space-separated list of scope tokens
    ///
    /// Intended for requirement tables built from literals.
    ///
    /// # Panics
    ///
    /// Panics if any token in the list is invalid.
    pub fn from_static(tokens: &'static str) -> Self {
        match tokens.parse::<ScopeSet>() {
            Ok(required) => Self { required },
            Err(err) => panic!("{}: scopes = {}", err, tokens),
        }
    }

    /// Whether this requirement places no restriction
    #[inline]
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.required.is_empty()
    }

    /// The required scope set
    #[must_use]
    pub fn required(&self) -> &ScopeSet {
        &self.required
    }

    /// Evaluates the scopes held by a principal against this requirement
    ///
    /// # Errors
    ///
    /// Returns an error naming the missing scopes if any required scope is
    /// not held.
    pub fn evaluate(&self, held: &ScopeSet) -> Result<(), InsufficientScope> {
        if held.contains_all(&self.required) {
            return Ok(());
        }

        let mut missing: Vec<ScopeToken> = self
            .required
            .iter()
            .filter(|&t| !held.contains(t))
            .map(ToOwned::to_owned)
            .collect();
        missing.sort();

        Err(InsufficientScope { missing })
    }
}

impl From<ScopeToken> for ScopeRequirement {
    #[inline]
    fn from(token: ScopeToken) -> Self {
        Self::single(token)
    }
}

impl From<ScopeSet> for ScopeRequirement {
    #[inline]
    fn from(required: ScopeSet) -> Self {
        Self { required }
    }
}

impl FromStr for ScopeRequirement {
    type Err = InvalidScopeToken;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            required: s.parse()?,
        })
    }
}
