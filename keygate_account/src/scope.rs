//! Scope tokens and scope sets
//!
//! A scope token names a single capability granted to a service account,
//! such as `read:data`. Tokens follow the charset rules of
//! [RFC 6749, Section 3.3][RFC6749 3.3]: printable ASCII excluding
//! ` ` (space), `"` (double quote), and `\` (backslash).
//!
//!   [RFC6749 3.3]: https://datatracker.ietf.org/doc/html/rfc6749#section-3.3

use std::{collections::hash_set, str::FromStr};

use ahash::AHashSet;
use aliri_braid::braid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An invalid scope token
#[derive(Debug, Error)]
pub enum InvalidScopeToken {
    /// The scope token was the empty string
    #[error("scope token cannot be empty")]
    EmptyString,
    /// The scope token contained an invalid byte
    #[error("invalid scope token byte at position {position}: 0x{value:02x}")]
    InvalidByte {
        /// The index in the scope token where the invalid byte was found
        position: usize,
        /// The invalid byte value
        value: u8,
    },
}

impl From<std::convert::Infallible> for InvalidScopeToken {
    fn from(x: std::convert::Infallible) -> Self {
        match x {}
    }
}

/// A single granted capability, such as `read:data`
#[braid(
    serde,
    validator,
    ref_doc = "A borrowed reference to a [`ScopeToken`]"
)]
pub struct ScopeToken;

impl aliri_braid::Validator for ScopeToken {
    type Error = InvalidScopeToken;

    /// A valid scope token is non-empty and composed of printable ASCII
    /// characters except ` `, `"`, and `\`.
    fn validate(s: &str) -> Result<(), Self::Error> {
        if s.is_empty() {
            Err(InvalidScopeToken::EmptyString)
        } else if let Some((position, &value)) = s
            .as_bytes()
            .iter()
            .enumerate()
            .find(|(_, &b)| b <= 0x20 || b == 0x22 || b == 0x5C || 0x7F <= b)
        {
            Err(InvalidScopeToken::InvalidByte { position, value })
        } else {
            Ok(())
        }
    }
}

/// The set of scopes granted to a principal
///
/// On the wire (in the `scopes` claim) this is strictly an array of scope
/// token strings; any other JSON shape fails deserialization. Duplicates
/// collapse and ordering is irrelevant for equality. Serialization is
/// sorted so that signing a claims payload stays deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ScopeToken>", into = "Vec<ScopeToken>")]
#[must_use]
pub struct ScopeSet(AHashSet<ScopeToken>);

impl From<Vec<ScopeToken>> for ScopeSet {
    #[inline]
    fn from(tokens: Vec<ScopeToken>) -> Self {
        Self(tokens.into_iter().collect())
    }
}

impl From<ScopeSet> for Vec<ScopeToken> {
    #[inline]
    fn from(set: ScopeSet) -> Self {
        let mut tokens: Vec<_> = set.0.into_iter().collect();
        tokens.sort();
        tokens
    }
}

impl ScopeSet {
    /// Produces an empty scope set
    #[inline]
    pub fn empty() -> Self {
        Self(AHashSet::new())
    }

    /// Constructs a scope set holding a single token
    #[inline]
    pub fn single(token: ScopeToken) -> Self {
        let mut set = Self::empty();
        set.insert(token);
        set
    }

    /// Adds a scope token to the set
    #[inline]
    pub fn insert(&mut self, token: ScopeToken) {
        self.0.insert(token);
    }

    /// Whether the set holds the given token
    #[inline]
    #[must_use]
    pub fn contains(&self, token: &ScopeTokenRef) -> bool {
        self.0.contains(token)
    }

    /// Whether every token in `subset` is held by this set
    #[inline]
    #[must_use]
    pub fn contains_all(&self, subset: &ScopeSet) -> bool {
        self.0.is_superset(&subset.0)
    }

    /// The number of distinct tokens in the set
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no tokens
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Produces an iterator of the tokens in this set
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &ScopeTokenRef> {
        self.into_iter()
    }
}

impl IntoIterator for ScopeSet {
    type Item = ScopeToken;
    type IntoIter = <AHashSet<ScopeToken> as IntoIterator>::IntoIter;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// An iterator over a set of borrowed scope tokens
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    iter: hash_set::Iter<'a, ScopeToken>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a ScopeTokenRef;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|t| t.as_ref())
    }
}

impl<'a> IntoIterator for &'a ScopeSet {
    type Item = &'a ScopeTokenRef;
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        Self::IntoIter {
            iter: self.0.iter(),
        }
    }
}

impl<S> Extend<S> for ScopeSet
where
    S: Into<ScopeToken>,
{
    #[inline]
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = S>,
    {
        self.0.extend(iter.into_iter().map(Into::into))
    }
}

impl<S> FromIterator<S> for ScopeSet
where
    S: Into<ScopeToken>,
{
    #[inline]
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        let mut set = Self::empty();
        set.extend(iter);
        set
    }
}

impl TryFrom<&'_ str> for ScopeSet {
    type Error = InvalidScopeToken;

    /// Parses a space-separated list of scope tokens
    #[inline]
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.split_whitespace()
            .map(|t| ScopeToken::new(t.to_owned()))
            .collect()
    }
}

impl FromStr for ScopeSet {
    type Err = InvalidScopeToken;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

/// Construct a [`ScopeSet`](crate::ScopeSet) from scope token literals
///
/// # Panics
///
/// Panics if any literal is not a valid scope token.
///
/// ```
/// use keygate_account::scopes;
///
/// let granted = scopes!["read:data", "write:data"];
/// assert_eq!(granted.len(), 2);
/// ```
#[macro_export]
macro_rules! scopes {
    ($($token:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut set = $crate::ScopeSet::empty();
        $(
            set.insert(
                $token
                    .parse::<$crate::ScopeToken>()
                    .expect("invalid scope token"),
            );
        )*
        set
    }};
}
