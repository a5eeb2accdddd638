//! The service-account principal and its claims payload

use aliri_braid::braid;
use keygate::clock::UnixTime;
use keygate::token::{BasicClaims, CoreClaims, IssuerRef, SubjectRef};
use serde::{Deserialize, Serialize};

use crate::scope::{ScopeSet, ScopeTokenRef};

/// The identifier of a calling service account
#[braid(serde, ref_doc = "A borrowed reference to a [`ClientId`]")]
pub struct ClientId;

/// An authenticated service account
///
/// Identifies the calling service and the capabilities it has been
/// granted. Immutable once constructed; created when a valid credential is
/// parsed and discarded at the end of the request it authenticated.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct ServiceAccount {
    client_id: ClientId,
    name: String,
    scopes: ScopeSet,
}

impl ServiceAccount {
    /// Constructs a principal from its identifier, display name, and
    /// granted scopes
    pub fn new(
        client_id: impl Into<ClientId>,
        name: impl Into<String>,
        scopes: ScopeSet,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            name: name.into(),
            scopes,
        }
    }

    /// The account identifier
    pub fn client_id(&self) -> &ClientIdRef {
        &self.client_id
    }

    /// The account display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scopes granted to this account
    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    /// Whether this account has been granted the given scope
    #[must_use]
    pub fn has_scope(&self, token: &ScopeTokenRef) -> bool {
        self.scopes.contains(token)
    }

    /// Derives the coarse capability strings for downstream authorization
    /// layers: one `SCOPE_`-prefixed entry per granted scope, sorted
    pub fn capabilities(&self) -> Capabilities {
        let mut entries: Vec<String> = self
            .scopes
            .iter()
            .map(|t| format!("SCOPE_{}", t.as_str()))
            .collect();
        entries.sort();
        Capabilities(entries)
    }
}

/// Coarse capability strings derived from a principal's scopes
///
/// Exposed after successful authentication for authorization layers that
/// work off capability strings rather than the principal directly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct Capabilities(Vec<String>);

impl Capabilities {
    /// Whether the given capability string was derived
    #[must_use]
    pub fn contains(&self, capability: &str) -> bool {
        self.0.iter().any(|c| c == capability)
    }

    /// Iterates the derived capability strings
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// The number of derived capability strings
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no capabilities were derived
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The claims payload carried by a service-account credential
///
/// The embedded principal fields are all required: a credential whose
/// `clientId`, `name`, or `scopes` claim is missing or of the wrong JSON
/// type does not decode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct AccountClaims {
    #[serde(flatten)]
    pub(crate) basic: BasicClaims,

    #[serde(rename = "clientId")]
    pub(crate) client_id: ClientId,

    pub(crate) name: String,

    pub(crate) scopes: ScopeSet,
}

impl AccountClaims {
    /// The embedded account identifier
    pub fn client_id(&self) -> &ClientIdRef {
        &self.client_id
    }

    /// The embedded account display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The embedded granted scopes
    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }
}

impl CoreClaims for AccountClaims {
    #[inline]
    fn iss(&self) -> Option<&IssuerRef> {
        self.basic.iss()
    }

    #[inline]
    fn sub(&self) -> Option<&SubjectRef> {
        self.basic.sub()
    }

    #[inline]
    fn iat(&self) -> Option<UnixTime> {
        self.basic.iat()
    }

    #[inline]
    fn exp(&self) -> Option<UnixTime> {
        self.basic.exp()
    }
}

impl From<AccountClaims> for ServiceAccount {
    fn from(claims: AccountClaims) -> Self {
        Self {
            client_id: claims.client_id,
            name: claims.name,
            scopes: claims.scopes,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::scopes;

    use super::*;

    #[test]
    fn capabilities_are_prefixed_and_sorted() {
        let account = ServiceAccount::new(
            "svc-1",
            "Reporting",
            scopes!["write:data", "read:data"],
        );

        let caps = account.capabilities();
        assert_eq!(
            caps.iter().collect::<Vec<_>>(),
            ["SCOPE_read:data", "SCOPE_write:data"]
        );
        assert!(caps.contains("SCOPE_read:data"));
        assert!(!caps.contains("read:data"));
    }

    #[test]
    fn claims_decode_with_all_fields() {
        let claims: AccountClaims = serde_json::from_str(
            r#"{
                "iss": "service-account-starter",
                "sub": "svc-1",
                "iat": 10,
                "exp": 310,
                "clientId": "svc-1",
                "name": "Reporting",
                "scopes": ["read:data"]
            }"#,
        )
        .unwrap();

        assert_eq!(claims.client_id().as_str(), "svc-1");
        assert_eq!(claims.exp(), Some(UnixTime(310)));

        let account = ServiceAccount::from(claims);
        assert!(account.has_scope(ScopeTokenRef::from_str("read:data").unwrap()));
    }

    #[test]
    fn claims_reject_missing_client_id() {
        let result = serde_json::from_str::<AccountClaims>(
            r#"{"name": "Reporting", "scopes": ["read:data"]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn claims_reject_missing_scopes() {
        let result = serde_json::from_str::<AccountClaims>(
            r#"{"clientId": "svc-1", "name": "Reporting"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn claims_reject_non_list_scopes() {
        let result = serde_json::from_str::<AccountClaims>(
            r#"{"clientId": "svc-1", "name": "Reporting", "scopes": "read:data"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn claims_reject_wrongly_typed_name() {
        let result = serde_json::from_str::<AccountClaims>(
            r#"{"clientId": "svc-1", "name": 17, "scopes": []}"#,
        );
        assert!(result.is_err());
    }
}
