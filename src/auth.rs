//! Authorization collaborator surface.
//!
//! The core never decides who is authorized. It consumes a bearer credential
//! and asks the embedding application one question — "is the current caller
//! authorized" — before a synchronizer is constructed.

/// Opaque bearer credential attached to API requests.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Never let the raw token reach logs.
impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// The single capability the core consumes before instantiating a
/// [`crate::sync::Synchronizer`]. Implemented by the embedding application;
/// the check itself lives outside the core.
pub trait Authorizer: Send + Sync {
    fn is_authorized(&self) -> bool;
}

/// Token-presence gate: authorized iff a credential is held.
pub struct BearerAuth {
    token: Option<AccessToken>,
}

impl BearerAuth {
    pub fn new(token: Option<AccessToken>) -> Self {
        Self { token }
    }

    pub fn token(&self) -> Option<&AccessToken> {
        self.token.as_ref()
    }

    pub fn into_token(self) -> Option<AccessToken> {
        self.token
    }
}

impl Authorizer for BearerAuth {
    fn is_authorized(&self) -> bool {
        self.token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_gate_requires_a_token() {
        assert!(!BearerAuth::new(None).is_authorized());
        assert!(BearerAuth::new(Some(AccessToken::new("t"))).is_authorized());
    }

    #[test]
    fn debug_redacts_the_token() {
        let token = AccessToken::new("secret-value");
        assert!(!format!("{token:?}").contains("secret"));
    }
}
