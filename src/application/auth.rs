//! Bearer token authentication against the configured token list.

use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::{ApiToken, TokenRole};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    Missing,
    #[error("invalid bearer token")]
    Invalid,
    #[error("token lacks the required role")]
    Forbidden,
}

/// The caller a request was authenticated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub role: TokenRole,
}

impl Principal {
    pub fn requires_admin(&self) -> Result<(), AuthError> {
        match self.role {
            TokenRole::Admin => Ok(()),
            TokenRole::Staff => Err(AuthError::Forbidden),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenAuthenticator {
    tokens: Vec<ApiToken>,
}

impl TokenAuthenticator {
    pub fn new(tokens: Vec<ApiToken>) -> Self {
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Resolve a presented secret. Every configured token is compared so the
    /// time taken does not depend on which one matched.
    pub fn authenticate(&self, presented: &str) -> Result<Principal, AuthError> {
        if presented.is_empty() {
            return Err(AuthError::Missing);
        }

        let mut matched = None;
        for token in &self.tokens {
            if token.secret.as_bytes().ct_eq(presented.as_bytes()).unwrap_u8() == 1 {
                matched.get_or_insert(token);
            }
        }

        matched
            .map(|token| Principal {
                user_id: token.user_id.clone(),
                role: token.role,
            })
            .ok_or(AuthError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> TokenAuthenticator {
        TokenAuthenticator::new(vec![
            ApiToken {
                user_id: "ops".to_string(),
                secret: "admin-secret".to_string(),
                role: TokenRole::Admin,
            },
            ApiToken {
                user_id: "desk-1".to_string(),
                secret: "staff-secret".to_string(),
                role: TokenRole::Staff,
            },
        ])
    }

    #[test]
    fn resolves_principal_by_secret() {
        let principal = authenticator()
            .authenticate("staff-secret")
            .expect("known token");
        assert_eq!(principal.user_id, "desk-1");
        assert_eq!(principal.role, TokenRole::Staff);
        assert_eq!(principal.requires_admin(), Err(AuthError::Forbidden));
    }

    #[test]
    fn rejects_unknown_and_empty_tokens() {
        let auth = authenticator();
        assert_eq!(auth.authenticate("admin-secre"), Err(AuthError::Invalid));
        assert_eq!(auth.authenticate(""), Err(AuthError::Missing));
    }

    #[test]
    fn admin_passes_role_check() {
        let principal = authenticator()
            .authenticate("admin-secret")
            .expect("known token");
        assert!(principal.requires_admin().is_ok());
    }
}
