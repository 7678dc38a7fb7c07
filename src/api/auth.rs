//! Signed-in identity, stored in the system keyring

use keyring::Entry;

use crate::error::AuthError;

/// Service name for keyring storage
const SERVICE_NAME: &str = "studyset";
/// Entry name for the identity token
const TOKEN_ENTRY: &str = "id-token";

/// The signed-in user, as far as this client knows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Opaque identity token issued by the auth provider
    pub token: String,
}

impl Identity {
    /// Token masked for display (first 8 and last 4 chars)
    pub fn masked(&self) -> String {
        Credentials::mask_token(&self.token)
    }
}

/// Manages the identity token in the system keyring
pub struct Credentials;

impl Credentials {
    fn entry() -> Result<Entry, AuthError> {
        Entry::new(SERVICE_NAME, TOKEN_ENTRY).map_err(|e| AuthError::Keyring(e.to_string()))
    }

    /// The current user, or `None` when signed out
    pub fn current_user() -> Result<Option<Identity>, AuthError> {
        match Self::entry()?.get_password() {
            Ok(token) => Ok(Some(Identity { token })),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AuthError::Keyring(e.to_string())),
        }
    }

    /// Store a token issued by the auth provider
    pub fn sign_in(token: &str) -> Result<Identity, AuthError> {
        let token = token.trim();
        if !Self::validate_token_format(token) {
            return Err(AuthError::InvalidToken);
        }
        Self::entry()?.set_password(token).map_err(|e| AuthError::Keyring(e.to_string()))?;
        Ok(Identity { token: token.to_string() })
    }

    /// Forget the stored token; signing out twice is not an error
    pub fn sign_out() -> Result<(), AuthError> {
        match Self::entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AuthError::Keyring(e.to_string())),
        }
    }

    /// Identity tokens are JWTs: three non-empty dot-separated segments
    fn validate_token_format(token: &str) -> bool {
        let segments: Vec<&str> = token.split('.').collect();
        segments.len() == 3 && segments.iter().all(|s| !s.is_empty())
    }

    /// Mask a token for display
    pub fn mask_token(token: &str) -> String {
        if token.len() <= 12 || !token.is_ascii() {
            return "*".repeat(token.chars().count());
        }
        let prefix = &token[..8];
        let suffix = &token[token.len() - 4..];
        format!("{}...{}", prefix, suffix)
    }
}
