//! Bearer token authentication against the token set in the store.

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::{ServiceError, StoreError};
use crate::store::TranscriptStore;

/// Random bytes per generated token (43 chars once base64url-encoded).
pub const TOKEN_BYTES: usize = 32;

/// Fresh URL-safe token from the OS CSPRNG.
pub fn generate_token() -> String {
    let mut raw = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut raw);
    URL_SAFE_NO_PAD.encode(raw)
}

/// Extract the token from an `Authorization` header value.
/// Anything other than `Bearer <non-empty>` counts as no credential.
pub fn bearer_token(header_value: Option<&str>) -> Option<&str> {
    let value = header_value?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[derive(Clone)]
pub struct TokenAuthenticator {
    store: TranscriptStore,
}

impl TokenAuthenticator {
    pub fn new(store: TranscriptStore) -> Self {
        Self { store }
    }

    /// `None` (no credential at all) and an unknown token are rejected with different errors.
    pub fn authenticate(&self, credential: Option<&str>) -> Result<(), ServiceError> {
        let token = credential.ok_or(ServiceError::Unauthenticated)?;
        if self.store.is_token_valid(token)? {
            Ok(())
        } else {
            tracing::debug!(target: "ytscribe::auth", "rejected unknown token");
            Err(ServiceError::InvalidToken)
        }
    }

    /// First-run bootstrap: when the token set is empty, mint one token, persist it and
    /// announce it once at warn level. Returns the new token, or `None` if tokens already exist.
    pub fn bootstrap(&self) -> Result<Option<String>, StoreError> {
        if self.store.has_any_token()? {
            return Ok(None);
        }
        let token = generate_token();
        self.store.add_token(&token)?;
        tracing::warn!(
            target: "ytscribe::auth",
            "No API tokens found. Generated a new secure token: {}",
            token
        );
        Ok(Some(token))
    }
}
