//! Challenge/accept decision for a single request.
//!
//! ```text
//! AwaitingHeader ─┬─ Absent ────────────────────────────────▶ MissingAuth
//!                 └─ Present ─┬─ other scheme ──────────────▶ MissingAuth
//!                             ├─ Rejected-Malformed ────────▶ MalformedAuthHeader
//!                             └─ Decoded ─┬─ Rejected ──────▶ InvalidCredentials
//!                                         └─ Verified ──────▶ Ok(username)
//! ```

use axum::http::{header, HeaderMap};
use thiserror::Error;
use tracing::debug;

use crate::auth::basic::{self, DecodeError};
use crate::auth::credentials::CredentialStore;

pub const MISSING_AUTH_BODY: &str = "No authorization header received";
pub const BAD_CREDENTIALS_BODY: &str = "Wrong username/password";

/// Why a request was not authenticated.  Every variant is answered with the
/// same 401 challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no usable authorization header")]
    MissingAuth,
    #[error("malformed authorization header")]
    MalformedAuthHeader,
    #[error("invalid credentials")]
    InvalidCredentials,
}

impl AuthError {
    /// Plain-text body sent with the challenge.
    pub fn body(&self) -> &'static str {
        match self {
            AuthError::MissingAuth => MISSING_AUTH_BODY,
            AuthError::MalformedAuthHeader | AuthError::InvalidCredentials => BAD_CREDENTIALS_BODY,
        }
    }

    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingAuth => "missing",
            AuthError::MalformedAuthHeader => "malformed",
            AuthError::InvalidCredentials => "invalid",
        }
    }
}

/// Run the gate over `headers`, returning the verified username.
pub fn authenticate(store: &CredentialStore, headers: &HeaderMap) -> Result<String, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Err(AuthError::MissingAuth);
    };
    // Decide the scheme on raw bytes so opaque bytes in a foreign scheme's
    // payload still count as "no Basic credentials".
    let scheme = value
        .as_bytes()
        .split(u8::is_ascii_whitespace)
        .find(|token| !token.is_empty());
    if let Some(scheme) = scheme {
        if !scheme.eq_ignore_ascii_case(b"Basic") {
            return Err(AuthError::MissingAuth);
        }
    }
    let value = value.to_str().map_err(|_| AuthError::MalformedAuthHeader)?;

    let credentials = basic::decode(value).map_err(|e| match e {
        DecodeError::UnsupportedScheme => AuthError::MissingAuth,
        DecodeError::Malformed => AuthError::MalformedAuthHeader,
    })?;

    if store.verify(&credentials.username, &credentials.secret) {
        debug!(username = %credentials.username, "credentials verified");
        Ok(credentials.username)
    } else {
        Err(AuthError::InvalidCredentials)
    }
}
