//! `Authorization: Basic` header codec (RFC 7617).
//!
//! The scheme token is matched case-insensitively.  The credentials token is
//! standard base64 and must decode to UTF-8 `username:secret`; only the first
//! `:` separates the two, so secrets may contain colons.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

const SCHEME: &str = "Basic";

/// Username and secret recovered from a Basic header.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The header names some scheme other than `Basic`.
    #[error("unsupported authorization scheme")]
    UnsupportedScheme,
    /// The header claims `Basic` but its payload cannot be decoded.
    #[error("malformed basic authorization header")]
    Malformed,
}

/// Decode an `Authorization` header value into [`Credentials`].
pub fn decode(header_value: &str) -> Result<Credentials, DecodeError> {
    let mut tokens = header_value.split_whitespace();
    let scheme = tokens.next().ok_or(DecodeError::Malformed)?;
    if !scheme.eq_ignore_ascii_case(SCHEME) {
        return Err(DecodeError::UnsupportedScheme);
    }

    let payload = tokens.next().ok_or(DecodeError::Malformed)?;
    if tokens.next().is_some() {
        return Err(DecodeError::Malformed);
    }

    let bytes = STANDARD.decode(payload).map_err(|_| DecodeError::Malformed)?;
    let colon = bytes
        .iter()
        .position(|&b| b == b':')
        .ok_or(DecodeError::Malformed)?;
    let (user, rest) = bytes.split_at(colon);

    let username = std::str::from_utf8(user).map_err(|_| DecodeError::Malformed)?;
    let secret = std::str::from_utf8(&rest[1..]).map_err(|_| DecodeError::Malformed)?;

    Ok(Credentials {
        username: username.to_owned(),
        secret: secret.to_owned(),
    })
}

/// Build a `Basic <base64(username:secret)>` header value.
#[cfg(test)]
pub fn encode(username: &str, secret: &str) -> String {
    format!("{SCHEME} {}", STANDARD.encode(format!("{username}:{secret}")))
}
