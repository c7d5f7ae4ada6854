//! Bearer credential handling and subject extraction.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jiff::Timestamp;
use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroize;

/// Claims that may carry the subject id, in lookup order.
const SUBJECT_CLAIMS: [&str; 4] = ["sub", "id", "_id", "userId"];

/// Bearer credential issued by the shop API.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerCredential {
    token: String,
}

impl BearerCredential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Raw credential, for the `Authorization` header only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.token.trim().is_empty()
    }
}

impl fmt::Debug for BearerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerCredential(**redacted**)")?;
        Ok(())
    }
}

impl Drop for BearerCredential {
    fn drop(&mut self) {
        self.token.zeroize();
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential is empty")]
    Empty,

    #[error("credential format is invalid")]
    InvalidFormat,

    #[error("credential payload encoding is invalid")]
    InvalidEncoding,

    #[error("credential payload is not valid claims json")]
    InvalidClaims,

    #[error("credential does not name a subject")]
    MissingSubject,

    #[error("credential expired at {0}")]
    Expired(Timestamp),
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<i64>,

    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    fn subject(&self) -> Option<String> {
        SUBJECT_CLAIMS.iter().find_map(|claim| {
            match self.rest.get(*claim)? {
                serde_json::Value::String(value) if !value.trim().is_empty() => {
                    Some(value.trim().to_string())
                }
                serde_json::Value::Number(value) => Some(value.to_string()),
                _ => None,
            }
        })
    }
}

/// Extract the subject id from a `header.payload.signature` credential.
///
/// Only the payload is inspected. The signature is the API's concern; an
/// `exp` claim in the past makes the credential unusable here as well.
pub fn decode_subject(
    credential: &BearerCredential,
    now: Timestamp,
) -> Result<String, CredentialError> {
    if credential.is_blank() {
        return Err(CredentialError::Empty);
    }

    let mut segments = credential.expose().trim().split('.');

    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(CredentialError::InvalidFormat);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| CredentialError::InvalidEncoding)?;

    let claims: Claims =
        serde_json::from_slice(&bytes).map_err(|_| CredentialError::InvalidClaims)?;

    if let Some(exp) = claims.exp {
        let expires_at =
            Timestamp::from_second(exp).map_err(|_| CredentialError::InvalidClaims)?;

        if expires_at <= now {
            return Err(CredentialError::Expired(expires_at));
        }
    }

    claims.subject().ok_or(CredentialError::MissingSubject)
}
