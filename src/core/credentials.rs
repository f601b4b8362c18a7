//! Network credentials pushed by the companion device in a notification.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a notification payload is not a credential record.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("payload is not valid UTF-8")]
    NotUtf8,
    #[error("payload is not a credential record: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("credential record has an empty SSID")]
    EmptySsid,
}

/// SSID and passphrase of the shared network. Extra fields in the record are ignored.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub ssid: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Decodes a JSON record such as `{"ssid":"Net1","password":"pw"}`.
    pub fn decode(payload: &[u8]) -> Result<Self, CredentialError> {
        let text = std::str::from_utf8(payload).map_err(|_| CredentialError::NotUtf8)?;
        let credentials: Credentials = serde_json::from_str(text.trim())?;
        if credentials.ssid.is_empty() {
            return Err(CredentialError::EmptySsid);
        }
        Ok(credentials)
    }
}
