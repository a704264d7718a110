//! Error types shared by the PoET enclave simulator crates.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PoetError>;

/// The three error kinds the enclave core can raise.
#[derive(Error, Debug)]
pub enum PoetError {
    /// A PoET keypair is required but the enclave hasn't created or
    /// unsealed signup information yet.
    #[error("enclave must be initialized before attempting this operation")]
    NotInitialized,
    /// A contract violation in signup/certificate verification or the
    /// wait-certificate preconditions.
    #[error("{0}")]
    Validation(String),
    /// Input bytes or JSON could not be parsed, or a fixed-size structure
    /// was too short.
    #[error("{0}")]
    Malformed(String),
}

impl PoetError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}

impl From<serde_json::Error> for PoetError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(format!("could not parse JSON: {e}"))
    }
}

impl From<base64::DecodeError> for PoetError {
    fn from(e: base64::DecodeError) -> Self {
        Self::Malformed(format!("could not decode base64: {e}"))
    }
}
