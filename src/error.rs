//! Error types for the saver
//!
//! Build and verification failures share one vocabulary: anything the
//! voting side would reject is `WrongOperationContent` or
//! `UnsupportedNetwork`, while `Transport` marks failures worth retrying.

use thiserror::Error;

/// Malformed binary payload (instruction data or metadata account)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty instruction data")]
    Empty,

    #[error("unknown instruction discriminant: {0}")]
    UnknownDiscriminant(u8),

    #[error("instruction {found} does not match expected {expected}")]
    KindMismatch { expected: u8, found: u8 },

    #[error("instruction {0} is not a deposit")]
    NotDeposit(u8),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Errors surfaced by the transfer builders, the verifier and their collaborators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("wrong operation content")]
    WrongOperationContent,

    #[error("unsupported network: {chain}")]
    UnsupportedNetwork { chain: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl BridgeError {
    /// Terminal verdict for the input, as opposed to a retryable outage
    pub fn is_rejection(&self) -> bool {
        !matches!(self, BridgeError::Transport(_))
    }

    pub fn transport(err: impl std::fmt::Display) -> Self {
        BridgeError::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        BridgeError::Transport(err.to_string())
    }
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
