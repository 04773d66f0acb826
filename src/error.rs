//! Error types for powledger

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Peer {peer} unreachable: {reason}")]
    UnreachablePeer { peer: String, reason: String },

    #[error("Peer {0} timed out")]
    PeerTimeout(String),

    #[error("Invalid chain: {0}")]
    InvalidChain(String),

    /// The ledger lost its genesis block. Only a construction defect can cause this.
    #[error("Chain is empty")]
    EmptyChain,

    #[error("Proof search cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
