//! Common error types for identifiers

use thiserror::Error;

/// Identifier parsing error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// Entity id was not `shard.realm.num`
    #[error("invalid entity id: {0}")]
    InvalidEntityId(String),

    /// Transaction id was not `shard.realm.num@seconds.nanos`
    #[error("invalid transaction id: {0}")]
    InvalidTransactionId(String),

    /// Unknown ledger name or malformed ledger bytes
    #[error("invalid ledger id: {0}")]
    InvalidLedgerId(String),
}

/// Result type for identifier operations
pub type TypesResult<T> = Result<T, TypesError>;
