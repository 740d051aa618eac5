//! SDK error types

use ledger_types::{LedgerId, NodeId, Status, TransactionId, TypesError};
use thiserror::Error;

use crate::transport::TransportError;

/// Terminal failure of an execution
#[derive(Debug, Error)]
pub enum SdkError {
    /// A node rejected the request at precheck
    #[error("precheck failed with status {status} at node {node}{}", tx_suffix(.transaction_id))]
    Precheck {
        /// Rejecting status
        status: Status,
        /// Node that rejected the request
        node: NodeId,
        /// Transaction id, for transactions
        transaction_id: Option<TransactionId>,
    },

    /// The request failed local validation before anything was sent
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An embedded entity id carries a checksum for another ledger
    #[error("entity {entity} has a checksum that does not match ledger {ledger}")]
    BadChecksum {
        /// Offending entity, as written by the caller
        entity: String,
        /// Ledger the client is configured for
        ledger: LedgerId,
    },

    /// Attempt budget used up on transient failures
    #[error("gave up after {attempts} attempts{}", last_suffix(.last))]
    MaxAttemptsExceeded {
        /// Attempts made
        attempts: u32,
        /// Last failure observed
        last: Option<Box<AttemptError>>,
    },

    /// Deadline passed before a terminal response
    #[error("deadline exceeded{}", last_suffix(.last))]
    DeadlineExceeded {
        /// Last failure observed
        last: Option<Box<AttemptError>>,
    },

    /// Transaction reached consensus with an unfavorable status
    #[error("receipt for transaction {transaction_id} has status {status}")]
    Receipt {
        /// Final status of the transaction
        status: Status,
        /// Transaction the receipt belongs to
        transaction_id: TransactionId,
    },

    /// The caller cancelled the execution
    #[error("execution cancelled")]
    Cancelled,

    /// A successful response could not be decoded into the result type
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Client configuration is unusable
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Coarse classification of [`SdkError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Request is invalid; retrying cannot help
    RequestRejected,
    /// Attempt budget exhausted
    MaxAttemptsExceeded,
    /// Deadline exhausted
    DeadlineExceeded,
    /// Transaction accepted but resolved unfavorably
    ReceiptFailure,
    /// Cancelled by the caller
    Cancelled,
    /// Node answered success but the payload was unusable
    InvalidResponse,
    /// Client misconfiguration
    Configuration,
}

impl SdkError {
    /// Coarse kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SdkError::Precheck { .. }
            | SdkError::InvalidRequest(_)
            | SdkError::BadChecksum { .. } => ErrorKind::RequestRejected,
            SdkError::MaxAttemptsExceeded { .. } => ErrorKind::MaxAttemptsExceeded,
            SdkError::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            SdkError::Receipt { .. } => ErrorKind::ReceiptFailure,
            SdkError::Cancelled => ErrorKind::Cancelled,
            SdkError::InvalidResponse(_) => ErrorKind::InvalidResponse,
            SdkError::Config(_) => ErrorKind::Configuration,
        }
    }

    /// Status carried by the error, directly or through the last attempt
    pub fn status(&self) -> Option<Status> {
        match self {
            SdkError::Precheck { status, .. } | SdkError::Receipt { status, .. } => Some(*status),
            SdkError::MaxAttemptsExceeded { last, .. } | SdkError::DeadlineExceeded { last } => {
                last.as_ref().and_then(|last| last.status())
            }
            _ => None,
        }
    }

    /// Node attempted last, if any attempt was made
    pub fn node(&self) -> Option<NodeId> {
        match self {
            SdkError::Precheck { node, .. } => Some(*node),
            SdkError::MaxAttemptsExceeded { last, .. } | SdkError::DeadlineExceeded { last } => {
                last.as_ref().map(|last| last.node())
            }
            _ => None,
        }
    }

    /// Transaction id carried by the error
    pub fn transaction_id(&self) -> Option<TransactionId> {
        match self {
            SdkError::Precheck { transaction_id, .. } => *transaction_id,
            SdkError::Receipt { transaction_id, .. } => Some(*transaction_id),
            _ => None,
        }
    }
}

/// Failure of a single attempt, kept as diagnostic context
#[derive(Debug, Error)]
pub enum AttemptError {
    /// Node answered with a non-terminal status
    #[error("node {node} answered {status}")]
    Status {
        /// Node attempted
        node: NodeId,
        /// Status it answered
        status: Status,
    },

    /// Transport could not complete the exchange
    #[error("node {node} unreachable: {source}")]
    Transport {
        /// Node attempted
        node: NodeId,
        /// Transport failure
        #[source]
        source: TransportError,
    },

    /// Node answered with bytes whose header could not be decoded
    #[error("node {node} sent an undecodable response: {reason}")]
    MalformedResponse {
        /// Node attempted
        node: NodeId,
        /// Decoder message
        reason: String,
    },
}

impl AttemptError {
    /// Node the attempt went to
    pub fn node(&self) -> NodeId {
        match self {
            AttemptError::Status { node, .. }
            | AttemptError::Transport { node, .. }
            | AttemptError::MalformedResponse { node, .. } => *node,
        }
    }

    /// Status observed, if the node answered
    pub fn status(&self) -> Option<Status> {
        match self {
            AttemptError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn tx_suffix(transaction_id: &Option<TransactionId>) -> String {
    transaction_id
        .map(|id| format!(" for transaction {}", id))
        .unwrap_or_default()
}

fn last_suffix(last: &Option<Box<AttemptError>>) -> String {
    last.as_ref()
        .map(|last| format!(" (last: {})", last))
        .unwrap_or_default()
}

impl From<TypesError> for SdkError {
    fn from(e: TypesError) -> Self {
        SdkError::InvalidRequest(e.to_string())
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(e: serde_json::Error) -> Self {
        SdkError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precheck_message_names_status_and_transaction() {
        let tx = TransactionId::new(NodeId::from_num(1001), 100, 5);
        let err = SdkError::Precheck {
            status: Status::INVALID_SIGNATURE,
            node: NodeId::from_num(3),
            transaction_id: Some(tx),
        };
        let msg = err.to_string();
        assert!(msg.contains("INVALID_SIGNATURE"));
        assert!(msg.contains("0.0.3"));
        assert!(msg.contains("0.0.1001@100.000000005"));
        assert_eq!(err.kind(), ErrorKind::RequestRejected);
        assert_eq!(err.status(), Some(Status::INVALID_SIGNATURE));
        assert_eq!(err.transaction_id(), Some(tx));
    }

    #[test]
    fn test_max_attempts_carries_last_error() {
        let err = SdkError::MaxAttemptsExceeded {
            attempts: 5,
            last: Some(Box::new(AttemptError::Status {
                node: NodeId::from_num(4),
                status: Status::BUSY,
            })),
        };
        let msg = err.to_string();
        assert!(msg.contains("5 attempts"));
        assert!(msg.contains("BUSY"));
        assert_eq!(err.kind(), ErrorKind::MaxAttemptsExceeded);
        assert_eq!(err.node(), Some(NodeId::from_num(4)));
        assert_eq!(err.status(), Some(Status::BUSY));
    }

    #[test]
    fn test_deadline_without_attempts() {
        let err = SdkError::DeadlineExceeded { last: None };
        assert_eq!(err.to_string(), "deadline exceeded");
        assert_eq!(err.node(), None);
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    }

    #[test]
    fn test_transport_attempt_error_has_source() {
        use std::error::Error as _;

        let err = AttemptError::Transport {
            node: NodeId::from_num(5),
            source: TransportError::ConnectionRefused("127.0.0.1:50211".into()),
        };
        assert!(err.source().is_some());
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("0.0.5"));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(SdkError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            SdkError::InvalidResponse("x".into()).kind(),
            ErrorKind::InvalidResponse
        );
        assert_eq!(SdkError::Config("x".into()).kind(), ErrorKind::Configuration);
        let receipt = SdkError::Receipt {
            status: Status::FAIL_BALANCE,
            transaction_id: TransactionId::new(NodeId::from_num(2), 1, 0),
        };
        assert_eq!(receipt.kind(), ErrorKind::ReceiptFailure);
    }

    #[test]
    fn test_from_types_error() {
        let err: SdkError = "nope".parse::<NodeId>().unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::RequestRejected);
    }
}
