//! Response status classification
//!
//! Every response a node sends back is reduced to one [`ExecutionState`]
//! before the engine decides what to do next.

use ledger_types::Status;

/// What a single attempt's outcome means for the execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionState {
    /// Terminal success
    Success,
    /// Node is busy or not ready; try again, same node preferred
    Retry,
    /// Node misbehaved; try again on a different node
    ServerError,
    /// The request itself is invalid; never retry
    RequestError,
}

impl ExecutionState {
    /// Whether the engine keeps going after this state
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecutionState::Retry | ExecutionState::ServerError)
    }
}

/// Classify a raw response status code
///
/// Total over `i32`: codes outside the known table are treated as a node
/// fault so the call moves on to another node instead of failing or
/// succeeding on something it cannot interpret.
pub fn classify(code: i32) -> ExecutionState {
    classify_status(Status(code))
}

/// Classify a response status
pub fn classify_status(status: Status) -> ExecutionState {
    match status {
        Status::OK => ExecutionState::Success,
        Status::BUSY | Status::PLATFORM_NOT_ACTIVE | Status::UNKNOWN => ExecutionState::Retry,
        Status::PLATFORM_TRANSACTION_NOT_CREATED
        | Status::INVALID_NODE_ACCOUNT
        | Status::INTERNAL_ERROR => ExecutionState::ServerError,
        status if status.is_known() => ExecutionState::RequestError,
        _ => ExecutionState::ServerError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_is_success() {
        assert_eq!(classify(Status::OK.code()), ExecutionState::Success);
    }

    #[test]
    fn test_busy_statuses_retry() {
        for status in [Status::BUSY, Status::PLATFORM_NOT_ACTIVE, Status::UNKNOWN] {
            assert_eq!(classify_status(status), ExecutionState::Retry, "{}", status);
        }
    }

    #[test]
    fn test_unhealthy_node_statuses_are_server_errors() {
        for status in [
            Status::PLATFORM_TRANSACTION_NOT_CREATED,
            Status::INVALID_NODE_ACCOUNT,
            Status::INTERNAL_ERROR,
        ] {
            assert_eq!(classify_status(status), ExecutionState::ServerError, "{}", status);
        }
    }

    #[test]
    fn test_invalid_requests_are_request_errors() {
        for status in [
            Status::INVALID_SIGNATURE,
            Status::INSUFFICIENT_TX_FEE,
            Status::TRANSACTION_EXPIRED,
            Status::DUPLICATE_TRANSACTION,
            Status::INVALID_ACCOUNT_ID,
        ] {
            assert_eq!(classify_status(status), ExecutionState::RequestError, "{}", status);
        }
    }

    #[test]
    fn test_unrecognized_codes_switch_nodes() {
        assert_eq!(classify(-1), ExecutionState::ServerError);
        assert_eq!(classify(123_456), ExecutionState::ServerError);
    }

    #[test]
    fn test_every_known_status_has_a_classification() {
        for status in Status::KNOWN {
            let state = classify_status(*status);
            if *status == Status::OK {
                assert_eq!(state, ExecutionState::Success);
            } else {
                assert_ne!(state, ExecutionState::Success, "{}", status);
            }
        }
    }

    #[test]
    fn test_retryable() {
        assert!(ExecutionState::Retry.is_retryable());
        assert!(ExecutionState::ServerError.is_retryable());
        assert!(!ExecutionState::Success.is_retryable());
        assert!(!ExecutionState::RequestError.is_retryable());
    }
}
