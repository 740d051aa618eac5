//! Transaction responses and receipts

use bytes::Bytes;
use ledger_types::{AccountId, NodeId, Status, TransactionId};

use crate::error::SdkError;
use crate::executor::ExecuteOptions;
use crate::status::ExecutionState;

/// Immediate answer to a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResponse {
    /// Node that accepted the transaction
    pub node_id: NodeId,
    /// Submitted transaction
    pub transaction_id: TransactionId,
    /// Hash of the signed transaction bytes
    pub transaction_hash: Bytes,
}

impl TransactionResponse {
    /// Options that send the receipt query to the submitting node
    pub fn receipt_options(&self) -> ExecuteOptions {
        ExecuteOptions::new().node_ids(vec![self.node_id])
    }
}

/// Consensus outcome of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// Final status
    pub status: Status,
    /// Transaction the receipt belongs to
    pub transaction_id: TransactionId,
    /// Account created by the transaction, if any
    pub account_id: Option<AccountId>,
}

impl TransactionReceipt {
    /// Turn an unfavorable status into [`SdkError::Receipt`] when `validate` is set
    pub fn validate_status(self, validate: bool) -> Result<Self, SdkError> {
        if validate && !is_favorable(self.status) {
            return Err(SdkError::Receipt {
                status: self.status,
                transaction_id: self.transaction_id,
            });
        }
        Ok(self)
    }
}

fn is_favorable(status: Status) -> bool {
    matches!(status, Status::SUCCESS | Status::FEE_SCHEDULE_FILE_PART_UPLOADED)
}

/// Classify a receipt query response
///
/// A receipt that is not yet available comes back as a retry; any final
/// receipt status ends the query successfully so the caller can inspect it.
pub fn classify_receipt(precheck: Status, receipt_status: Status) -> ExecutionState {
    match precheck {
        Status::BUSY
        | Status::UNKNOWN
        | Status::RECEIPT_NOT_FOUND
        | Status::RECORD_NOT_FOUND
        | Status::PLATFORM_NOT_ACTIVE => ExecutionState::Retry,
        Status::OK => match receipt_status {
            Status::BUSY
            | Status::UNKNOWN
            | Status::OK
            | Status::RECEIPT_NOT_FOUND
            | Status::RECORD_NOT_FOUND
            | Status::PLATFORM_NOT_ACTIVE => ExecutionState::Retry,
            _ => ExecutionState::Success,
        },
        _ => ExecutionState::RequestError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(status: Status) -> TransactionReceipt {
        TransactionReceipt {
            status,
            transaction_id: TransactionId::new(AccountId::from_num(1001), 1_700_000_000, 0),
            account_id: None,
        }
    }

    #[test]
    fn test_receipt_not_ready_retries() {
        assert_eq!(classify_receipt(Status::BUSY, Status::OK), ExecutionState::Retry);
        assert_eq!(
            classify_receipt(Status::RECEIPT_NOT_FOUND, Status::OK),
            ExecutionState::Retry
        );
        assert_eq!(classify_receipt(Status::OK, Status::UNKNOWN), ExecutionState::Retry);
        assert_eq!(classify_receipt(Status::OK, Status::OK), ExecutionState::Retry);
    }

    #[test]
    fn test_final_receipt_is_success_even_if_unfavorable() {
        assert_eq!(classify_receipt(Status::OK, Status::SUCCESS), ExecutionState::Success);
        assert_eq!(
            classify_receipt(Status::OK, Status::INSUFFICIENT_PAYER_BALANCE),
            ExecutionState::Success
        );
    }

    #[test]
    fn test_rejected_receipt_query() {
        assert_eq!(
            classify_receipt(Status::INVALID_TRANSACTION_ID, Status::OK),
            ExecutionState::RequestError
        );
    }

    #[test]
    fn test_validate_status() {
        assert!(receipt(Status::SUCCESS).validate_status(true).is_ok());
        assert!(receipt(Status::FEE_SCHEDULE_FILE_PART_UPLOADED)
            .validate_status(true)
            .is_ok());
        assert!(receipt(Status::FAIL_BALANCE).validate_status(false).is_ok());

        let err = receipt(Status::FAIL_BALANCE).validate_status(true).unwrap_err();
        assert_eq!(err.status(), Some(Status::FAIL_BALANCE));
        assert!(err.to_string().contains("FAIL_BALANCE"));
    }

    #[test]
    fn test_receipt_options_pin_node() {
        let response = TransactionResponse {
            node_id: NodeId::from_num(4),
            transaction_id: TransactionId::new(AccountId::from_num(2), 1, 0),
            transaction_hash: Bytes::from_static(&[0xab; 4]),
        };
        assert_eq!(
            response.receipt_options().node_ids,
            Some(vec![NodeId::from_num(4)])
        );
    }
}
