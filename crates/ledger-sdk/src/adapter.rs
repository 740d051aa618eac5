//! The contract between a concrete request type and the execution engine

use bytes::Bytes;
use ledger_types::{AccountId, LedgerId, NodeId, TransactionId};
use std::fmt;

use crate::error::SdkError;
use crate::status::{self, ExecutionState};

/// Remote service and method a request is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    /// Service name, e.g. `CryptoService`
    pub service: String,
    /// Method name, e.g. `getAccountBalance`
    pub method: String,
}

impl MethodDescriptor {
    /// Create a descriptor
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.method)
    }
}

/// Who pays for a paid query, and which node is paid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payment {
    /// Operator account paying the fee
    pub payer: AccountId,
    /// Node receiving the fee
    pub node: NodeId,
}

/// Per-attempt facts the engine hands to the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Node this attempt targets
    pub node: NodeId,
    /// 0-based attempt index
    pub attempt: u32,
    /// Present when the request requires payment
    pub payment: Option<Payment>,
}

/// A request the engine can execute
///
/// The engine never looks inside the request: it only calls these hooks.
/// Everything with a default is optional.
pub trait RequestAdapter: Send + Sync {
    /// Typed result of a successful execution
    type Output: Send + 'static;

    /// Check embedded entity ids against the configured ledger
    fn validate_checksums(&self, _ledger: &LedgerId) -> Result<(), SdkError> {
        Ok(())
    }

    /// Whether the request must carry a payment
    fn is_payment_required(&self) -> bool {
        false
    }

    /// Transaction id, for transactions
    fn transaction_id(&self) -> Option<TransactionId> {
        None
    }

    /// Method to invoke on the node
    fn method(&self) -> MethodDescriptor;

    /// Serialize the request for `node`
    fn build_request(&self, node: &NodeId, header: &RequestHeader) -> Result<Bytes, SdkError>;

    /// Decode the status code from a response header
    fn response_status(&self, response: &[u8]) -> Result<i32, SdkError>;

    /// Classify a decoded status
    fn classify(&self, code: i32, _response: &[u8]) -> ExecutionState {
        status::classify(code)
    }

    /// Decode a successful response
    fn map_response(
        &self,
        response: Bytes,
        node: &NodeId,
        request: &Bytes,
    ) -> Result<Self::Output, SdkError>;
}
