//! Shared fixtures for ledger-sdk integration tests
//!
//! Responses on the mock wire are a 4-byte big-endian status followed by
//! the payload. Receipt responses carry two statuses: precheck, then the
//! receipt status.

#![allow(dead_code)]

use bytes::{BufMut, Bytes, BytesMut};
use ledger_sdk::{
    classify_receipt, ClientBuilder, ExecutionState, MethodDescriptor, MockTransport,
    RequestAdapter, RequestHeader, SdkError, SeededRandom, TransactionReceipt, TransportError,
};
use ledger_types::{AccountId, LedgerId, NodeId, Status, TransactionId};
use parking_lot::Mutex;
use std::sync::Arc;

/// Install a test subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Node id `0.0.n`
pub fn node(n: u64) -> NodeId {
    NodeId::from_num(n)
}

/// Builder wired to a fresh mock transport with `count` nodes `0.0.3..`
pub fn builder(count: u64) -> (ClientBuilder, MockTransport) {
    init_tracing();
    let transport = MockTransport::new();
    let mut builder = ledger_sdk::Client::builder()
        .transport(Arc::new(transport.clone()))
        .random_source(Arc::new(SeededRandom::new(7)));
    for n in 3..3 + count {
        builder = builder.node(node(n), format!("127.0.0.1:{}", 50208 + n));
    }
    (builder, transport)
}

/// Wire response with `status` and `payload`
pub fn reply(status: Status, payload: &[u8]) -> Result<Bytes, TransportError> {
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_i32(status.code());
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Wire response for a receipt query
pub fn receipt_reply(precheck: Status, receipt: Status) -> Result<Bytes, TransportError> {
    let mut buf = BytesMut::with_capacity(8);
    buf.put_i32(precheck.code());
    buf.put_i32(receipt.code());
    Ok(buf.freeze())
}

fn read_status(response: &[u8], offset: usize) -> Result<i32, SdkError> {
    response
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(i32::from_be_bytes)
        .ok_or_else(|| SdkError::InvalidResponse(format!("short response: {} bytes", response.len())))
}

/// Query whose payload decodes to a UTF-8 string
#[derive(Default)]
pub struct TestRequest {
    pub payment_required: bool,
    pub transaction_id: Option<TransactionId>,
    /// Fail checksum validation when the client runs against this ledger
    pub foreign_entity_on: Option<LedgerId>,
    pub headers: Mutex<Vec<RequestHeader>>,
}

impl TestRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paid() -> Self {
        Self {
            payment_required: true,
            ..Self::default()
        }
    }

    pub fn transaction(id: TransactionId) -> Self {
        Self {
            transaction_id: Some(id),
            ..Self::default()
        }
    }

    pub fn headers(&self) -> Vec<RequestHeader> {
        self.headers.lock().clone()
    }
}

impl RequestAdapter for TestRequest {
    type Output = String;

    fn validate_checksums(&self, ledger: &LedgerId) -> Result<(), SdkError> {
        match &self.foreign_entity_on {
            Some(foreign) if foreign == ledger => Err(SdkError::BadChecksum {
                entity: "0.0.1001-vfmkw".into(),
                ledger: ledger.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn is_payment_required(&self) -> bool {
        self.payment_required
    }

    fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction_id
    }

    fn method(&self) -> MethodDescriptor {
        MethodDescriptor::new("TestService", "echo")
    }

    fn build_request(&self, node: &NodeId, header: &RequestHeader) -> Result<Bytes, SdkError> {
        self.headers.lock().push(*header);
        Ok(Bytes::from(format!("{}#{}", node, header.attempt)))
    }

    fn response_status(&self, response: &[u8]) -> Result<i32, SdkError> {
        read_status(response, 0)
    }

    fn map_response(
        &self,
        response: Bytes,
        _node: &NodeId,
        _request: &Bytes,
    ) -> Result<String, SdkError> {
        String::from_utf8(response[4..].to_vec())
            .map_err(|e| SdkError::InvalidResponse(e.to_string()))
    }
}

/// Receipt query for one transaction
pub struct TestReceiptQuery {
    pub transaction_id: TransactionId,
}

impl TestReceiptQuery {
    pub fn new() -> Self {
        Self {
            transaction_id: TransactionId::new(AccountId::from_num(1001), 1_700_000_000, 0),
        }
    }
}

impl RequestAdapter for TestReceiptQuery {
    type Output = TransactionReceipt;

    fn transaction_id(&self) -> Option<TransactionId> {
        Some(self.transaction_id)
    }

    fn method(&self) -> MethodDescriptor {
        MethodDescriptor::new("CryptoService", "getTransactionReceipts")
    }

    fn build_request(&self, _node: &NodeId, _header: &RequestHeader) -> Result<Bytes, SdkError> {
        Ok(Bytes::from(self.transaction_id.to_string()))
    }

    fn response_status(&self, response: &[u8]) -> Result<i32, SdkError> {
        read_status(response, 0)
    }

    fn classify(&self, code: i32, response: &[u8]) -> ExecutionState {
        match read_status(response, 4) {
            Ok(receipt) => classify_receipt(Status(code), Status(receipt)),
            Err(_) => ExecutionState::ServerError,
        }
    }

    fn map_response(
        &self,
        response: Bytes,
        _node: &NodeId,
        _request: &Bytes,
    ) -> Result<TransactionReceipt, SdkError> {
        Ok(TransactionReceipt {
            status: Status(read_status(&response, 4)?),
            transaction_id: self.transaction_id,
            account_id: None,
        })
    }
}
