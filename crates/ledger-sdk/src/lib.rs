//! # ledger-sdk
//!
//! Request execution engine for a node-based ledger network.
//!
//! ## Features
//!
//! - **Client**: shared network, transport, configuration and statistics
//! - **Executor**: one retry loop for every request type, driven through
//!   the [`RequestAdapter`] trait
//! - **Node rotation**: round-robin start, per-call exclusion of failing
//!   nodes, shared node bans with exponential backoff
//! - **Backoff**: jittered exponential delays with an injectable random source
//! - **ExecutionHandle**: await, block on, or attach callbacks to a
//!   background execution, and cancel it at any time
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use ledger_sdk::{
//!     Client, ClientConfig, MethodDescriptor, RequestAdapter, RequestHeader, SdkError,
//! };
//! use ledger_types::NodeId;
//!
//! struct Ping;
//!
//! impl RequestAdapter for Ping {
//!     type Output = ();
//!
//!     fn method(&self) -> MethodDescriptor {
//!         MethodDescriptor::new("NetworkService", "ping")
//!     }
//!
//!     fn build_request(&self, _: &NodeId, _: &RequestHeader) -> Result<Bytes, SdkError> {
//!         Ok(Bytes::new())
//!     }
//!
//!     fn response_status(&self, response: &[u8]) -> Result<i32, SdkError> {
//!         response
//!             .first()
//!             .map(|b| *b as i32)
//!             .ok_or_else(|| SdkError::InvalidResponse("empty response".into()))
//!     }
//!
//!     fn map_response(&self, _: Bytes, _: &NodeId, _: &Bytes) -> Result<(), SdkError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (client, transport) = Client::new_mock(ClientConfig::default())?;
//!     client
//!         .network()
//!         .set_nodes(vec![(NodeId::from_num(3), "127.0.0.1:50211".to_string())]);
//!     transport.set_default_reply(Ok(Bytes::from_static(&[0])));
//!
//!     client.execute(&Ping).await?;
//!     println!("{:?}", client.stats());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod adapter;
mod backoff;
mod client;
mod config;
mod error;
mod executor;
mod handle;
mod node;
mod receipt;
mod stats;
mod status;
mod transport;

pub use adapter::{MethodDescriptor, Payment, RequestAdapter, RequestHeader};
pub use backoff::{
    BackoffScheduler, RandomSource, SeededRandom, ThreadRandom, WaitOutcome, DEFAULT_BASE_BACKOFF,
};
pub use client::{Client, ClientBuilder};
pub use config::{
    ClientConfig, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_MAX_ATTEMPTS, DEFAULT_NODE_FAILURE_THRESHOLD,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use error::{AttemptError, ErrorKind, SdkError};
pub use executor::{ExecuteOptions, Executor, Phase};
pub use handle::{Canceller, ExecutionHandle};
pub use node::{
    Network, Node, NodeHealth, NodeSelector, Selection, DEFAULT_MAX_NODE_BACKOFF,
    DEFAULT_MIN_NODE_BACKOFF,
};
pub use receipt::{classify_receipt, TransactionReceipt, TransactionResponse};
pub use stats::{ExecutionStats, Histogram, HistogramSnapshot, NodeStatsSnapshot, StatsSnapshot};
pub use status::{classify, classify_status, ExecutionState};
pub use transport::{MockTransport, RecordedCall, Transport, TransportError};

/// Re-exported so callers can hold a cancellation token for
/// [`Client::execute_cancellable`]
pub use tokio_util::sync::CancellationToken;
