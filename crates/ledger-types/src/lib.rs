//! # ledger-types
//!
//! Identifier and status types shared by the ledger SDK.
//!
//! Only what the request execution engine needs to name things lives here:
//! account and node ids, transaction ids, the ledger identity used for
//! checksum validation, and the response status code.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod account;
mod error;
mod ledger;
mod status;
mod transaction_id;

pub use account::{AccountId, NodeId};
pub use error::{TypesError, TypesResult};
pub use ledger::LedgerId;
pub use status::Status;
pub use transaction_id::TransactionId;
