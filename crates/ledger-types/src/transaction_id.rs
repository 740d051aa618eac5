//! Transaction identifiers (`payer@seconds.nanos`)

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::account::AccountId;
use crate::error::TypesError;

/// Identifier of a submitted transaction
///
/// A transaction is named by the paying account and the instant from which
/// it becomes valid.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TransactionId {
    /// Paying account
    pub account_id: AccountId,
    /// Seconds part of the valid-start timestamp
    pub valid_start_seconds: i64,
    /// Nanoseconds part of the valid-start timestamp
    pub valid_start_nanos: u32,
}

impl TransactionId {
    /// Create a transaction id with an explicit valid-start timestamp
    pub const fn new(account_id: AccountId, valid_start_seconds: i64, valid_start_nanos: u32) -> Self {
        Self {
            account_id,
            valid_start_seconds,
            valid_start_nanos,
        }
    }

    /// Generate a transaction id valid from now
    pub fn generate(account_id: AccountId) -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self::new(
            account_id,
            since_epoch.as_secs() as i64,
            since_epoch.subsec_nanos(),
        )
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}.{:09}",
            self.account_id, self.valid_start_seconds, self.valid_start_nanos
        )
    }
}

impl FromStr for TransactionId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypesError::InvalidTransactionId(s.to_string());

        let (account, timestamp) = s.split_once('@').ok_or_else(invalid)?;
        let (seconds, nanos) = timestamp.split_once('.').ok_or_else(invalid)?;

        let account_id = account.parse::<AccountId>().map_err(|_| invalid())?;
        let seconds = seconds.parse::<i64>().map_err(|_| invalid())?;
        let nanos = nanos.parse::<u32>().map_err(|_| invalid())?;
        if nanos >= 1_000_000_000 {
            return Err(invalid());
        }

        Ok(Self::new(account_id, seconds, nanos))
    }
}
