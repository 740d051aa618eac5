//! Account identifiers (`shard.realm.num`)

use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;

/// Ledger account identifier
///
/// Nodes are addressed by the account that receives their fees, so the same
/// type doubles as [`NodeId`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AccountId {
    /// Shard number
    pub shard: u64,
    /// Realm number
    pub realm: u64,
    /// Account number
    pub num: u64,
}

/// Identifier of a node in the network
pub type NodeId = AccountId;

impl AccountId {
    /// Create an account id from its three components
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }

    /// Shorthand for `0.0.num`
    pub const fn from_num(num: u64) -> Self {
        Self::new(0, 0, num)
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for AccountId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // A trailing `-checksum` is accepted and dropped; validating it is the
        // caller's job.
        let body = s.split_once('-').map_or(s, |(body, _)| body);

        let mut parts = body.split('.');
        let (Some(shard), Some(realm), Some(num), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TypesError::InvalidEntityId(s.to_string()));
        };

        let parse = |part: &str| {
            part.parse::<u64>()
                .map_err(|_| TypesError::InvalidEntityId(s.to_string()))
        };

        Ok(Self::new(parse(shard)?, parse(realm)?, parse(num)?))
    }
}

impl From<u64> for AccountId {
    fn from(num: u64) -> Self {
        Self::from_num(num)
    }
}

// Serialized as the `shard.realm.num` string
#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    impl Serialize for AccountId {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for AccountId {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(de::Error::custom)
        }
    }
}
