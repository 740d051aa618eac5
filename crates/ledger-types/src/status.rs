//! Response status codes returned by nodes

use std::fmt;

/// Status code carried in a node response header or a receipt
///
/// The code space is open: nodes may answer with codes newer than this
/// table, so the type wraps the raw value instead of being a closed enum.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Status(pub i32);

macro_rules! statuses {
    ($( $(#[$doc:meta])* $name:ident = $code:literal; )*) => {
        impl Status {
            $(
                $(#[$doc])*
                pub const $name: Status = Status($code);
            )*

            /// Every status in the known table
            pub const KNOWN: &'static [Status] = &[$(Status::$name),*];

            /// Symbolic name, if the code is in the known table
            pub fn name(&self) -> Option<&'static str> {
                match self.0 {
                    $($code => Some(stringify!($name)),)*
                    _ => None,
                }
            }
        }
    };
}

statuses! {
    /// The request passed precheck
    OK = 0;
    /// Catch-all for an invalid transaction
    INVALID_TRANSACTION = 1;
    /// Payer account does not exist
    PAYER_ACCOUNT_NOT_FOUND = 2;
    /// Node account in the request does not match the receiving node
    INVALID_NODE_ACCOUNT = 3;
    /// Valid start plus valid duration is in the past
    TRANSACTION_EXPIRED = 4;
    /// Valid start is in the future
    INVALID_TRANSACTION_START = 5;
    /// Valid duration out of range
    INVALID_TRANSACTION_DURATION = 6;
    /// Signature does not verify
    INVALID_SIGNATURE = 7;
    /// Memo exceeds the size limit
    MEMO_TOO_LONG = 8;
    /// Offered fee is too low
    INSUFFICIENT_TX_FEE = 9;
    /// Payer cannot cover the fee
    INSUFFICIENT_PAYER_BALANCE = 10;
    /// Transaction id already seen
    DUPLICATE_TRANSACTION = 11;
    /// Node is throttled
    BUSY = 12;
    /// Operation not supported
    NOT_SUPPORTED = 13;
    /// File id unknown
    INVALID_FILE_ID = 14;
    /// Account id unknown
    INVALID_ACCOUNT_ID = 15;
    /// Contract id unknown
    INVALID_CONTRACT_ID = 16;
    /// Transaction id malformed
    INVALID_TRANSACTION_ID = 17;
    /// Receipt not (yet) available
    RECEIPT_NOT_FOUND = 18;
    /// Record not (yet) available
    RECORD_NOT_FOUND = 19;
    /// Outcome not yet known
    UNKNOWN = 21;
    /// Transaction reached consensus and succeeded
    SUCCESS = 22;
    /// Transaction failed as invalid
    FAIL_INVALID = 23;
    /// Transaction failed paying fees
    FAIL_FEE = 24;
    /// Transaction failed on balance
    FAIL_BALANCE = 25;
    /// Key required but missing
    KEY_REQUIRED = 26;
    /// Payload could not be decoded
    BAD_ENCODING = 27;
    /// Account balance too low for the operation
    INSUFFICIENT_ACCOUNT_BALANCE = 28;
    /// Payer signature does not verify
    INVALID_PAYER_SIGNATURE = 43;
    /// Query header missing
    MISSING_QUERY_HEADER = 36;
    /// Node failed to create the platform transaction
    PLATFORM_TRANSACTION_NOT_CREATED = 49;
    /// Account was deleted
    ACCOUNT_DELETED = 72;
    /// Partial fee schedule upload accepted
    FEE_SCHEDULE_FILE_PART_UPLOADED = 104;
    /// Node platform is not active yet
    PLATFORM_NOT_ACTIVE = 112;
    /// Node hit an unexpected internal failure
    INTERNAL_ERROR = 365;
}

impl Status {
    /// Raw wire code
    pub const fn code(&self) -> i32 {
        self.0
    }

    /// Whether the code is in the known table
    pub fn is_known(&self) -> bool {
        self.name().is_some()
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Status(code)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "UNRECOGNIZED({})", self.0),
        }
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status({})", self)
    }
}
