//! Ledger (network) identity

use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;

/// Identity of the ledger a client talks to
///
/// Entity checksums are computed against this value, so requests use it to
/// validate embedded ids before they are sent.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum LedgerId {
    /// Production network
    Mainnet,
    /// Public test network
    #[default]
    Testnet,
    /// Preview network
    Previewnet,
    /// Any other ledger, named by its raw id bytes
    Other(Vec<u8>),
}

impl LedgerId {
    /// Raw id bytes as carried on the wire
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            LedgerId::Mainnet => vec![0x00],
            LedgerId::Testnet => vec![0x01],
            LedgerId::Previewnet => vec![0x02],
            LedgerId::Other(bytes) => bytes.clone(),
        }
    }

    /// Build from raw id bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match bytes {
            [0x00] => LedgerId::Mainnet,
            [0x01] => LedgerId::Testnet,
            [0x02] => LedgerId::Previewnet,
            other => LedgerId::Other(other.to_vec()),
        }
    }
}

impl fmt::Display for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerId::Mainnet => f.write_str("mainnet"),
            LedgerId::Testnet => f.write_str("testnet"),
            LedgerId::Previewnet => f.write_str("previewnet"),
            LedgerId::Other(bytes) => write!(f, "{}", hex::encode(bytes)),
        }
    }
}

impl FromStr for LedgerId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(LedgerId::Mainnet),
            "testnet" => Ok(LedgerId::Testnet),
            "previewnet" => Ok(LedgerId::Previewnet),
            other => {
                let bytes = hex::decode(other.strip_prefix("0x").unwrap_or(other))
                    .map_err(|_| TypesError::InvalidLedgerId(s.to_string()))?;
                if bytes.is_empty() {
                    return Err(TypesError::InvalidLedgerId(s.to_string()));
                }
                Ok(LedgerId::from_bytes(&bytes))
            }
        }
    }
}
