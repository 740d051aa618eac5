//! Client configuration

use ledger_types::{AccountId, LedgerId, NodeId, TypesError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::backoff::DEFAULT_BASE_BACKOFF;
use crate::error::SdkError;
use crate::node::{DEFAULT_MAX_NODE_BACKOFF, DEFAULT_MIN_NODE_BACKOFF};

/// Default attempt budget per execution
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Default overall timeout per execution
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
/// Default timeout for one exchange with a node
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default per-call failures a node may have before it is skipped
pub const DEFAULT_NODE_FAILURE_THRESHOLD: u32 = 1;

/// Settings shared by every execution of a client
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Address book: node id to transport address
    pub network: BTreeMap<NodeId, String>,
    /// Ledger entity checksums are validated against
    pub ledger: LedgerId,
    /// Account paying for paid queries
    pub operator: Option<AccountId>,
    /// Attempts per execution; `None` retries until the deadline
    pub max_attempts: Option<u32>,
    /// Base retry delay
    pub min_backoff: Duration,
    /// Optional ceiling on the retry delay
    pub max_backoff: Option<Duration>,
    /// Overall deadline per execution
    pub request_timeout: Duration,
    /// Timeout for one exchange
    pub attempt_timeout: Duration,
    /// First ban applied to a failing node
    pub min_node_backoff: Duration,
    /// Longest ban applied to a failing node
    pub max_node_backoff: Duration,
    /// Per-call failures tolerated before a node is skipped
    pub node_failure_threshold: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: BTreeMap::new(),
            ledger: LedgerId::default(),
            operator: None,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            min_backoff: DEFAULT_BASE_BACKOFF,
            max_backoff: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            min_node_backoff: DEFAULT_MIN_NODE_BACKOFF,
            max_node_backoff: DEFAULT_MAX_NODE_BACKOFF,
            node_failure_threshold: DEFAULT_NODE_FAILURE_THRESHOLD,
        }
    }
}

impl ClientConfig {
    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), SdkError> {
        if self.max_attempts == Some(0) {
            return Err(SdkError::Config("max_attempts must be at least 1".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(SdkError::Config("request_timeout must be positive".into()));
        }
        if self.attempt_timeout.is_zero() {
            return Err(SdkError::Config("attempt_timeout must be positive".into()));
        }
        if let Some(max) = self.max_backoff {
            if max < self.min_backoff {
                return Err(SdkError::Config(format!(
                    "max_backoff {:?} is below min_backoff {:?}",
                    max, self.min_backoff
                )));
            }
        }
        if self.max_node_backoff < self.min_node_backoff {
            return Err(SdkError::Config(format!(
                "max_node_backoff {:?} is below min_node_backoff {:?}",
                self.max_node_backoff, self.min_node_backoff
            )));
        }
        Ok(())
    }

    /// Load from JSON
    ///
    /// Durations are given in milliseconds. Missing fields take their
    /// defaults; `"max_attempts": null` means no attempt limit.
    pub fn from_json(json: &str) -> Result<Self, SdkError> {
        let file: ConfigFile = serde_json::from_str(json)?;
        let config = file.into_config()?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to the JSON layout [`ClientConfig::from_json`] reads
    pub fn to_json(&self) -> Result<String, SdkError> {
        Ok(serde_json::to_string_pretty(&ConfigFile::from(self))?)
    }
}

/// On-disk layout of [`ClientConfig`]
#[derive(Debug, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    network: BTreeMap<NodeId, String>,
    #[serde(default)]
    ledger: Option<String>,
    #[serde(default)]
    operator: Option<AccountId>,
    #[serde(default = "default_max_attempts")]
    max_attempts: Option<u32>,
    #[serde(default = "default_min_backoff_ms")]
    min_backoff_ms: u64,
    #[serde(default)]
    max_backoff_ms: Option<u64>,
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,
    #[serde(default = "default_attempt_timeout_ms")]
    attempt_timeout_ms: u64,
    #[serde(default = "default_min_node_backoff_ms")]
    min_node_backoff_ms: u64,
    #[serde(default = "default_max_node_backoff_ms")]
    max_node_backoff_ms: u64,
    #[serde(default = "default_node_failure_threshold")]
    node_failure_threshold: u32,
}

fn default_max_attempts() -> Option<u32> {
    Some(DEFAULT_MAX_ATTEMPTS)
}

fn default_min_backoff_ms() -> u64 {
    DEFAULT_BASE_BACKOFF.as_millis() as u64
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_millis() as u64
}

fn default_attempt_timeout_ms() -> u64 {
    DEFAULT_ATTEMPT_TIMEOUT.as_millis() as u64
}

fn default_min_node_backoff_ms() -> u64 {
    DEFAULT_MIN_NODE_BACKOFF.as_millis() as u64
}

fn default_max_node_backoff_ms() -> u64 {
    DEFAULT_MAX_NODE_BACKOFF.as_millis() as u64
}

fn default_node_failure_threshold() -> u32 {
    DEFAULT_NODE_FAILURE_THRESHOLD
}

impl ConfigFile {
    fn into_config(self) -> Result<ClientConfig, SdkError> {
        let ledger = match self.ledger {
            Some(ledger) => ledger
                .parse()
                .map_err(|e: TypesError| SdkError::Config(e.to_string()))?,
            None => LedgerId::default(),
        };

        Ok(ClientConfig {
            network: self.network,
            ledger,
            operator: self.operator,
            max_attempts: self.max_attempts,
            min_backoff: Duration::from_millis(self.min_backoff_ms),
            max_backoff: self.max_backoff_ms.map(Duration::from_millis),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
            min_node_backoff: Duration::from_millis(self.min_node_backoff_ms),
            max_node_backoff: Duration::from_millis(self.max_node_backoff_ms),
            node_failure_threshold: self.node_failure_threshold,
        })
    }
}

impl From<&ClientConfig> for ConfigFile {
    fn from(config: &ClientConfig) -> Self {
        let ms = |d: Duration| d.as_millis() as u64;
        Self {
            network: config.network.clone(),
            ledger: Some(config.ledger.to_string()),
            operator: config.operator,
            max_attempts: config.max_attempts,
            min_backoff_ms: ms(config.min_backoff),
            max_backoff_ms: config.max_backoff.map(ms),
            request_timeout_ms: ms(config.request_timeout),
            attempt_timeout_ms: ms(config.attempt_timeout),
            min_node_backoff_ms: ms(config.min_node_backoff),
            max_node_backoff_ms: ms(config.max_node_backoff),
            node_failure_threshold: config.node_failure_threshold,
        }
    }
}
