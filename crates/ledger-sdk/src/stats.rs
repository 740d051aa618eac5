//! Aggregated execution statistics

use dashmap::DashMap;
use ledger_types::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{ErrorKind, SdkError};
use crate::status::ExecutionState;

/// Latency histogram (milliseconds)
pub struct Histogram {
    /// Upper bucket bounds, inclusive
    bounds: Vec<u64>,
    /// One count per bound plus an overflow bucket
    counts: Vec<AtomicU64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Histogram with default latency buckets
    pub fn new() -> Self {
        Self::with_bounds(vec![1, 5, 10, 25, 50, 100, 250, 500, 1000, 2500, 5000, 10000])
    }

    /// Histogram with custom bounds; they are sorted first
    pub fn with_bounds(mut bounds: Vec<u64>) -> Self {
        bounds.sort_unstable();
        bounds.dedup();
        let counts = (0..=bounds.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record one latency
    pub fn observe(&self, latency: Duration) {
        let ms = latency.as_millis() as u64;
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let bucket = self.bounds.partition_point(|bound| *bound < ms);
        self.counts[bucket].fetch_add(1, Ordering::Relaxed);
    }

    /// Mean latency in milliseconds
    pub fn mean(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.sum.load(Ordering::Relaxed) as f64 / count as f64
    }

    /// Total observations
    pub fn total_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            bounds_ms: self.bounds.clone(),
            counts: self
                .counts
                .iter()
                .map(|c| c.load(Ordering::Relaxed))
                .collect(),
            mean_ms: self.mean(),
            count: self.total_count(),
        }
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct NodeCounters {
    attempts: AtomicU64,
    failures: AtomicU64,
}

/// Counters shared by every execution of a client
#[derive(Default)]
pub struct ExecutionStats {
    attempts: AtomicU64,
    backoff_waits: AtomicU64,
    server_errors: AtomicU64,
    transport_errors: AtomicU64,
    retries: AtomicU64,
    successes: AtomicU64,
    rejections: AtomicU64,
    exhausted: AtomicU64,
    deadline_exceeded: AtomicU64,
    cancelled: AtomicU64,
    other_failures: AtomicU64,
    latency: Histogram,
    nodes: DashMap<NodeId, NodeCounters>,
}

impl ExecutionStats {
    /// Empty statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed attempt
    pub fn record_attempt(&self, node: NodeId, latency: Duration, state: ExecutionState) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        self.latency.observe(latency);

        let entry = self.nodes.entry(node).or_default();
        entry.attempts.fetch_add(1, Ordering::Relaxed);

        match state {
            ExecutionState::ServerError => {
                self.server_errors.fetch_add(1, Ordering::Relaxed);
                entry.failures.fetch_add(1, Ordering::Relaxed);
            }
            ExecutionState::Retry => {
                self.retries.fetch_add(1, Ordering::Relaxed);
            }
            ExecutionState::Success | ExecutionState::RequestError => {}
        }
    }

    /// Record that an attempt failed in the transport
    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a backoff or ban wait
    pub fn record_backoff(&self) {
        self.backoff_waits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how an execution ended
    pub fn record_outcome<T>(&self, result: &Result<T, SdkError>) {
        let counter = match result {
            Ok(_) => &self.successes,
            Err(e) => match e.kind() {
                ErrorKind::RequestRejected => &self.rejections,
                ErrorKind::MaxAttemptsExceeded => &self.exhausted,
                ErrorKind::DeadlineExceeded => &self.deadline_exceeded,
                ErrorKind::Cancelled => &self.cancelled,
                ErrorKind::ReceiptFailure
                | ErrorKind::InvalidResponse
                | ErrorKind::Configuration => &self.other_failures,
            },
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Attempts recorded so far
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let nodes = self
            .nodes
            .iter()
            .map(|entry| {
                (
                    entry.key().to_string(),
                    NodeStatsSnapshot {
                        attempts: load(&entry.value().attempts),
                        failures: load(&entry.value().failures),
                    },
                )
            })
            .collect();

        StatsSnapshot {
            attempts: load(&self.attempts),
            backoff_waits: load(&self.backoff_waits),
            server_errors: load(&self.server_errors),
            transport_errors: load(&self.transport_errors),
            retries: load(&self.retries),
            successes: load(&self.successes),
            rejections: load(&self.rejections),
            exhausted: load(&self.exhausted),
            deadline_exceeded: load(&self.deadline_exceeded),
            cancelled: load(&self.cancelled),
            other_failures: load(&self.other_failures),
            latency: self.latency.snapshot(),
            nodes,
        }
    }
}

/// Serializable histogram summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSnapshot {
    /// Upper bucket bounds in milliseconds
    pub bounds_ms: Vec<u64>,
    /// Counts per bucket; the last entry is the overflow bucket
    pub counts: Vec<u64>,
    /// Mean latency
    pub mean_ms: f64,
    /// Observations
    pub count: u64,
}

/// Per-node counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatsSnapshot {
    /// Attempts sent to the node
    pub attempts: u64,
    /// Attempts classified as server errors
    pub failures: u64,
}

/// Snapshot of [`ExecutionStats`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Attempts made
    pub attempts: u64,
    /// Backoff and ban waits
    pub backoff_waits: u64,
    /// Attempts classified as server errors
    pub server_errors: u64,
    /// Attempts that failed in the transport
    pub transport_errors: u64,
    /// Attempts classified as retry
    pub retries: u64,
    /// Executions that succeeded
    pub successes: u64,
    /// Executions rejected
    pub rejections: u64,
    /// Executions that ran out of attempts
    pub exhausted: u64,
    /// Executions that ran out of time
    pub deadline_exceeded: u64,
    /// Executions cancelled
    pub cancelled: u64,
    /// Executions that failed otherwise
    pub other_failures: u64,
    /// Attempt latency
    pub latency: HistogramSnapshot,
    /// Counters per node, keyed by node id
    pub nodes: BTreeMap<String, NodeStatsSnapshot>,
}

impl StatsSnapshot {
    /// Export snapshot as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
