//! Nodes, shared node health and per-call node selection

use ledger_types::NodeId;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::SdkError;
use crate::status::ExecutionState;

/// Default initial ban applied to a failing node
pub const DEFAULT_MIN_NODE_BACKOFF: Duration = Duration::from_secs(8);
/// Default ceiling for a node ban
pub const DEFAULT_MAX_NODE_BACKOFF: Duration = Duration::from_secs(60 * 60);

/// Health record shared by every call that uses a node
///
/// All fields are atomics so concurrent calls update them without locking.
/// Concurrent calls only ever add to the failure count; it goes back to
/// zero through [`NodeHealth::reset`] alone.
/// Timestamps are milliseconds since `epoch`; `last_used_ms` stores `ms + 1`
/// so zero means "never".
pub struct NodeHealth {
    epoch: Instant,
    consecutive_failures: AtomicU32,
    last_used_ms: AtomicU64,
    banned_until_ms: AtomicU64,
    current_backoff_ms: AtomicU64,
    min_backoff_ms: u64,
    max_backoff_ms: u64,
}

impl NodeHealth {
    /// Fresh record with the given node backoff bounds
    pub fn new(min_backoff: Duration, max_backoff: Duration) -> Self {
        let min_backoff_ms = min_backoff.as_millis() as u64;
        Self {
            epoch: Instant::now(),
            consecutive_failures: AtomicU32::new(0),
            last_used_ms: AtomicU64::new(0),
            banned_until_ms: AtomicU64::new(0),
            current_backoff_ms: AtomicU64::new(min_backoff_ms),
            min_backoff_ms,
            max_backoff_ms: (max_backoff.as_millis() as u64).max(min_backoff_ms),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Whether the node is outside any ban
    pub fn is_healthy(&self) -> bool {
        self.remaining_ban().is_zero()
    }

    /// Time left until the node is readmitted
    pub fn remaining_ban(&self) -> Duration {
        let until = self.banned_until_ms.load(Ordering::Acquire);
        Duration::from_millis(until.saturating_sub(self.now_ms()))
    }

    /// Failures since the node was last reset
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Ban length the next failure will apply
    pub fn current_backoff(&self) -> Duration {
        Duration::from_millis(self.current_backoff_ms.load(Ordering::Relaxed))
    }

    /// When the node last completed an attempt
    pub fn last_used(&self) -> Option<Instant> {
        match self.last_used_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(self.epoch + Duration::from_millis(ms - 1)),
        }
    }

    /// Record that an attempt against the node just completed
    pub fn touch(&self) {
        self.last_used_ms.store(self.now_ms() + 1, Ordering::Relaxed);
    }

    /// Ban the node for its current backoff, then double the backoff
    pub fn record_failure(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);

        let max = self.max_backoff_ms;
        let previous = self
            .current_backoff_ms
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_mul(2).min(max))
            })
            .unwrap_or(max);

        self.banned_until_ms
            .fetch_max(self.now_ms() + previous, Ordering::AcqRel);
    }

    /// The node answered, successfully or not; halve its backoff toward the
    /// minimum
    pub fn record_answer(&self) {
        let min = self.min_backoff_ms;
        let _ = self
            .current_backoff_ms
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some((current / 2).max(min))
            });
    }

    /// Readmit immediately and forget past failures
    pub fn reset(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.banned_until_ms.store(0, Ordering::Release);
        self.current_backoff_ms
            .store(self.min_backoff_ms, Ordering::Relaxed);
    }
}

impl fmt::Debug for NodeHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHealth")
            .field("consecutive_failures", &self.consecutive_failures())
            .field("remaining_ban", &self.remaining_ban())
            .field("current_backoff", &self.current_backoff())
            .finish()
    }
}

/// A node of the target network
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    address: String,
    health: NodeHealth,
}

impl Node {
    /// Create a node with default ban bounds
    pub fn new(id: NodeId, address: impl Into<String>) -> Self {
        Self::with_backoff(id, address, DEFAULT_MIN_NODE_BACKOFF, DEFAULT_MAX_NODE_BACKOFF)
    }

    /// Create a node with explicit ban bounds
    pub fn with_backoff(
        id: NodeId,
        address: impl Into<String>,
        min_backoff: Duration,
        max_backoff: Duration,
    ) -> Self {
        Self {
            id,
            address: address.into(),
            health: NodeHealth::new(min_backoff, max_backoff),
        }
    }

    /// Node id
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Transport address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Shared health record
    pub fn health(&self) -> &NodeHealth {
        &self.health
    }
}

/// The shared node table
///
/// Read-mostly: the list is only replaced on address book updates, while
/// health changes go through each node's atomics.
pub struct Network {
    nodes: RwLock<Vec<Arc<Node>>>,
    rotation: AtomicUsize,
    min_node_backoff: Duration,
    max_node_backoff: Duration,
}

impl Network {
    /// Build a network from `(id, address)` entries
    pub fn new(
        entries: impl IntoIterator<Item = (NodeId, String)>,
        min_node_backoff: Duration,
        max_node_backoff: Duration,
    ) -> Self {
        let network = Self {
            nodes: RwLock::new(Vec::new()),
            rotation: AtomicUsize::new(0),
            min_node_backoff,
            max_node_backoff,
        };
        network.set_nodes(entries);
        network
    }

    /// Replace the address book
    ///
    /// Nodes whose id and address are unchanged keep their health record.
    pub fn set_nodes(&self, entries: impl IntoIterator<Item = (NodeId, String)>) {
        let mut entries: Vec<_> = entries.into_iter().collect();
        entries.sort_by_key(|(id, _)| *id);
        entries.dedup_by_key(|(id, _)| *id);

        let mut nodes = self.nodes.write();
        let updated = entries
            .into_iter()
            .map(|(id, address)| {
                nodes
                    .iter()
                    .find(|node| node.id == id && node.address == address)
                    .cloned()
                    .unwrap_or_else(|| {
                        Arc::new(Node::with_backoff(
                            id,
                            address,
                            self.min_node_backoff,
                            self.max_node_backoff,
                        ))
                    })
            })
            .collect();
        *nodes = updated;
    }

    /// Snapshot of all nodes, ordered by id
    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.read().clone()
    }

    /// Look up a node by id
    pub fn node(&self, id: &NodeId) -> Option<Arc<Node>> {
        self.nodes.read().iter().find(|node| node.id == *id).cloned()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Whether the network has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Readmit one node; returns false if it is unknown
    pub fn reset_node(&self, id: &NodeId) -> bool {
        match self.node(id) {
            Some(node) => {
                node.health.reset();
                true
            }
            None => false,
        }
    }

    /// Readmit every node
    pub fn reset_all(&self) {
        for node in self.nodes.read().iter() {
            node.health.reset();
        }
    }

    /// Rotation start for the next call, handed out round-robin
    pub fn next_rotation_start(&self) -> usize {
        self.rotation.fetch_add(1, Ordering::Relaxed)
    }

    /// Nodes a call may use
    ///
    /// With an explicit list, every id must exist and the caller's order is
    /// kept; otherwise all nodes are eligible.
    pub fn eligible(&self, requested: Option<&[NodeId]>) -> Result<Vec<Arc<Node>>, SdkError> {
        let nodes = match requested {
            Some(ids) => ids
                .iter()
                .map(|id| {
                    self.node(id).ok_or_else(|| {
                        SdkError::InvalidRequest(format!("node {} is not in the network", id))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => self.nodes(),
        };

        if nodes.is_empty() {
            return Err(SdkError::InvalidRequest("no nodes to send the request to".into()));
        }
        Ok(nodes)
    }
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<NodeId> = self.nodes.read().iter().map(|node| node.id).collect();
        f.debug_struct("Network").field("nodes", &ids).finish()
    }
}

/// Node chosen for the next attempt
#[derive(Debug, Clone)]
pub struct Selection {
    /// The node
    pub node: Arc<Node>,
    /// Ban still left on the node; nonzero only when every candidate is
    /// banned and the soonest readmitted one was taken anyway
    pub remaining_ban: Duration,
}

/// Per-call rotation over the eligible nodes
///
/// Owned by one execution; its failure counts never leave the call. Shared
/// effects go to each node's [`NodeHealth`].
#[derive(Debug)]
pub struct NodeSelector {
    nodes: Vec<Arc<Node>>,
    failures: Vec<u32>,
    cursor: usize,
    threshold: u32,
}

impl NodeSelector {
    /// Selector starting at `start` (taken modulo the node count)
    ///
    /// A node is excluded once its failures in this call exceed `threshold`.
    pub fn new(nodes: Vec<Arc<Node>>, start: usize, threshold: u32) -> Self {
        let cursor = if nodes.is_empty() { 0 } else { start % nodes.len() };
        Self {
            failures: vec![0; nodes.len()],
            nodes,
            cursor,
            threshold,
        }
    }

    /// Number of eligible nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether there is nothing to select from
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Failures recorded for `id` in this call
    pub fn failures(&self, id: &NodeId) -> u32 {
        self.index_of(id).map_or(0, |i| self.failures[i])
    }

    /// Whether `id` is excluded for the rest of this call
    pub fn is_excluded(&self, id: &NodeId) -> bool {
        self.index_of(id).is_some_and(|i| self.excluded(i))
    }

    fn excluded(&self, index: usize) -> bool {
        self.failures[index] > self.threshold
    }

    fn index_of(&self, id: &NodeId) -> Option<usize> {
        self.nodes.iter().position(|node| node.id == *id)
    }

    fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.nodes.len();
    }

    /// Choose the node for the next attempt
    ///
    /// Walks the rotation from the cursor and takes the first node that is
    /// neither excluded nor banned. If all remaining nodes are banned, the
    /// one readmitted soonest is returned right away; bans only order the
    /// candidates and never hold up the call. If every node is excluded,
    /// the least-failed one is used.
    pub fn pick(&mut self) -> Option<Selection> {
        let len = self.nodes.len();
        if len == 0 {
            return None;
        }

        let mut soonest: Option<(usize, Duration)> = None;
        for step in 0..len {
            let i = (self.cursor + step) % len;
            if self.excluded(i) {
                continue;
            }
            let remaining = self.nodes[i].health.remaining_ban();
            if remaining.is_zero() {
                self.cursor = i;
                return Some(Selection {
                    node: Arc::clone(&self.nodes[i]),
                    remaining_ban: Duration::ZERO,
                });
            }
            if soonest.map_or(true, |(_, best)| remaining < best) {
                soonest = Some((i, remaining));
            }
        }

        let (i, remaining_ban) = match soonest {
            Some(found) => found,
            None => {
                let i = (0..len)
                    .map(|step| (self.cursor + step) % len)
                    .min_by_key(|&i| self.failures[i])
                    .unwrap_or(self.cursor);
                (i, self.nodes[i].health.remaining_ban())
            }
        };

        self.cursor = i;
        Some(Selection {
            node: Arc::clone(&self.nodes[i]),
            remaining_ban,
        })
    }

    /// Record how an attempt against `id` was classified
    pub fn report_outcome(&mut self, id: &NodeId, state: ExecutionState) {
        let Some(i) = self.index_of(id) else {
            return;
        };
        let node = Arc::clone(&self.nodes[i]);

        match state {
            ExecutionState::ServerError => {
                self.failures[i] = self.failures[i].saturating_add(1);
                node.health.record_failure();
                if i == self.cursor {
                    self.advance();
                }
            }
            ExecutionState::Retry => {
                node.health.record_answer();
                if self.failures[i] > 0 && i == self.cursor {
                    self.advance();
                }
            }
            ExecutionState::Success => node.health.record_answer(),
            ExecutionState::RequestError => return,
        }
        node.health.touch();
    }
}
