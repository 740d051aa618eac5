//! Transport layer: sending wire requests to nodes

use async_trait::async_trait;
use bytes::Bytes;
use ledger_types::NodeId;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::adapter::MethodDescriptor;
use crate::node::Node;

/// Failure to complete one exchange with a node
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Node refused the connection
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// Per-attempt timeout elapsed
    #[error("request timed out")]
    Timeout,

    /// Channel exists but the node cannot serve it right now
    #[error("node unavailable: {0}")]
    Unavailable(String),

    /// Any other transport failure
    #[error("transport error: {0}")]
    Other(String),
}

/// Send capability supplied to the engine (object-safe)
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` to `node` and return the raw response
    ///
    /// Implementations should give up after `timeout`.
    async fn send(
        &self,
        node: &Node,
        method: &MethodDescriptor,
        request: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, TransportError>;
}

/// One exchange observed by [`MockTransport`]
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Node the request went to
    pub node: NodeId,
    /// Method invoked
    pub method: MethodDescriptor,
    /// Request bytes
    pub request: Bytes,
    /// Timeout the engine passed
    pub timeout: Duration,
}

type Reply = Result<Bytes, TransportError>;

/// Mock transport for testing
///
/// Replies are scripted per node and consumed in order; once a node's
/// script runs dry the default reply is used.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    scripts: Arc<Mutex<HashMap<NodeId, VecDeque<Reply>>>>,
    default_reply: Arc<Mutex<Option<Reply>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    latency: Arc<Mutex<Option<Duration>>>,
}

impl MockTransport {
    /// Create a new mock transport with no replies
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `node`
    pub fn push_reply(&self, node: NodeId, reply: Result<Bytes, TransportError>) {
        self.scripts.lock().entry(node).or_default().push_back(reply);
    }

    /// Queue several replies for `node`
    pub fn push_replies(
        &self,
        node: NodeId,
        replies: impl IntoIterator<Item = Result<Bytes, TransportError>>,
    ) {
        self.scripts.lock().entry(node).or_default().extend(replies);
    }

    /// Reply used when a node has nothing scripted
    pub fn set_default_reply(&self, reply: Result<Bytes, TransportError>) {
        *self.default_reply.lock() = Some(reply);
    }

    /// Delay every reply by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Exchanges observed so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Number of exchanges observed so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Nodes contacted, in order
    pub fn nodes_called(&self) -> Vec<NodeId> {
        self.calls.lock().iter().map(|call| call.node).collect()
    }

    /// Forget scripts, default reply and call log
    pub fn clear(&self) {
        self.scripts.lock().clear();
        *self.default_reply.lock() = None;
        self.calls.lock().clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        node: &Node,
        method: &MethodDescriptor,
        request: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, TransportError> {
        self.calls.lock().push(RecordedCall {
            node: node.id(),
            method: method.clone(),
            request,
            timeout,
        });

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            if latency > timeout {
                tokio::time::sleep(timeout).await;
                return Err(TransportError::Timeout);
            }
            tokio::time::sleep(latency).await;
        }

        let scripted = self
            .scripts
            .lock()
            .get_mut(&node.id())
            .and_then(|script| script.pop_front());
        if let Some(reply) = scripted {
            return reply;
        }

        self.default_reply.lock().clone().unwrap_or_else(|| {
            Err(TransportError::Unavailable(format!(
                "no reply scripted for node {}",
                node.id()
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method() -> MethodDescriptor {
        MethodDescriptor::new("CryptoService", "getAccountBalance")
    }

    #[tokio::test]
    async fn test_mock_transport_scripted_replies_in_order() {
        let transport = MockTransport::new();
        let node = Node::new(NodeId::from_num(3), "127.0.0.1:50211");
        transport.push_replies(
            node.id(),
            vec![
                Err(TransportError::ConnectionRefused("down".into())),
                Ok(Bytes::from_static(b"ok")),
            ],
        );

        let timeout = Duration::from_secs(1);
        let first = transport
            .send(&node, &method(), Bytes::from_static(b"a"), timeout)
            .await;
        assert!(matches!(first, Err(TransportError::ConnectionRefused(_))));

        let second = transport
            .send(&node, &method(), Bytes::from_static(b"b"), timeout)
            .await
            .unwrap();
        assert_eq!(second, Bytes::from_static(b"ok"));

        assert_eq!(transport.call_count(), 2);
        assert_eq!(transport.calls()[1].request, Bytes::from_static(b"b"));
    }

    #[tokio::test]
    async fn test_mock_transport_default_reply() {
        let transport = MockTransport::new();
        let node = Node::new(NodeId::from_num(4), "127.0.0.1:50212");

        let missing = transport
            .send(&node, &method(), Bytes::new(), Duration::from_secs(1))
            .await;
        assert!(matches!(missing, Err(TransportError::Unavailable(_))));

        transport.set_default_reply(Ok(Bytes::from_static(b"default")));
        let reply = transport
            .send(&node, &method(), Bytes::new(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply, Bytes::from_static(b"default"));
        assert_eq!(transport.nodes_called(), vec![node.id(), node.id()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_transport_latency_past_timeout() {
        let transport = MockTransport::new();
        let node = Node::new(NodeId::from_num(5), "127.0.0.1:50213");
        transport.set_default_reply(Ok(Bytes::new()));
        transport.set_latency(Duration::from_secs(30));

        let reply = transport
            .send(&node, &method(), Bytes::new(), Duration::from_secs(2))
            .await;
        assert_eq!(reply, Err(TransportError::Timeout));
    }

    #[tokio::test]
    async fn test_mock_transport_clear() {
        let transport = MockTransport::new();
        let node = Node::new(NodeId::from_num(3), "127.0.0.1:50211");
        transport.set_default_reply(Ok(Bytes::new()));
        let _ = transport
            .send(&node, &method(), Bytes::new(), Duration::from_secs(1))
            .await;

        transport.clear();
        assert_eq!(transport.call_count(), 0);
    }
}
