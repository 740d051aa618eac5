//! Client - entry point for executing requests

use ledger_types::{AccountId, LedgerId, NodeId};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::adapter::RequestAdapter;
use crate::backoff::{BackoffScheduler, RandomSource};
use crate::config::ClientConfig;
use crate::error::SdkError;
use crate::executor::{ExecuteOptions, Executor};
use crate::handle::ExecutionHandle;
use crate::node::Network;
use crate::receipt::TransactionReceipt;
use crate::stats::{ExecutionStats, StatsSnapshot};
use crate::transport::{MockTransport, Transport};

/// Client for submitting requests to a ledger network
///
/// Holds the shared node table, transport and statistics. Cloning is cheap
/// and clones share all of it.
#[derive(Debug, Clone)]
pub struct Client {
    executor: Executor,
}

impl Client {
    /// Start building a client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client from a configuration and a transport
    pub fn from_config(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, SdkError> {
        ClientBuilder::new()
            .config(config)
            .transport(transport)
            .build()
    }

    /// Create a client with mock transport (for testing)
    pub fn new_mock(config: ClientConfig) -> Result<(Self, MockTransport), SdkError> {
        let transport = MockTransport::new();
        let client = Self::from_config(config, Arc::new(transport.clone()))?;
        Ok((client, transport))
    }

    /// Configuration in use
    pub fn config(&self) -> &ClientConfig {
        self.executor.config()
    }

    /// Shared node table
    pub fn network(&self) -> &Arc<Network> {
        self.executor.network()
    }

    /// Current execution statistics
    pub fn stats(&self) -> StatsSnapshot {
        self.executor.stats().snapshot()
    }

    // ==================== Execution ====================

    /// Execute a request and wait for its result
    pub async fn execute<A>(&self, adapter: &A) -> Result<A::Output, SdkError>
    where
        A: RequestAdapter + ?Sized,
    {
        self.execute_with(adapter, ExecuteOptions::default()).await
    }

    /// Execute a request with per-call overrides
    pub async fn execute_with<A>(
        &self,
        adapter: &A,
        options: ExecuteOptions,
    ) -> Result<A::Output, SdkError>
    where
        A: RequestAdapter + ?Sized,
    {
        self.execute_cancellable(adapter, options, &CancellationToken::new())
            .await
    }

    /// Execute a request that stops when `cancel` fires
    pub async fn execute_cancellable<A>(
        &self,
        adapter: &A,
        options: ExecuteOptions,
        cancel: &CancellationToken,
    ) -> Result<A::Output, SdkError>
    where
        A: RequestAdapter + ?Sized,
    {
        self.executor.execute(adapter, &options, cancel).await
    }

    /// Execute a request in the background
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn execute_async<A>(&self, adapter: Arc<A>) -> ExecutionHandle<A::Output>
    where
        A: RequestAdapter + 'static,
    {
        self.execute_async_with(adapter, ExecuteOptions::default())
    }

    /// Execute a request in the background with per-call overrides
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn execute_async_with<A>(
        &self,
        adapter: Arc<A>,
        options: ExecuteOptions,
    ) -> ExecutionHandle<A::Output>
    where
        A: RequestAdapter + 'static,
    {
        let executor = self.executor.clone();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        ExecutionHandle::spawn(cancel, async move {
            executor.execute(adapter.as_ref(), &options, &token).await
        })
    }

    // ==================== Receipts ====================

    /// Poll for a receipt and fail unless it reports success
    pub async fn get_receipt<A>(&self, query: &A) -> Result<TransactionReceipt, SdkError>
    where
        A: RequestAdapter<Output = TransactionReceipt> + ?Sized,
    {
        self.get_receipt_with(query, ExecuteOptions::default()).await
    }

    /// [`Client::get_receipt`] with per-call overrides
    pub async fn get_receipt_with<A>(
        &self,
        query: &A,
        options: ExecuteOptions,
    ) -> Result<TransactionReceipt, SdkError>
    where
        A: RequestAdapter<Output = TransactionReceipt> + ?Sized,
    {
        self.execute_with(query, options)
            .await?
            .validate_status(true)
    }
}

/// Builder for [`Client`]
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    random: Option<Arc<dyn RandomSource>>,
}

impl ClientBuilder {
    /// Builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Transport used to reach nodes
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Add a node to the address book
    pub fn node(mut self, id: NodeId, address: impl Into<String>) -> Self {
        self.config.network.insert(id, address.into());
        self
    }

    /// Ledger to validate checksums against
    pub fn ledger(mut self, ledger: LedgerId) -> Self {
        self.config.ledger = ledger;
        self
    }

    /// Account paying for paid queries
    pub fn operator(mut self, operator: AccountId) -> Self {
        self.config.operator = Some(operator);
        self
    }

    /// Attempt budget; `None` retries until the deadline
    pub fn max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    /// Base retry delay
    pub fn min_backoff(mut self, backoff: Duration) -> Self {
        self.config.min_backoff = backoff;
        self
    }

    /// Ceiling on the retry delay
    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.config.max_backoff = Some(backoff);
        self
    }

    /// Overall deadline per execution
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Timeout for one exchange with a node
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.config.attempt_timeout = timeout;
        self
    }

    /// Bounds of the ban applied to failing nodes
    pub fn node_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.config.min_node_backoff = min;
        self.config.max_node_backoff = max;
        self
    }

    /// Per-call failures tolerated before a node is skipped
    pub fn node_failure_threshold(mut self, threshold: u32) -> Self {
        self.config.node_failure_threshold = threshold;
        self
    }

    /// Jitter source for retry delays
    pub fn random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = Some(random);
        self
    }

    /// Validate the configuration and build the client
    pub fn build(self) -> Result<Client, SdkError> {
        self.config.validate()?;
        let transport = self
            .transport
            .ok_or_else(|| SdkError::Config("no transport configured".into()))?;

        let network = Network::new(
            self.config.network.clone(),
            self.config.min_node_backoff,
            self.config.max_node_backoff,
        );
        let mut backoff =
            BackoffScheduler::new(self.config.min_backoff).with_max(self.config.max_backoff);
        if let Some(random) = self.random {
            backoff = backoff.with_random(random);
        }

        Ok(Client {
            executor: Executor::new(
                Arc::new(self.config),
                Arc::new(network),
                transport,
                backoff,
                Arc::new(ExecutionStats::new()),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_builder_requires_transport() {
        let err = Client::builder().build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_builder_validates_config() {
        let err = Client::builder()
            .transport(Arc::new(MockTransport::new()))
            .max_attempts(Some(0))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_builder_sets_network() {
        let client = Client::builder()
            .transport(Arc::new(MockTransport::new()))
            .node(NodeId::from_num(3), "127.0.0.1:50211")
            .node(NodeId::from_num(4), "127.0.0.1:50212")
            .operator(AccountId::from_num(1001))
            .build()
            .unwrap();

        assert_eq!(client.network().len(), 2);
        assert_eq!(client.config().operator, Some(AccountId::from_num(1001)));
        assert_eq!(client.stats().attempts, 0);
    }

    #[test]
    fn test_new_mock() {
        let (client, transport) = Client::new_mock(ClientConfig::default()).unwrap();
        assert!(client.network().is_empty());
        assert_eq!(transport.call_count(), 0);
    }
}
