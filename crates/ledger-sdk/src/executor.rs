//! The request execution engine
//!
//! One [`Executor`] drives every request type. A call runs through
//! `Building -> Sending -> Classifying` once per attempt and ends in
//! `Succeeded` or `Failed`, retrying in between on transient outcomes.
//!
//! Everything request-specific lives behind [`RequestAdapter`]; the loop
//! here only knows about nodes, statuses, budgets and time.

use bytes::Bytes;
use ledger_types::{AccountId, NodeId, Status};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::adapter::{MethodDescriptor, Payment, RequestAdapter, RequestHeader};
use crate::backoff::{BackoffScheduler, WaitOutcome};
use crate::config::ClientConfig;
use crate::error::{AttemptError, ErrorKind, SdkError};
use crate::node::{Network, Node, NodeSelector};
use crate::stats::ExecutionStats;
use crate::status::ExecutionState;
use crate::transport::{Transport, TransportError};

/// Per-call overrides of the client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Overall deadline for this call
    pub timeout: Option<Duration>,
    /// Attempt budget for this call
    pub max_attempts: Option<u32>,
    /// Restrict the call to these nodes, tried in this order
    pub node_ids: Option<Vec<NodeId>>,
}

impl ExecuteOptions {
    /// No overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the overall deadline
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the attempt budget
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Restrict the call to the given nodes
    pub fn node_ids(mut self, node_ids: impl Into<Vec<NodeId>>) -> Self {
        self.node_ids = Some(node_ids.into());
        self
    }
}

/// Where an execution currently is, for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Serializing the request
    Building,
    /// Waiting on the transport
    Sending,
    /// Interpreting the response
    Classifying,
    /// Backing off before the next attempt
    Retrying,
    /// Finished with a result
    Succeeded,
    /// Finished with an error
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Building => "building",
            Phase::Sending => "sending",
            Phase::Classifying => "classifying",
            Phase::Retrying => "retrying",
            Phase::Succeeded => "succeeded",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One try against one node
struct Attempt {
    node: NodeId,
    index: u32,
    request: Bytes,
    outcome: Result<Bytes, TransportError>,
    started: Instant,
    finished: Instant,
}

impl Attempt {
    fn latency(&self) -> Duration {
        self.finished.saturating_duration_since(self.started)
    }
}

/// What an attempt's response means
enum Verdict {
    Success(Bytes),
    Rejected(Status),
    Failed {
        state: ExecutionState,
        error: AttemptError,
    },
}

impl Verdict {
    fn state(&self) -> ExecutionState {
        match self {
            Verdict::Success(_) => ExecutionState::Success,
            Verdict::Rejected(_) => ExecutionState::RequestError,
            Verdict::Failed { state, .. } => *state,
        }
    }
}

/// Mutable state of one top-level call
struct ExecutionContext {
    selector: NodeSelector,
    max_attempts: Option<u32>,
    deadline: Instant,
    attempt: u32,
    last: Option<AttemptError>,
}

impl ExecutionContext {
    fn budget_exhausted(&self) -> bool {
        self.max_attempts.is_some_and(|max| self.attempt >= max)
    }

    fn deadline_passed(&self) -> bool {
        Instant::now() >= self.deadline
    }

    fn exhausted(&mut self) -> SdkError {
        SdkError::MaxAttemptsExceeded {
            attempts: self.attempt,
            last: self.last.take().map(Box::new),
        }
    }

    fn timed_out(&mut self) -> SdkError {
        SdkError::DeadlineExceeded {
            last: self.last.take().map(Box::new),
        }
    }
}

/// Drives requests against the network
///
/// Cheap to clone; every clone shares the same network, transport and
/// statistics.
#[derive(Clone)]
pub struct Executor {
    config: Arc<ClientConfig>,
    network: Arc<Network>,
    transport: Arc<dyn Transport>,
    backoff: BackoffScheduler,
    stats: Arc<ExecutionStats>,
}

impl Executor {
    /// Create an executor
    pub fn new(
        config: Arc<ClientConfig>,
        network: Arc<Network>,
        transport: Arc<dyn Transport>,
        backoff: BackoffScheduler,
        stats: Arc<ExecutionStats>,
    ) -> Self {
        Self {
            config,
            network,
            transport,
            backoff,
            stats,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Shared node table
    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    /// Shared statistics
    pub fn stats(&self) -> &Arc<ExecutionStats> {
        &self.stats
    }

    /// Run `adapter` to a terminal result
    pub async fn execute<A>(
        &self,
        adapter: &A,
        options: &ExecuteOptions,
        cancel: &CancellationToken,
    ) -> Result<A::Output, SdkError>
    where
        A: RequestAdapter + ?Sized,
    {
        let method = adapter.method();
        let result = self.run(adapter, options, cancel).await;
        self.stats.record_outcome(&result);

        match &result {
            Ok(_) => debug!(phase = %Phase::Succeeded, method = %method, "execution finished"),
            Err(e) if e.kind() == ErrorKind::Cancelled => {
                debug!(phase = %Phase::Failed, method = %method, "execution cancelled")
            }
            Err(e) => warn!(phase = %Phase::Failed, method = %method, error = %e, "execution failed"),
        }
        result
    }

    fn payer<A>(&self, adapter: &A) -> Result<Option<AccountId>, SdkError>
    where
        A: RequestAdapter + ?Sized,
    {
        if !adapter.is_payment_required() {
            return Ok(None);
        }
        self.config.operator.map(Some).ok_or_else(|| {
            SdkError::InvalidRequest("request requires payment but no operator is configured".into())
        })
    }

    async fn run<A>(
        &self,
        adapter: &A,
        options: &ExecuteOptions,
        cancel: &CancellationToken,
    ) -> Result<A::Output, SdkError>
    where
        A: RequestAdapter + ?Sized,
    {
        adapter.validate_checksums(&self.config.ledger)?;
        let nodes = self.network.eligible(options.node_ids.as_deref())?;
        let payer = self.payer(adapter)?;
        let transaction_id = adapter.transaction_id();
        let method = adapter.method();

        let timeout = options.timeout.unwrap_or(self.config.request_timeout);
        let mut ctx = ExecutionContext {
            selector: NodeSelector::new(
                nodes,
                self.network.next_rotation_start(),
                self.config.node_failure_threshold,
            ),
            max_attempts: options.max_attempts.or(self.config.max_attempts),
            deadline: Instant::now() + timeout,
            attempt: 0,
            last: None,
        };

        loop {
            if cancel.is_cancelled() {
                return Err(SdkError::Cancelled);
            }
            if ctx.budget_exhausted() {
                return Err(ctx.exhausted());
            }
            if ctx.deadline_passed() {
                return Err(ctx.timed_out());
            }

            let selection = ctx
                .selector
                .pick()
                .ok_or_else(|| SdkError::InvalidRequest("no nodes to send the request to".into()))?;
            if !selection.remaining_ban.is_zero() {
                debug!(
                    node = %selection.node.id(),
                    remaining_ban = ?selection.remaining_ban,
                    "every candidate node is banned, using the soonest readmitted"
                );
            }

            let node = selection.node;
            let node_id = node.id();
            let header = RequestHeader {
                node: node_id,
                attempt: ctx.attempt,
                payment: payer.map(|payer| Payment {
                    payer,
                    node: node_id,
                }),
            };

            trace!(phase = %Phase::Building, node = %node_id, attempt = ctx.attempt);
            let request = adapter.build_request(&node_id, &header)?;

            let attempt = match self.send(&node, &method, request, &ctx, cancel).await {
                Some(attempt) => attempt,
                None if cancel.is_cancelled() => return Err(SdkError::Cancelled),
                None => return Err(ctx.timed_out()),
            };

            trace!(phase = %Phase::Classifying, node = %node_id, attempt = attempt.index);
            let latency = attempt.latency();
            let verdict = self.interpret(adapter, attempt.node, attempt.outcome);
            let state = verdict.state();
            self.stats.record_attempt(node_id, latency, state);
            ctx.selector.report_outcome(&node_id, state);

            match verdict {
                Verdict::Success(response) => {
                    return adapter.map_response(response, &node_id, &attempt.request);
                }
                Verdict::Rejected(status) => {
                    return Err(SdkError::Precheck {
                        status,
                        node: node_id,
                        transaction_id,
                    });
                }
                Verdict::Failed { state, error } => {
                    debug!(
                        node = %node_id,
                        attempt = ctx.attempt,
                        state = ?state,
                        error = %error,
                        "attempt failed"
                    );
                    ctx.last = Some(error);
                }
            }

            let delay = self.backoff.delay_for(ctx.attempt);
            ctx.attempt += 1;
            if ctx.budget_exhausted() {
                continue;
            }

            trace!(phase = %Phase::Retrying, delay = ?delay, attempt = ctx.attempt);
            self.stats.record_backoff();
            match self.backoff.wait(delay, cancel, ctx.deadline).await {
                WaitOutcome::Elapsed => {}
                WaitOutcome::Cancelled => return Err(SdkError::Cancelled),
                WaitOutcome::DeadlineReached => return Err(ctx.timed_out()),
            }
        }
    }

    /// Send one request; `None` when cancelled or the deadline fired first
    async fn send(
        &self,
        node: &Node,
        method: &MethodDescriptor,
        request: Bytes,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Option<Attempt> {
        let started = Instant::now();
        let timeout = self
            .config
            .attempt_timeout
            .min(ctx.deadline.saturating_duration_since(started));

        trace!(phase = %Phase::Sending, node = %node.id(), method = %method, timeout = ?timeout);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            _ = sleep_until(ctx.deadline) => return None,
            outcome = self.transport.send(node, method, request.clone(), timeout) => outcome,
        };

        Some(Attempt {
            node: node.id(),
            index: ctx.attempt,
            request,
            outcome,
            started,
            finished: Instant::now(),
        })
    }

    fn interpret<A>(
        &self,
        adapter: &A,
        node: NodeId,
        outcome: Result<Bytes, TransportError>,
    ) -> Verdict
    where
        A: RequestAdapter + ?Sized,
    {
        let response = match outcome {
            Ok(response) => response,
            Err(source) => {
                self.stats.record_transport_error();
                warn!(node = %node, error = %source, "transport failure");
                return Verdict::Failed {
                    state: ExecutionState::ServerError,
                    error: AttemptError::Transport { node, source },
                };
            }
        };

        let code = match adapter.response_status(&response) {
            Ok(code) => code,
            Err(e) => {
                warn!(node = %node, error = %e, "undecodable response header");
                return Verdict::Failed {
                    state: ExecutionState::ServerError,
                    error: AttemptError::MalformedResponse {
                        node,
                        reason: e.to_string(),
                    },
                };
            }
        };

        let status = Status(code);
        match adapter.classify(code, &response) {
            ExecutionState::Success => Verdict::Success(response),
            ExecutionState::RequestError => Verdict::Rejected(status),
            state => Verdict::Failed {
                state,
                error: AttemptError::Status { node, status },
            },
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("network", &self.network)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

