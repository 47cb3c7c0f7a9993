//! Bounded dispatcher and worker pool.
//!
//! One accept loop produces connections; a fixed pool of `W` worker tasks
//! consumes them from a bounded queue of capacity `C`. The queue is the
//! only shared mutable structure on the hot path.
//!
//! # Backpressure
//!
//! When the queue is full, [`Dispatcher::enqueue`] blocks the accepting
//! path until a worker frees a slot; bounded memory is preferred over
//! dropping accepted work. Once a connection is enqueued it is handled by
//! exactly one worker, fully to completion (response written, connection
//! shut down), before that worker takes its next connection.
//!
//! # Pipeline
//!
//! Per connection, strictly in order: decode → policy hook →
//! authenticate → execute → respond. Script bytes reach the runner only
//! on the authenticated path; every other branch writes its marker and
//! returns before the runner is touched.
//!
//! # Deadline
//!
//! An optional per-request deadline covers the whole pipeline. On expiry
//! the connection future is dropped: the peer gets a closed connection
//! and never a late response, and a child process mid-execution is
//! reaped via `kill_on_drop`.

use std::sync::Arc;
use std::time::Duration;

use scriptgate_core::auth::{authenticate, VerificationOutcome};
use scriptgate_core::policy::{PolicyDecision, ScriptPolicy};
use scriptgate_core::runner::ScriptRunner;
use scriptgate_core::trust::TrustStore;
use thiserror::Error;
use tokio::io::{AsyncWriteExt as _, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::protocol::{self, response};

/// Sizing and deadline settings for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Number of worker tasks (`W`).
    pub workers: usize,
    /// Queue capacity (`C`).
    pub queue_capacity: usize,
    /// Per-request deadline; `None` disables it.
    pub request_deadline: Option<Duration>,
}

/// Immutable state shared by every worker.
pub struct GatewayContext {
    /// The trust store; read-only after load.
    pub trust: Arc<TrustStore>,
    /// The execution capability.
    pub runner: Arc<dyn ScriptRunner>,
    /// Optional pre-authentication script policy.
    pub policy: Option<Arc<dyn ScriptPolicy>>,
}

impl GatewayContext {
    /// Bundles the shared request-handling state.
    #[must_use]
    pub fn new(
        trust: Arc<TrustStore>,
        runner: Arc<dyn ScriptRunner>,
        policy: Option<Arc<dyn ScriptPolicy>>,
    ) -> Self {
        Self {
            trust,
            runner,
            policy,
        }
    }
}

/// Terminal outcome of one request, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Authenticated, executed, response written.
    Success,
    /// No trusted key verified the signature.
    Rejected,
    /// The configured policy refused the script before authentication.
    PolicyDenied,
    /// The request never decoded; a decode marker was written.
    DecodeFailed,
    /// Authenticated but execution failed; the execution marker was
    /// written.
    ExecutionFailed,
    /// The response could not be written; connection abandoned.
    ResponseWriteFailed,
    /// The per-request deadline expired; connection dropped silently.
    DeadlineExpired,
}

impl RequestOutcome {
    /// Stable identifier for log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Rejected => "rejected",
            Self::PolicyDenied => "policy_denied",
            Self::DecodeFailed => "decode_failed",
            Self::ExecutionFailed => "execution_failed",
            Self::ResponseWriteFailed => "response_write_failed",
            Self::DeadlineExpired => "deadline_expired",
        }
    }
}

/// The dispatcher queue was closed; no further connections are accepted.
#[derive(Debug, Error)]
#[error("dispatcher queue is closed")]
pub struct QueueClosed;

/// Bounded queue plus its worker pool.
pub struct Dispatcher {
    queue: mpsc::Sender<TcpStream>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Creates the queue and spawns the worker pool.
    #[must_use]
    pub fn spawn(config: &DispatchConfig, context: GatewayContext) -> Self {
        let (queue, receiver) = mpsc::channel(config.queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let context = Arc::new(context);

        let workers = (0..config.workers)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    Arc::clone(&receiver),
                    Arc::clone(&context),
                    config.request_deadline,
                ))
            })
            .collect();

        Self { queue, workers }
    }

    /// Enqueues an accepted connection, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] if the worker pool has shut down.
    pub async fn enqueue(&self, connection: TcpStream) -> Result<(), QueueClosed> {
        self.queue.send(connection).await.map_err(|_| QueueClosed)
    }

    /// Closes the queue and waits for the workers to drain it.
    ///
    /// Connections already enqueued are still processed to completion;
    /// nothing is dropped once accepted.
    pub async fn shutdown(self) {
        drop(self.queue);
        for handle in self.workers {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<TcpStream>>>,
    context: Arc<GatewayContext>,
    deadline: Option<Duration>,
) {
    loop {
        // Hold the lock only for the dequeue itself; processing happens
        // with the lock released so the other workers keep draining.
        let connection = receiver.lock().await.recv().await;
        let Some(connection) = connection else {
            break;
        };

        let peer = connection.peer_addr().ok();
        let outcome = match deadline {
            Some(limit) => match timeout(limit, handle_connection(connection, &context)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        worker = id,
                        ?peer,
                        deadline_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                        "request deadline expired; connection dropped without a response"
                    );
                    RequestOutcome::DeadlineExpired
                },
            },
            None => handle_connection(connection, &context).await,
        };

        debug!(worker = id, ?peer, outcome = outcome.as_str(), "request finished");
    }

    debug!(worker = id, "worker exiting: queue closed");
}

/// Runs the full pipeline for one connection.
///
/// Owns the connection for its entire lifetime; whichever branch returns,
/// the stream is shut down (or dropped) exactly once here.
async fn handle_connection(mut connection: TcpStream, context: &GatewayContext) -> RequestOutcome {
    let (read_half, mut write_half) = connection.split();
    let mut reader = BufReader::new(read_half);

    let request = match protocol::decode(&mut reader).await {
        Ok(request) => request,
        Err(error) => {
            warn!(%error, "request decode failed");
            if let Err(write_error) =
                response::write_marker(&mut write_half, error.wire_marker()).await
            {
                debug!(%write_error, "failed to report decode error to peer");
            }
            let _ = write_half.shutdown().await;
            return RequestOutcome::DecodeFailed;
        },
    };
    drop(reader);

    if let Some(policy) = &context.policy {
        if let PolicyDecision::Deny { reason } = policy.evaluate(&request.script) {
            warn!(
                policy = policy.name(),
                %reason,
                script_bytes = request.script.len(),
                "script refused by policy"
            );
            let _ =
                response::write_marker(&mut write_half, response::MARKER_INVALID_SIGNATURE).await;
            let _ = write_half.shutdown().await;
            return RequestOutcome::PolicyDenied;
        }
    }

    match authenticate(
        &request.signature,
        &request.script,
        context.trust.signing_keys(),
    ) {
        VerificationOutcome::Rejected => {
            info!(
                script_bytes = request.script.len(),
                "request rejected: no trusted key verified the signature"
            );
            let _ =
                response::write_marker(&mut write_half, response::MARKER_INVALID_SIGNATURE).await;
            let _ = write_half.shutdown().await;
            return RequestOutcome::Rejected;
        },
        VerificationOutcome::Authenticated => {
            debug!(script_bytes = request.script.len(), "request authenticated");
        },
    }

    match context.runner.run(&request.script).await {
        Ok(output) => {
            if let Err(error) = response::write_success(&mut write_half, &output).await {
                warn!(%error, "failed to write response; abandoning connection");
                return RequestOutcome::ResponseWriteFailed;
            }
            let _ = write_half.shutdown().await;
            RequestOutcome::Success
        },
        Err(error) => {
            error!(kind = error.kind(), %error, "script execution failed");
            let _ = response::write_marker(&mut write_half, response::MARKER_EXECUTION).await;
            let _ = write_half.shutdown().await;
            RequestOutcome::ExecutionFailed
        },
    }
}

#[cfg(test)]
mod tests {
    use scriptgate_core::runner::RunnerError;
    use scriptgate_core::BashRunner;

    use super::*;

    struct NeverRunner;

    #[async_trait::async_trait]
    impl ScriptRunner for NeverRunner {
        async fn run(&self, _script: &[u8]) -> Result<Vec<u8>, RunnerError> {
            panic!("runner must not be reached in this test");
        }
    }

    fn empty_context(runner: Arc<dyn ScriptRunner>) -> GatewayContext {
        GatewayContext::new(Arc::new(TrustStore::from_keys(Vec::new())), runner, None)
    }

    #[tokio::test]
    async fn test_shutdown_drains_workers() {
        let dispatcher = Dispatcher::spawn(
            &DispatchConfig {
                workers: 3,
                queue_capacity: 2,
                request_deadline: None,
            },
            empty_context(Arc::new(BashRunner::new())),
        );

        // Would hang if workers failed to observe the closed queue.
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_fails() {
        let dispatcher = Dispatcher::spawn(
            &DispatchConfig {
                workers: 1,
                queue_capacity: 1,
                request_deadline: None,
            },
            empty_context(Arc::new(BashRunner::new())),
        );
        let queue = dispatcher.queue.clone();
        dispatcher.shutdown().await;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (_peer, connection) = tokio::join!(
            tokio::net::TcpStream::connect(addr),
            async { listener.accept().await.unwrap().0 }
        );

        assert!(queue.send(connection).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_store_rejects_without_running() {
        // The unauthenticated path must never touch the runner.
        let dispatcher = Dispatcher::spawn(
            &DispatchConfig {
                workers: 1,
                queue_capacity: 1,
                request_deadline: None,
            },
            empty_context(Arc::new(NeverRunner)),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
            let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"AAAA\necho hi").await.unwrap();
            stream.shutdown().await.unwrap();
            let mut reply = Vec::new();
            stream.read_to_end(&mut reply).await.unwrap();
            reply
        });

        let (connection, _) = listener.accept().await.unwrap();
        dispatcher.enqueue(connection).await.unwrap();

        let reply = client.await.unwrap();
        assert_eq!(reply, b"Invalid signature\n");

        dispatcher.shutdown().await;
    }
}
