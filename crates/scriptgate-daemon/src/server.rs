//! Connection listener: TCP accept loop feeding the dispatcher.
//!
//! Boundary plumbing only; no request is inspected here. Accept failures
//! are logged and skipped; one misbehaving peer never takes down the
//! daemon. The loop stops when the shutdown signal fires (or its sender
//! is dropped), after which queued requests drain before `serve` returns.

use std::io;
use std::sync::Arc;

use scriptgate_core::config::GatewayConfig;
use scriptgate_core::policy::{ScriptPolicy, SizeLimitPolicy};
use scriptgate_core::runner::ScriptRunner;
use scriptgate_core::trust::TrustStore;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::dispatch::{DispatchConfig, Dispatcher, GatewayContext};

/// The assembled gateway, ready to serve a listener.
pub struct Gateway {
    config: GatewayConfig,
    trust: Arc<TrustStore>,
    runner: Arc<dyn ScriptRunner>,
    policy: Option<Arc<dyn ScriptPolicy>>,
}

impl Gateway {
    /// Assembles a gateway from configuration, a loaded trust store, and
    /// an execution capability.
    ///
    /// When `max_script_bytes` is configured, the size-limit policy is
    /// installed automatically; [`Gateway::with_policy`] replaces it.
    #[must_use]
    pub fn new(config: GatewayConfig, trust: TrustStore, runner: Arc<dyn ScriptRunner>) -> Self {
        let policy = config.max_script_bytes.map(|max| {
            Arc::new(SizeLimitPolicy::new(usize::try_from(max).unwrap_or(usize::MAX)))
                as Arc<dyn ScriptPolicy>
        });

        Self {
            config,
            trust: Arc::new(trust),
            runner,
            policy,
        }
    }

    /// Replaces the script policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn ScriptPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Binds the configured listen address.
    ///
    /// # Errors
    ///
    /// Returns the bind error; the caller decides whether that is fatal.
    pub async fn bind(&self) -> io::Result<TcpListener> {
        TcpListener::bind(self.config.listen_addr).await
    }

    /// Runs the accept loop until `shutdown` fires, then drains the
    /// queue and returns.
    ///
    /// The listener is taken as a parameter (rather than bound
    /// internally) so callers can bind an ephemeral port and learn the
    /// address before serving. Tests depend on this.
    pub async fn serve(self, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        if self.trust.signing_key_count() == 0 {
            warn!(
                total_keys = self.trust.len(),
                "trust store has no signing-capable keys: every request will be rejected"
            );
        }
        if self.policy.is_none() {
            info!("no script policy configured: script size and content are unrestricted");
        }

        let dispatch_config = DispatchConfig {
            workers: self.config.workers,
            queue_capacity: self.config.queue_capacity,
            request_deadline: self.config.request_deadline(),
        };
        let context = GatewayContext::new(self.trust, self.runner, self.policy);
        let dispatcher = Dispatcher::spawn(&dispatch_config, context);

        info!(
            addr = %listener.local_addr().map(|a| a.to_string()).unwrap_or_default(),
            workers = dispatch_config.workers,
            queue_capacity = dispatch_config.queue_capacity,
            "gateway listening"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((connection, peer)) => {
                        debug!(%peer, "accepted connection");
                        // Blocks while the queue is full: deliberate
                        // backpressure on the accept path. To reject
                        // instead, this enqueue is the place to use a
                        // non-blocking send and close the connection.
                        if dispatcher.enqueue(connection).await.is_err() {
                            error!("dispatcher queue closed unexpectedly; stopping accept loop");
                            break;
                        }
                    },
                    Err(error) => {
                        warn!(%error, "failed to accept connection");
                    },
                },
                _ = shutdown.changed() => {
                    info!("shutdown requested; draining queued requests");
                    break;
                },
            }
        }

        drop(listener);
        dispatcher.shutdown().await;
        info!("gateway stopped");
    }
}
