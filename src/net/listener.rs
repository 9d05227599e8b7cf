//! Loopback acceptor with bounded concurrency.
//!
//! # Responsibilities
//! - Bind a random port in the configured range, retrying collisions
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Hand each connection to a [`ConnectionHandler`] and log its failures
//! - Stop cooperatively and report when the accept loop has exited
//!
//! # Design Decisions
//! - A permit is taken before `accept`, so at most `max_connections`
//!   handlers run at once and further clients wait in the kernel backlog
//! - Handler errors never end the accept loop

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, Semaphore};

use crate::config::ListenerConfig;
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::net::connection::{ConnectionId, ConnectionTracker};

/// Error type for acceptor operations.
#[derive(Debug, Error)]
pub enum AcceptorError {
    #[error("'{0}' is not an IP address")]
    InvalidHost(String),

    #[error("{0} is not a loopback address")]
    NotLoopback(IpAddr),

    #[error("port range {min}..={max} is empty")]
    EmptyPortRange { min: u16, max: u16 },

    #[error("failed to bind after {attempts} attempts: {source}")]
    Bind {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Error returned by a connection handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Serves one accepted connection.
pub trait ConnectionHandler: Send + Sync + 'static {
    fn handle(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        id: ConnectionId,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send;
}

/// Bind a loopback listener on a random port from the configured range.
///
/// Collisions are retried with a fresh port until `bind_timeout` elapses.
pub async fn bind_random(config: &ListenerConfig) -> Result<TcpListener, AcceptorError> {
    let ip: IpAddr = config
        .host
        .parse()
        .map_err(|_| AcceptorError::InvalidHost(config.host.clone()))?;
    if !ip.is_loopback() {
        return Err(AcceptorError::NotLoopback(ip));
    }
    if config.port_min > config.port_max {
        return Err(AcceptorError::EmptyPortRange {
            min: config.port_min,
            max: config.port_max,
        });
    }

    let deadline = Instant::now() + config.bind_timeout();
    let mut attempts = 0;
    loop {
        attempts += 1;
        let port = rand::thread_rng().gen_range(config.port_min..=config.port_max);
        match TcpListener::bind((ip, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) if Instant::now() < deadline => {
                tracing::debug!(port, error = %e, "Port unavailable, retrying");
                tokio::task::yield_now().await;
            }
            Err(source) => return Err(AcceptorError::Bind { attempts, source }),
        }
    }
}

/// A running accept loop.
pub struct Acceptor {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    connection_limit: Arc<Semaphore>,
    tracker: ConnectionTracker,
    stopped: Option<oneshot::Receiver<()>>,
}

impl Acceptor {
    /// Bind and start accepting connections for `handler`.
    pub async fn start<H: ConnectionHandler>(
        config: &ListenerConfig,
        handler: H,
    ) -> Result<Self, AcceptorError> {
        let listener = bind_random(config).await?;
        let local_addr = listener.local_addr()?;

        let shutdown = Shutdown::new();
        let connection_limit = Arc::new(Semaphore::new(config.max_connections));
        let tracker = ConnectionTracker::new();
        let (stopped_tx, stopped_rx) = oneshot::channel();

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Acceptor listening"
        );

        tokio::spawn(accept_loop(
            listener,
            Arc::new(handler),
            Arc::clone(&connection_limit),
            tracker.clone(),
            shutdown.subscribe(),
            stopped_tx,
        ));

        Ok(Self {
            local_addr,
            shutdown,
            connection_limit,
            tracker,
            stopped: Some(stopped_rx),
        })
    }

    /// Get the local address this acceptor is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.is_none()
    }

    /// Stop accepting and wait until the accept loop has released the listener.
    ///
    /// Connections already being served are left to finish.
    pub async fn stop(&mut self) {
        let Some(stopped) = self.stopped.take() else {
            return;
        };

        self.shutdown.trigger();
        // Wake a loop parked on a full semaphore.
        self.connection_limit.add_permits(1);

        if stopped.await.is_err() {
            tracing::warn!(address = %self.local_addr, "Accept loop ended without signalling");
        }
        tracing::info!(address = %self.local_addr, "Acceptor stopped");
    }
}

impl Drop for Acceptor {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

async fn accept_loop<H: ConnectionHandler>(
    listener: TcpListener,
    handler: Arc<H>,
    connection_limit: Arc<Semaphore>,
    tracker: ConnectionTracker,
    mut shutdown: ShutdownSignal,
    stopped: oneshot::Sender<()>,
) {
    loop {
        let permit = tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            permit = Arc::clone(&connection_limit).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };
        if shutdown.is_triggered() {
            break;
        }

        let (stream, peer) = tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
            },
        };

        let guard = tracker.track();
        tracing::debug!(
            connection_id = %guard.id(),
            peer_addr = %peer,
            available_permits = connection_limit.available_permits(),
            "Connection accepted"
        );

        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = handler.handle(stream, peer, guard.id()).await {
                tracing::warn!(connection_id = %guard.id(), error = %e, "Connection handler failed");
            }
        });
    }

    drop(listener);
    tracing::debug!("Accept loop exited");
    let _ = stopped.send(());
}
