//! HTTP transport for the agent protocol.
//!
//! # Responsibilities
//! - Create the Axum Router with the single agent endpoint
//! - Wire up middleware (tracing, body limit)
//! - Serve one request per accepted connection with hyper HTTP/1
//! - Run dispatch on the blocking pool and stream its frames back
//!
//! # Data Flow
//! ```text
//! POST /v1/agent (body = one request frame)
//!     → spawn_blocking(ProtocolDispatcher::dispatch)
//!     → ResponseWriter → mpsc → streamed application/octet-stream body
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, State},
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use hyper_util::{rt::TokioIo, service::TowerToHyperService};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::agent::Agent;
use crate::config::AgentConfig;
use crate::net::{Acceptor, AcceptorError, ConnectionHandler, ConnectionId, HandlerError};
use crate::protocol::{ProtocolDispatcher, ResponseWriter};

/// Path of the agent endpoint.
pub const AGENT_PATH: &str = "/v1/agent";

/// Content type of request and response bodies.
pub const FRAME_CONTENT_TYPE: &str = "application/octet-stream";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<ProtocolDispatcher>,
}

/// Build the Axum router with all middleware layers.
pub fn build_router(dispatcher: Arc<ProtocolDispatcher>, max_body_size: usize) -> Router {
    Router::new()
        .route(AGENT_PATH, post(agent_handler))
        .with_state(AppState { dispatcher })
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body_size))
                .layer(DefaultBodyLimit::disable()),
        )
}

async fn agent_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let (writer, frames) = ResponseWriter::channel();

    let dispatcher = Arc::clone(&state.dispatcher);
    let dispatch = tokio::task::spawn_blocking(move || dispatcher.dispatch(&body, &writer));
    tokio::spawn(async move {
        if let Err(e) = dispatch.await {
            tracing::error!(error = %e, "Dispatch task failed");
        }
    });

    (
        [(header::CONTENT_TYPE, FRAME_CONTENT_TYPE)],
        Body::from_stream(frame_stream(frames)),
    )
        .into_response()
}

fn frame_stream(
    frames: mpsc::UnboundedReceiver<Vec<u8>>,
) -> impl futures_util::Stream<Item = Result<Bytes, Infallible>> {
    futures_util::stream::unfold(frames, |mut frames| async move {
        let frame = frames.recv().await?;
        Some((Ok(Bytes::from(frame)), frames))
    })
}

/// Serves accepted connections with the agent router.
#[derive(Clone)]
pub struct AgentService {
    router: Router,
}

impl AgentService {
    pub fn new(dispatcher: Arc<ProtocolDispatcher>, max_body_size: usize) -> Self {
        Self {
            router: build_router(dispatcher, max_body_size),
        }
    }
}

impl ConnectionHandler for AgentService {
    async fn handle(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        id: ConnectionId,
    ) -> Result<(), HandlerError> {
        tracing::trace!(connection_id = %id, peer_addr = %peer, "Serving connection");
        let service = TowerToHyperService::new(self.router.clone());
        // One request per connection; an idle pooled socket must not hold a slot.
        hyper::server::conn::http1::Builder::new()
            .keep_alive(false)
            .serve_connection(TokioIo::new(stream), service)
            .await?;
        Ok(())
    }
}

/// An agent reachable over HTTP.
pub struct AgentServer {
    agent: Arc<Agent>,
    acceptor: Acceptor,
}

impl AgentServer {
    /// Bind a loopback port and start serving `agent`.
    pub async fn start(agent: Arc<Agent>, config: &AgentConfig) -> Result<Self, AcceptorError> {
        let dispatcher = Arc::new(ProtocolDispatcher::new(Arc::clone(&agent)));
        let service = AgentService::new(dispatcher, config.security.max_body_size);
        let acceptor = Acceptor::start(&config.listener, service).await?;
        agent.set_endpoint(acceptor.local_addr());

        tracing::info!(uri = %format!("http://{}", acceptor.local_addr()), "Agent server started");
        Ok(Self { agent, acceptor })
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.acceptor.local_addr()
    }

    /// `http://host:port` of the listener.
    pub fn base_uri(&self) -> String {
        format!("http://{}", self.local_addr())
    }

    /// Full URI of the agent endpoint.
    pub fn endpoint_uri(&self) -> String {
        format!("{}{}", self.base_uri(), AGENT_PATH)
    }

    /// Stop accepting, then give in-flight connections up to `drain` to finish.
    pub async fn stop(&mut self, drain: Duration) {
        self.acceptor.stop().await;
        if !self.acceptor.tracker().wait_idle(drain).await {
            tracing::warn!(
                active = self.acceptor.tracker().active_count(),
                "Connections still open after drain timeout"
            );
        }
    }
}
