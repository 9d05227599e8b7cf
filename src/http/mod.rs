//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Loopback TCP connection (net::Acceptor)
//!     → server.rs (hyper HTTP/1, Axum router, tracing, body limit)
//!     → protocol::ProtocolDispatcher (blocking pool)
//!     → framed response body streamed back to the client
//! ```

pub mod server;

pub use server::{build_router, AgentServer, AgentService, AGENT_PATH, FRAME_CONTENT_TYPE};
