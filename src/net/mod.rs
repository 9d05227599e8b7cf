//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming loopback TCP connection
//!     → listener.rs (accept loop, connection limits, stop)
//!     → connection.rs (id, in-flight tracking)
//!     → ConnectionHandler (the HTTP layer)
//! ```
//!
//! # Design Decisions
//! - Bounded concurrency prevents a misbehaving client from starving the host
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{bind_random, Acceptor, AcceptorError, ConnectionHandler, HandlerError};
