//! In-process inspection agent.
//!
//! A client attaches over loopback HTTP, submits evaluation and inspection
//! requests, and receives lazily expandable representations of live objects.

// Object model and caches
pub mod cache;
pub mod model;

// Representation and interaction
pub mod interactive;
pub mod representation;

// Agent and protocol
pub mod affinity;
pub mod agent;
pub mod error;
pub mod protocol;
pub mod push;

// Transport
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use agent::{Agent, AgentBuilder};
pub use config::AgentConfig;
pub use error::AgentError;
pub use http::AgentServer;
pub use lifecycle::Shutdown;
