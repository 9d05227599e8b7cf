//! Execution affinity.
//!
//! # Responsibilities
//! - Own the stack of execution contexts where main-affinity work runs
//! - Marshal a closure to the main context and block for its result
//! - Assert that registration APIs are called from the main context
//!
//! # Design Decisions
//! - The main context is a dedicated thread by default; hosts can push
//!   their own context (an event loop, a UI thread) on top of it
//! - Handlers report failure through their return value; a panic is
//!   caught at the context boundary and surfaced as `HandlerPanicked`

mod context;
mod main_thread;

use thiserror::Error;

pub use context::{ExecutionContext, InlineContext, Job, ThreadContext};
pub use main_thread::{MainThread, MAIN_THREAD_NAME};

#[derive(Debug, Error)]
pub enum AffinityError {
    #[error("{caller} must be called on the main thread")]
    NotMainThread { caller: String },

    #[error("the root execution context cannot be popped")]
    RootContext,

    #[error("execution context '{0}' is closed")]
    ContextClosed(String),

    #[error("handler panicked: {0}")]
    HandlerPanicked(String),

    #[error("failed to start execution context: {0}")]
    Spawn(#[source] std::io::Error),
}
