//! Execution contexts: places a job can be posted to.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::AffinityError;

/// A unit of work posted to a context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Somewhere jobs can run.
pub trait ExecutionContext: Send + Sync {
    fn name(&self) -> &str;

    /// Queue `job` for execution.
    fn post(&self, job: Job) -> Result<(), AffinityError>;

    /// Whether the calling thread is this context's thread.
    fn is_current(&self) -> bool;
}

/// A dedicated thread draining a job queue.
pub struct ThreadContext {
    name: String,
    thread_id: ThreadId,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadContext {
    /// Start the thread.
    pub fn spawn(name: impl Into<String>) -> Result<Self, AffinityError> {
        let name = name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let thread_name = name.clone();
        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                tracing::debug!(context = %thread_name, "Execution context started");
                while let Some(job) = receiver.blocking_recv() {
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        tracing::error!(context = %thread_name, "Job panicked");
                    }
                }
                tracing::debug!(context = %thread_name, "Execution context stopped");
            })
            .map_err(AffinityError::Spawn)?;

        Ok(Self {
            name,
            thread_id: join.thread().id(),
            sender: Mutex::new(Some(sender)),
            join: Mutex::new(Some(join)),
        })
    }

    /// Stop accepting jobs and wait for queued ones to finish.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        if let Some(join) = self.join.lock().take() {
            if thread::current().id() != self.thread_id && join.join().is_err() {
                tracing::error!(context = %self.name, "Execution context thread panicked");
            }
        }
    }
}

impl ExecutionContext for ThreadContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn post(&self, job: Job) -> Result<(), AffinityError> {
        let sender = self.sender.lock();
        let sender = sender
            .as_ref()
            .ok_or_else(|| AffinityError::ContextClosed(self.name.clone()))?;
        sender
            .send(job)
            .map_err(|_| AffinityError::ContextClosed(self.name.clone()))
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl Drop for ThreadContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs every job immediately on the posting thread.
pub struct InlineContext {
    name: String,
}

impl InlineContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ExecutionContext for InlineContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn post(&self, job: Job) -> Result<(), AffinityError> {
        job();
        Ok(())
    }

    fn is_current(&self) -> bool {
        true
    }
}
