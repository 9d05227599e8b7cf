//! The marshaler: runs work on the application's main context.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::oneshot;

use super::context::{ExecutionContext, ThreadContext};
use super::AffinityError;

/// Thread name of the dedicated main context.
pub const MAIN_THREAD_NAME: &str = "agent-main";

/// Stack of execution contexts with a permanent root.
///
/// The top of the stack is where main-affinity work runs. The root can
/// never be popped.
pub struct MainThread {
    contexts: RwLock<Vec<Arc<dyn ExecutionContext>>>,
}

impl MainThread {
    pub fn new(root: Arc<dyn ExecutionContext>) -> Self {
        Self {
            contexts: RwLock::new(vec![root]),
        }
    }

    /// Root the stack in a freshly spawned dedicated thread.
    pub fn spawn() -> Result<Self, AffinityError> {
        Ok(Self::new(Arc::new(ThreadContext::spawn(MAIN_THREAD_NAME)?)))
    }

    /// Redirect main-affinity work to `context` until it is popped.
    pub fn push_context(&self, context: Arc<dyn ExecutionContext>) {
        tracing::debug!(context = %context.name(), "Pushed execution context");
        self.contexts.write().push(context);
    }

    /// Pop the top context. The root stays.
    pub fn pop_context(&self) -> Result<Arc<dyn ExecutionContext>, AffinityError> {
        let mut contexts = self.contexts.write();
        if contexts.len() <= 1 {
            return Err(AffinityError::RootContext);
        }
        let popped = contexts.pop().ok_or(AffinityError::RootContext)?;
        tracing::debug!(context = %popped.name(), "Popped execution context");
        Ok(popped)
    }

    pub fn current(&self) -> Arc<dyn ExecutionContext> {
        let contexts = self.contexts.read();
        // The root is never removed.
        Arc::clone(&contexts[contexts.len() - 1])
    }

    pub fn depth(&self) -> usize {
        self.contexts.read().len()
    }

    pub fn is_main_thread(&self) -> bool {
        self.current().is_current()
    }

    /// Fail unless called from the main context.
    pub fn ensure(&self, caller: &str) -> Result<(), AffinityError> {
        if self.is_main_thread() {
            Ok(())
        } else {
            Err(AffinityError::NotMainThread {
                caller: caller.to_string(),
            })
        }
    }

    /// Run `f` on the main context and wait for its result.
    ///
    /// Runs inline when already there. A panic inside `f` is returned as
    /// an error instead of unwinding into the caller. Blocks the calling
    /// thread, so async callers go through `spawn_blocking`.
    pub fn send<T, F>(&self, f: F) -> Result<T, AffinityError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let context = self.current();
        if context.is_current() {
            return catch_unwind(AssertUnwindSafe(f)).map_err(panic_error);
        }

        let (tx, rx) = oneshot::channel();
        context.post(Box::new(move || {
            let _ = tx.send(catch_unwind(AssertUnwindSafe(f)));
        }))?;

        match rx.blocking_recv() {
            Ok(result) => result.map_err(panic_error),
            Err(_) => Err(AffinityError::ContextClosed(context.name().to_string())),
        }
    }

    /// Queue `f` on the main context without waiting.
    pub fn post<F>(&self, f: F) -> Result<(), AffinityError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.current().post(Box::new(f))
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> AffinityError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    AffinityError::HandlerPanicked(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affinity::{InlineContext, Job};
    use std::thread;

    #[test]
    fn send_runs_on_the_main_thread() {
        let main = MainThread::spawn().expect("spawn main");
        let name = main
            .send(|| thread::current().name().map(str::to_string))
            .expect("send");
        assert_eq!(name.as_deref(), Some(MAIN_THREAD_NAME));
        assert!(!main.is_main_thread());
    }

    #[test]
    fn send_from_main_runs_inline() {
        let main = Arc::new(MainThread::spawn().expect("spawn main"));
        let inner = Arc::clone(&main);
        let nested = main
            .send(move || inner.send(|| 42).expect("nested send"))
            .expect("send");
        assert_eq!(nested, 42);
    }

    #[test]
    fn panics_become_errors() {
        let main = MainThread::spawn().expect("spawn main");
        let err = main.send(|| -> u32 { panic!("handler blew up") }).expect_err("panic");
        assert!(matches!(err, AffinityError::HandlerPanicked(ref m) if m == "handler blew up"));

        // The context survives.
        assert_eq!(main.send(|| 1).expect("send after panic"), 1);
    }

    #[test]
    fn ensure_rejects_other_threads() {
        let main = Arc::new(MainThread::spawn().expect("spawn main"));
        assert!(matches!(
            main.ensure("test"),
            Err(AffinityError::NotMainThread { .. })
        ));

        let inner = Arc::clone(&main);
        main.send(move || inner.ensure("test")).expect("send").expect("on main");
    }

    #[test]
    fn root_context_cannot_be_popped() {
        let main = MainThread::new(Arc::new(InlineContext::new("root")));
        assert!(matches!(main.pop_context(), Err(AffinityError::RootContext)));

        main.push_context(Arc::new(InlineContext::new("pushed")));
        assert_eq!(main.current().name(), "pushed");
        assert_eq!(main.pop_context().expect("pop").name(), "pushed");
        assert_eq!(main.current().name(), "root");
        assert_eq!(main.depth(), 1);
    }

    /// Accepts jobs and drops them unrun.
    struct Discarding;

    impl ExecutionContext for Discarding {
        fn name(&self) -> &str {
            "discarding"
        }

        fn post(&self, job: Job) -> Result<(), AffinityError> {
            drop(job);
            Ok(())
        }

        fn is_current(&self) -> bool {
            false
        }
    }

    #[test]
    fn dropped_job_reports_closed_context() {
        let main = MainThread::new(Arc::new(Discarding));
        let err = main.send(|| 1).expect_err("never ran");
        assert!(matches!(err, AffinityError::ContextClosed(ref name) if name == "discarding"));
    }

    #[tokio::test]
    async fn send_from_the_blocking_pool() {
        let main = Arc::new(MainThread::spawn().expect("spawn main"));
        let sender = Arc::clone(&main);
        let name = tokio::task::spawn_blocking(move || {
            sender.send(|| thread::current().name().map(str::to_string))
        })
        .await
        .expect("join")
        .expect("send");
        assert_eq!(name.as_deref(), Some(MAIN_THREAD_NAME));
    }

    #[test]
    fn pushed_context_receives_work() {
        let main = MainThread::spawn().expect("spawn main");
        main.push_context(Arc::new(ThreadContext::spawn("secondary").expect("spawn")));

        let name = main
            .send(|| thread::current().name().map(str::to_string))
            .expect("send");
        assert_eq!(name.as_deref(), Some("secondary"));
    }
}
