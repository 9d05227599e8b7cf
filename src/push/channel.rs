//! Queue of outbound agent messages with keepalive pings.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use crate::agent::{CapturedOutput, Evaluation};
use crate::observability::metrics;

/// Idle interval after which a ping is written.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(5);

/// A message pushed to clients holding an open channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PushMessage {
    /// A submission finished evaluating.
    Evaluation(Box<Evaluation>),
    /// A running submission wrote to stdout or stderr.
    CapturedOutput(CapturedOutput),
    /// Agent state was reset; every handle from `generation - 1` is gone.
    StateReset { generation: u64 },
}

impl PushMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            PushMessage::Evaluation(_) => "evaluation",
            PushMessage::CapturedOutput(_) => "captured_output",
            PushMessage::StateReset { .. } => "state_reset",
        }
    }
}

/// What the pump hands to its writer.
#[derive(Debug, Clone)]
pub enum PushFrame {
    Message(PushMessage),
    Ping,
}

/// FIFO of pushed messages, drained by a long-lived client request.
pub struct PushChannel {
    queue: Mutex<VecDeque<PushMessage>>,
    available: Condvar,
    keepalive: Duration,
}

impl Default for PushChannel {
    fn default() -> Self {
        Self::new(DEFAULT_KEEPALIVE)
    }
}

impl PushChannel {
    pub fn new(keepalive: Duration) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            keepalive,
        }
    }

    /// Enqueue a message and wake a waiting pump.
    pub fn push(&self, message: PushMessage) {
        metrics::record_push_message(message.kind());
        self.queue.lock().push_back(message);
        self.available.notify_one();
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Block until a message is queued or the keepalive interval passes.
    ///
    /// `None` means the interval passed with nothing to send.
    pub fn next(&self) -> Option<PushMessage> {
        let deadline = Instant::now() + self.keepalive;
        let mut queue = self.queue.lock();
        while queue.is_empty() {
            if self.available.wait_until(&mut queue, deadline).timed_out() {
                break;
            }
        }
        queue.pop_front()
    }

    /// Put back a message that could not be delivered, ahead of newer ones.
    fn requeue(&self, message: PushMessage) {
        self.queue.lock().push_front(message);
        self.available.notify_one();
    }

    /// Drain messages into `write` until it fails, pinging when idle.
    ///
    /// Returns the writer's error; a failing writer means the client is gone.
    /// The message whose write failed stays queued for the next pump.
    pub fn pump<E, W>(&self, mut write: W) -> E
    where
        W: FnMut(PushFrame) -> Result<(), E>,
    {
        tracing::debug!("Push channel opened");
        loop {
            let (frame, undelivered) = match self.next() {
                Some(message) => (PushFrame::Message(message.clone()), Some(message)),
                None => {
                    metrics::record_push_ping();
                    (PushFrame::Ping, None)
                }
            };

            if let Err(err) = write(frame) {
                if let Some(message) = undelivered {
                    tracing::debug!(kind = message.kind(), "Requeued undelivered push message");
                    self.requeue(message);
                }
                tracing::debug!("Push channel closed by client");
                return err;
            }
        }
    }
}
