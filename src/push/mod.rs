//! Push channel.
//!
//! A client opens the channel with a long-lived request; the handler then
//! blocks on the queue for as long as the client keeps reading, emitting a
//! ping whenever nothing was pushed for a keepalive interval.

mod channel;

pub use channel::{PushChannel, PushFrame, PushMessage, DEFAULT_KEEPALIVE};
