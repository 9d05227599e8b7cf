//! Response writer: encodes frames onto a connection's outbound stream.

use thiserror::Error;
use tokio::sync::mpsc;

use super::codec::{encode_frame, CodecError};
use super::envelope::Outbound;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("response stream closed by client")]
    Closed,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Cheap, cloneable handle for writing frames from blocking code.
#[derive(Clone)]
pub struct ResponseWriter {
    frames: mpsc::UnboundedSender<Vec<u8>>,
}

impl ResponseWriter {
    /// A writer and the receiving end of its frame stream.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (frames, receiver) = mpsc::unbounded_channel();
        (Self { frames }, receiver)
    }

    pub fn write(&self, message: &Outbound) -> Result<(), WriteError> {
        let frame = encode_frame(message)?;
        self.frames.send(frame).map_err(|_| WriteError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.frames.is_closed()
    }
}
