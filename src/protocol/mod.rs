//! Agent wire protocol.
//!
//! # Responsibilities
//! - Frame and unframe JSON messages (`codec`)
//! - Define the request/response vocabulary (`messages`, `envelope`)
//! - Route each request to its handler with the right affinity (`dispatcher`)
//! - Stream frames back to the connection (`writer`)

pub mod codec;
pub mod dispatcher;
pub mod envelope;
pub mod messages;
pub mod writer;

pub use codec::{decode_all, decode_single, encode_frame, CodecError, FrameDecoder};
pub use dispatcher::ProtocolDispatcher;
pub use envelope::{ErrorPayload, Outbound, RequestEnvelope};
pub use messages::{Affinity, Request, ResponseBody, SetMemberResult};
pub use writer::{ResponseWriter, WriteError};
