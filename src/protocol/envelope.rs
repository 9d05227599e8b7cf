//! Request envelopes, outbound frames, and error payloads.

use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::messages::ResponseBody;
use crate::model::ErrorValue;
use crate::push::PushMessage;

/// A request as received: message id plus an undecoded payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope<P = serde_json::Value> {
    pub message_id: Uuid,
    pub payload: P,
}

impl<P> RequestEnvelope<P> {
    pub fn new(payload: P) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            payload,
        }
    }
}

/// One frame written to a response stream.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Response { message_id: Uuid, body: ResponseBody },
    Error { message_id: Uuid, error: ErrorPayload },
    Push { message: PushMessage },
    Ping { request_id: Uuid },
    /// Always the last frame of a response stream.
    EndOfMessages,
}

/// Structured error sent to the client in place of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorPayload>>,
}

impl ErrorPayload {
    /// Capture `err` and its source chain.
    pub fn from_error(kind: impl Into<String>, err: &(dyn StdError + 'static)) -> Self {
        Self {
            kind: kind.into(),
            message: err.to_string(),
            cause: err.source().map(|source| Box::new(Self::from_source(source))),
        }
    }

    fn from_source(err: &(dyn StdError + 'static)) -> Self {
        let kind = err
            .downcast_ref::<ErrorValue>()
            .map_or_else(|| "error".to_string(), |value| value.type_name.clone());
        Self::from_error(kind, err)
    }
}
