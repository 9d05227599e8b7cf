//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! body bytes → decode envelope → decode request
//!   → affinity Any:  run on this worker
//!   → affinity Main: marshal to the main context, block for the result
//! → response | error frame
//! → end_of_messages (always, even when nothing else was written)
//! ```

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use super::codec::{decode_single, CodecError};
use super::envelope::{ErrorPayload, Outbound, RequestEnvelope};
use super::messages::{Affinity, Request, ResponseBody, SetMemberResult};
use super::writer::ResponseWriter;
use crate::agent::Agent;
use crate::error::AgentError;
use crate::observability::metrics;
use crate::push::PushFrame;

/// Decodes requests and routes them to their handlers.
pub struct ProtocolDispatcher {
    agent: Arc<Agent>,
}

impl ProtocolDispatcher {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    /// Handle one request body, writing every frame to `writer`.
    ///
    /// Blocks for as long as the handler does; call from a blocking worker.
    pub fn dispatch(&self, body: &[u8], writer: &ResponseWriter) {
        match decode_request(body) {
            Ok(Some(envelope)) => self.handle(envelope, writer),
            Ok(None) => tracing::warn!("Empty request body"),
            Err(err) => tracing::warn!(error = %err, "Malformed request"),
        }

        if let Err(err) = writer.write(&Outbound::EndOfMessages) {
            tracing::debug!(error = %err, "Could not write end of messages");
        }
    }

    fn handle(&self, envelope: RequestEnvelope<Request>, writer: &ResponseWriter) {
        let RequestEnvelope {
            message_id,
            payload: request,
        } = envelope;
        let kind = request.kind();
        let start = Instant::now();

        tracing::debug!(%message_id, request = kind, "Dispatching request");

        let outcome = match self.execute(request, message_id, writer) {
            Ok(()) => "ok",
            Err(err) => {
                tracing::warn!(%message_id, request = kind, error = %err, "Request failed");
                let error = ErrorPayload::from_error(err.kind(), &err);
                if let Err(write_err) = writer.write(&Outbound::Error { message_id, error }) {
                    tracing::debug!(error = %write_err, "Could not write error frame");
                }
                "error"
            }
        };

        metrics::record_request(kind, outcome, start);
    }

    fn execute(&self, request: Request, message_id: Uuid, writer: &ResponseWriter) -> Result<(), AgentError> {
        let body = match request {
            Request::OpenMessageChannel => {
                let closed = self.agent.push_channel().pump(|frame| {
                    writer.write(&match frame {
                        PushFrame::Message(message) => Outbound::Push { message },
                        PushFrame::Ping => Outbound::Ping {
                            request_id: message_id,
                        },
                    })
                });
                tracing::debug!(%message_id, reason = %closed, "Message channel ended");
                return Ok(());
            }
            request if request.affinity() == Affinity::Main => {
                let agent = Arc::clone(&self.agent);
                self.agent.main_thread().send(move || respond(&agent, request))??
            }
            request => respond(&self.agent, request)?,
        };

        let body = body.ok_or(AgentError::EmptyResult)?;
        if let Err(err) = writer.write(&Outbound::Response { message_id, body }) {
            tracing::debug!(%message_id, error = %err, "Could not write response");
        }
        Ok(())
    }
}

fn decode_request(body: &[u8]) -> Result<Option<RequestEnvelope<Request>>, CodecError> {
    let Some(raw) = decode_single::<RequestEnvelope>(body)? else {
        return Ok(None);
    };
    let payload = serde_json::from_value(raw.payload)?;
    Ok(Some(RequestEnvelope {
        message_id: raw.message_id,
        payload,
    }))
}

/// Run a request's handler against the agent.
fn respond(agent: &Agent, request: Request) -> Result<Option<ResponseBody>, AgentError> {
    let body = match request {
        Request::AgentIdentity => ResponseBody::Identity(agent.identity()),
        Request::AgentFeatures => ResponseBody::Features(agent.features()),
        Request::Evaluate(submission) => ResponseBody::Evaluation(Box::new(agent.evaluate(submission)?)),
        Request::GetObjectMembers { handle } => {
            ResponseBody::InteractiveObject(agent.object_members(handle)?)
        }
        Request::Interact { handle, message } => match agent.interact(handle, message)? {
            Some(proxy) => ResponseBody::InteractiveObject(proxy),
            None => return Ok(None),
        },
        Request::SetObjectMember {
            handle,
            member_name,
            value,
            return_updated_value,
        } => {
            let updated_value =
                agent.set_object_member(handle, &member_name, &value, return_updated_value)?;
            ResponseBody::SetMember(SetMemberResult {
                success: true,
                updated_value,
            })
        }
        Request::VisualTree { hierarchy_kind } => {
            ResponseBody::VisualTree(agent.visual_tree(&hierarchy_kind)?)
        }
        Request::ResetState => {
            agent.reset_state();
            ResponseBody::Ack
        }
        Request::SetLogLevel { level } => {
            agent.set_log_level(&level)?;
            ResponseBody::Ack
        }
        Request::OpenMessageChannel => return Ok(None),
    };
    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    use serde_json::{json, Value as Json};
    use tokio::sync::mpsc;

    use crate::agent::NamedValueEvaluator;
    use crate::protocol::codec::encode_frame;

    fn dispatcher() -> ProtocolDispatcher {
        let agent = Agent::builder("test", "dispatcher-tests")
            .evaluator(Arc::new(NamedValueEvaluator::new().with("answer", 42)))
            .keepalive(Duration::from_millis(50))
            .build()
            .expect("agent");
        ProtocolDispatcher::new(agent)
    }

    fn request(payload: Json) -> (Uuid, Vec<u8>) {
        let envelope = RequestEnvelope::new(payload);
        let id = envelope.message_id;
        (id, encode_frame(&envelope).expect("encode"))
    }

    fn drain(mut frames: mpsc::UnboundedReceiver<Vec<u8>>) -> Vec<Json> {
        let mut out = Vec::new();
        while let Ok(frame) = frames.try_recv() {
            out.push(decode_single::<Json>(&frame).expect("decode").expect("frame"));
        }
        out
    }

    fn run(dispatcher: &ProtocolDispatcher, body: &[u8]) -> Vec<Json> {
        let (writer, frames) = ResponseWriter::channel();
        dispatcher.dispatch(body, &writer);
        drop(writer);
        drain(frames)
    }

    #[test]
    fn well_formed_request_gets_one_response_and_sentinel() {
        let dispatcher = dispatcher();
        let (id, body) = request(json!({"type": "agent_identity"}));

        let frames = run(&dispatcher, &body);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["type"], "response");
        assert_eq!(frames[0]["message_id"], id.to_string());
        assert_eq!(frames[0]["body"]["kind"], "identity");
        assert_eq!(frames[0]["body"]["value"]["agent_type"], "test");
        assert_eq!(frames[1], json!({"type": "end_of_messages"}));
    }

    #[test]
    fn malformed_and_empty_bodies_get_only_sentinel() {
        let dispatcher = dispatcher();
        let (_, unknown) = request(json!({"type": "launch_rockets"}));
        let garbage = encode_frame(&json!({"nope": true})).expect("encode");

        for body in [unknown, garbage, Vec::new(), vec![0, 0, 0, 9, b'{']] {
            let frames = run(&dispatcher, &body);
            assert_eq!(frames, vec![json!({"type": "end_of_messages"})]);
        }
    }

    #[test]
    fn main_affinity_requests_run_on_main_context() {
        let dispatcher = dispatcher();
        let (_, body) = request(json!({"type": "evaluate", "code_cell_id": "c1", "unit": "answer"}));

        let frames = run(&dispatcher, &body);
        assert_eq!(frames[0]["body"]["kind"], "evaluation");
        let result = &frames[0]["body"]["value"]["result"]["representations"][0];
        assert_eq!(result["value"], json!({"kind": "i32", "value": 42}));
    }

    #[test]
    fn handler_failures_become_error_frames() {
        let dispatcher = dispatcher();
        let (id, body) = request(json!({"type": "get_object_members", "handle": 77}));

        let frames = run(&dispatcher, &body);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["type"], "error");
        assert_eq!(frames[0]["message_id"], id.to_string());
        assert_eq!(frames[0]["error"]["kind"], "handle_not_found");
        assert_eq!(frames[1]["type"], "end_of_messages");

        // The dispatcher keeps serving after a failure.
        let (_, body) = request(json!({"type": "agent_features"}));
        assert_eq!(run(&dispatcher, &body)[0]["type"], "response");
    }

    #[test]
    fn log_level_without_control_is_an_error() {
        let dispatcher = dispatcher();
        let (_, body) = request(json!({"type": "set_log_level", "level": "debug"}));

        let frames = run(&dispatcher, &body);
        assert_eq!(frames[0]["error"]["kind"], "logging");
    }

    #[test]
    fn message_channel_streams_pushes_and_pings() {
        let dispatcher = Arc::new(dispatcher());
        let (id, body) = request(json!({"type": "open_message_channel"}));
        let (writer, mut frames) = ResponseWriter::channel();

        dispatcher
            .agent()
            .push_channel()
            .push(crate::push::PushMessage::StateReset { generation: 4 });

        let pump = {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || dispatcher.dispatch(&body, &writer))
        };

        let first = frames.blocking_recv().expect("push frame");
        let first: Json = decode_single(&first).expect("decode").expect("frame");
        assert_eq!(first["type"], "push");
        assert_eq!(first["message"]["kind"], "state_reset");

        let second = frames.blocking_recv().expect("ping frame");
        let second: Json = decode_single(&second).expect("decode").expect("frame");
        assert_eq!(second, json!({"type": "ping", "request_id": id.to_string()}));

        drop(frames);
        pump.join().expect("pump thread");
    }
}
