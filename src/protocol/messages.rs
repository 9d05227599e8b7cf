//! Request and response message types.

use serde::{Deserialize, Serialize};

use crate::agent::{AgentFeatures, AgentIdentity, CompiledSubmission, Evaluation};
use crate::cache::Handle;
use crate::interactive::{InteractMessage, ProxyRef};
use crate::representation::RepresentedObject;

/// Where a request's handler must run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    /// On the connection's own worker.
    Any,
    /// Marshaled to the main execution context.
    Main,
}

/// Every request the agent understands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    AgentIdentity,
    AgentFeatures,
    /// Hold the connection open and stream pushed messages.
    OpenMessageChannel,
    Evaluate(CompiledSubmission),
    GetObjectMembers {
        handle: Handle,
    },
    Interact {
        handle: Handle,
        #[serde(default)]
        message: Option<InteractMessage>,
    },
    SetObjectMember {
        handle: Handle,
        member_name: String,
        value: serde_json::Value,
        #[serde(default)]
        return_updated_value: bool,
    },
    VisualTree {
        hierarchy_kind: String,
    },
    ResetState,
    SetLogLevel {
        level: String,
    },
}

impl Request {
    /// Stable name used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::AgentIdentity => "agent_identity",
            Request::AgentFeatures => "agent_features",
            Request::OpenMessageChannel => "open_message_channel",
            Request::Evaluate(_) => "evaluate",
            Request::GetObjectMembers { .. } => "get_object_members",
            Request::Interact { .. } => "interact",
            Request::SetObjectMember { .. } => "set_object_member",
            Request::VisualTree { .. } => "visual_tree",
            Request::ResetState => "reset_state",
            Request::SetLogLevel { .. } => "set_log_level",
        }
    }

    pub fn affinity(&self) -> Affinity {
        match self {
            Request::AgentIdentity
            | Request::AgentFeatures
            | Request::OpenMessageChannel
            | Request::SetLogLevel { .. } => Affinity::Any,
            Request::Evaluate(_)
            | Request::GetObjectMembers { .. }
            | Request::Interact { .. }
            | Request::SetObjectMember { .. }
            | Request::VisualTree { .. }
            | Request::ResetState => Affinity::Main,
        }
    }

    /// Every request kind, in declaration order.
    pub const KINDS: &'static [&'static str] = &[
        "agent_identity",
        "agent_features",
        "open_message_channel",
        "evaluate",
        "get_object_members",
        "interact",
        "set_object_member",
        "visual_tree",
        "reset_state",
        "set_log_level",
    ];
}

/// Result of a member write.
#[derive(Debug, Clone, Serialize)]
pub struct SetMemberResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_value: Option<ProxyRef>,
}

/// Body of a successful response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResponseBody {
    Identity(AgentIdentity),
    Features(AgentFeatures),
    Evaluation(Box<Evaluation>),
    InteractiveObject(ProxyRef),
    SetMember(SetMemberResult),
    VisualTree(Option<RepresentedObject>),
    Ack,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_decode_from_tagged_json() {
        let request: Request = serde_json::from_value(json!({
            "type": "interact",
            "handle": 3,
            "message": {"type": "member", "member_index": 1, "representation_index": 0}
        }))
        .expect("decode");

        match request {
            Request::Interact { handle, message } => {
                assert_eq!(handle, Handle::new(3));
                assert_eq!(
                    message,
                    Some(InteractMessage::Member {
                        member_index: 1,
                        representation_index: 0
                    })
                );
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn evaluate_carries_submission_inline() {
        let request: Request = serde_json::from_value(json!({
            "type": "evaluate",
            "code_cell_id": "cell-1",
            "unit": "answer"
        }))
        .expect("decode");
        assert_eq!(request.kind(), "evaluate");
        assert_eq!(request.affinity(), Affinity::Main);
    }

    #[test]
    fn unknown_request_types_are_rejected() {
        assert!(serde_json::from_value::<Request>(json!({"type": "launch_rockets"})).is_err());
    }

    #[test]
    fn kinds_cover_every_request() {
        for kind in Request::KINDS {
            let parsed = serde_json::from_value::<Request>(json!({"type": kind}));
            if let Ok(request) = parsed {
                assert_eq!(request.kind(), *kind);
            }
        }
        assert_eq!(Request::KINDS.len(), 10);
    }
}
