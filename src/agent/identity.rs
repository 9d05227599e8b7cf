//! Agent identity and advertised features.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who this agent is and where it can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub id: Uuid,
    pub agent_type: String,
    pub application_name: String,
    pub host: String,
    pub port: u16,
}

impl AgentIdentity {
    pub fn new(agent_type: impl Into<String>, application_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_type: agent_type.into(),
            application_name: application_name.into(),
            host: String::new(),
            port: 0,
        }
    }
}

/// Capabilities a client can rely on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFeatures {
    pub requests: Vec<String>,
    pub hierarchy_kinds: Vec<String>,
    pub supports_evaluation: bool,
    pub slice_size: usize,
    pub keepalive_secs: u64,
}
