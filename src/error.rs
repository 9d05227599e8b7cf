//! Errors surfaced to clients by request handlers.

use thiserror::Error;

use crate::affinity::AffinityError;
use crate::cache::Handle;
use crate::interactive::InteractionError;
use crate::model::ErrorValue;
use crate::observability::logging::LoggingError;
use crate::representation::RegistrationError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("handle {0} does not refer to a live object")]
    HandleNotFound(Handle),

    #[error("handle {0} does not refer to an interactive object")]
    NotInteractive(Handle),

    #[error("member '{member}' not found on {type_name}")]
    MemberNotFound { member: String, type_name: String },

    #[error("member '{0}' is read-only")]
    MemberReadOnly(String),

    #[error("cannot convert {value} to {target_type} for member '{member}'")]
    Conversion {
        member: String,
        target_type: String,
        value: String,
    },

    #[error("no evaluator is attached to this agent")]
    NoEvaluator,

    #[error("no view hierarchy provider is attached to this agent")]
    NoViewHierarchy,

    #[error("unknown view hierarchy '{0}'")]
    UnknownHierarchy(String),

    #[error("handler produced no result")]
    EmptyResult,

    #[error(transparent)]
    Affinity(#[from] AffinityError),

    #[error(transparent)]
    Interaction(#[from] InteractionError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("{0}")]
    Runtime(#[from] ErrorValue),
}

impl AgentError {
    /// Short machine-readable category sent in error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::HandleNotFound(_) => "handle_not_found",
            AgentError::NotInteractive(_) => "not_interactive",
            AgentError::MemberNotFound { .. } => "member_not_found",
            AgentError::MemberReadOnly(_) => "member_read_only",
            AgentError::Conversion { .. } => "conversion",
            AgentError::NoEvaluator => "no_evaluator",
            AgentError::NoViewHierarchy | AgentError::UnknownHierarchy(_) => "view_hierarchy",
            AgentError::EmptyResult => "empty_result",
            AgentError::Affinity(_) => "affinity",
            AgentError::Interaction(_) => "interaction",
            AgentError::Registration(_) => "registration",
            AgentError::Logging(_) => "logging",
            AgentError::Runtime(_) => "runtime",
        }
    }
}
