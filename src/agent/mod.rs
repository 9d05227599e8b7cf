//! The agent: state shared by every request handler.
//!
//! # Responsibilities
//! - Own the identity cache, representation pipeline and push channel
//! - Implement each request's semantics on top of them
//! - Hold the host-supplied evaluator, view-hierarchy and log-level hooks
//!
//! # Design Decisions
//! - Methods that touch host objects assume they run on the main context;
//!   the dispatcher marshals before calling them
//! - Provider registration marshals itself, so hosts may call it from anywhere

mod evaluation;
mod identity;
mod view;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::affinity::MainThread;
use crate::cache::{Cached, Handle, IdentityCache};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::interactive::{InteractMessage, ProxyRef};
use crate::model::{ObjectRef, Value};
use crate::observability::logging::{LogLevelControl, LoggingError};
use crate::protocol::Request;
use crate::push::{PushChannel, PushMessage, DEFAULT_KEEPALIVE};
use crate::representation::{
    AgentRepresentationProvider, ExceptionNode, PipelineOptions, RepresentationPipeline,
    RepresentationProvider, RepresentedObject, RepresentedType,
};

pub use evaluation::{
    CapturedOutput, CompiledSubmission, Evaluation, Evaluator, NamedValueEvaluator, OutputSink,
    OutputStream,
};
pub use identity::{AgentFeatures, AgentIdentity};
pub use view::{StaticViewHierarchy, ViewHierarchyProvider};

pub struct Agent {
    identity: RwLock<AgentIdentity>,
    main_thread: Arc<MainThread>,
    identity_cache: Arc<IdentityCache>,
    representations: RwLock<RepresentationPipeline>,
    push_channel: Arc<PushChannel>,
    evaluator: Option<Arc<dyn Evaluator>>,
    view_hierarchy: Option<Arc<dyn ViewHierarchyProvider>>,
    log_control: Option<Arc<dyn LogLevelControl>>,
    keepalive: Duration,
}

impl Agent {
    pub fn builder(agent_type: impl Into<String>, application_name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(agent_type, application_name)
    }

    pub fn identity(&self) -> AgentIdentity {
        self.identity.read().clone()
    }

    /// Record where the agent is listening.
    pub fn set_endpoint(&self, addr: SocketAddr) {
        let mut identity = self.identity.write();
        identity.host = addr.ip().to_string();
        identity.port = addr.port();
    }

    pub fn features(&self) -> AgentFeatures {
        AgentFeatures {
            requests: Request::KINDS.iter().map(|k| k.to_string()).collect(),
            hierarchy_kinds: self
                .view_hierarchy
                .as_ref()
                .map(|v| v.hierarchy_kinds())
                .unwrap_or_default(),
            supports_evaluation: self.evaluator.is_some(),
            slice_size: self.representations.read().options().slice_size,
            keepalive_secs: self.keepalive.as_secs(),
        }
    }

    pub fn main_thread(&self) -> &Arc<MainThread> {
        &self.main_thread
    }

    pub fn identity_cache(&self) -> &Arc<IdentityCache> {
        &self.identity_cache
    }

    pub fn push_channel(&self) -> &Arc<PushChannel> {
        &self.push_channel
    }

    /// Register a representation provider on the main context.
    pub fn add_provider(self: &Arc<Self>, provider: Arc<dyn RepresentationProvider>) -> Result<(), AgentError> {
        let agent = Arc::clone(self);
        self.main_thread
            .send(move || agent.representations.write().add_provider(provider))??;
        Ok(())
    }

    /// Register the agent-level provider on the main context.
    pub fn add_agent_provider<P>(self: &Arc<Self>, provider: Arc<P>) -> Result<(), AgentError>
    where
        P: AgentRepresentationProvider + 'static,
    {
        let agent = Arc::clone(self);
        self.main_thread
            .send(move || agent.representations.write().add_agent_provider(provider))??;
        Ok(())
    }

    /// Representations of `value`. Main context only.
    pub fn prepare(&self, value: &Value) -> Result<Option<RepresentedObject>, AgentError> {
        Ok(self.representations.read().prepare(value)?)
    }

    /// Run a submission and push the outcome to listeners.
    pub fn evaluate(&self, submission: CompiledSubmission) -> Result<Evaluation, AgentError> {
        let evaluator = self.evaluator.as_ref().ok_or(AgentError::NoEvaluator)?;

        let output = PushedOutput {
            code_cell_id: &submission.code_cell_id,
            channel: &self.push_channel,
        };
        let start = Instant::now();
        let outcome = evaluator.evaluate(&submission, &output);
        let duration_ms = start.elapsed().as_millis() as u64;

        let evaluation = match outcome {
            Ok(value) => Evaluation {
                code_cell_id: submission.code_cell_id,
                result_type: value.runtime_type().as_ref().map(RepresentedType::from),
                result: self.prepare(&value)?,
                exception: None,
                duration_ms,
            },
            Err(err) => {
                tracing::info!(code_cell_id = %submission.code_cell_id, error = %err, "Evaluation raised");
                Evaluation {
                    code_cell_id: submission.code_cell_id,
                    result_type: None,
                    result: None,
                    exception: Some(ExceptionNode::from(&err)),
                    duration_ms,
                }
            }
        };

        self.push_channel
            .push(PushMessage::Evaluation(Box::new(evaluation.clone())));
        Ok(evaluation)
    }

    fn resolve_object(&self, handle: Handle) -> Result<ObjectRef, AgentError> {
        match self.identity_cache.get(handle) {
            Some(Cached::Object(obj)) => Ok(obj),
            Some(Cached::Proxy(proxy)) => Ok(proxy.target()),
            None => Err(AgentError::HandleNotFound(handle)),
        }
    }

    /// A root reflective proxy for the object behind `handle`, expanded.
    pub fn object_members(&self, handle: Handle) -> Result<ProxyRef, AgentError> {
        let target = self.resolve_object(handle)?;
        Ok(self.representations.read().interactive_object(&target))
    }

    /// Apply a client interaction to the proxy behind `handle`.
    pub fn interact(&self, handle: Handle, message: Option<InteractMessage>) -> Result<Option<ProxyRef>, AgentError> {
        let proxy = match self.identity_cache.get(handle) {
            Some(Cached::Proxy(proxy)) => proxy,
            Some(Cached::Object(_)) => return Err(AgentError::NotInteractive(handle)),
            None => return Err(AgentError::HandleNotFound(handle)),
        };

        let pipeline = self.representations.read();
        Ok(proxy.interact(message, true, &*pipeline)?)
    }

    /// Write a member of the object behind `handle`.
    ///
    /// Returns a fresh proxy for the object when `return_updated_value` is set.
    pub fn set_object_member(
        &self,
        handle: Handle,
        member_name: &str,
        value: &serde_json::Value,
        return_updated_value: bool,
    ) -> Result<Option<ProxyRef>, AgentError> {
        let target = self.resolve_object(handle)?;
        let ty = target.runtime_type();
        let member = ty
            .find_member(member_name)
            .ok_or_else(|| AgentError::MemberNotFound {
                member: member_name.to_string(),
                type_name: ty.name().to_string(),
            })?;
        if !member.can_write() {
            return Err(AgentError::MemberReadOnly(member_name.to_string()));
        }

        let pipeline = self.representations.read();
        let converted = pipeline
            .try_convert_from_representation(member.member_type(), value)
            .or_else(|| Value::from_json(value, member.member_type()))
            .ok_or_else(|| AgentError::Conversion {
                member: member_name.to_string(),
                target_type: member.member_type().name().to_string(),
                value: value.to_string(),
            })?;

        member.set_value(&*target, converted)?;
        tracing::debug!(%handle, member = %member_name, "Member updated");

        Ok(return_updated_value.then(|| pipeline.interactive_object(&target)))
    }

    /// Representations of the root of a host view hierarchy.
    pub fn visual_tree(&self, hierarchy_kind: &str) -> Result<Option<RepresentedObject>, AgentError> {
        let provider = self
            .view_hierarchy
            .as_ref()
            .ok_or(AgentError::NoViewHierarchy)?;
        let root = provider
            .capture(hierarchy_kind)?
            .ok_or_else(|| AgentError::UnknownHierarchy(hierarchy_kind.to_string()))?;
        self.prepare(&root)
    }

    /// Reset every proxy and invalidate all handles.
    pub fn reset_state(&self) {
        let proxies = self.identity_cache.proxies();
        for proxy in &proxies {
            proxy.reset();
        }
        self.identity_cache.clear();

        let generation = self.identity_cache.generation();
        tracing::info!(proxies = proxies.len(), generation, "Agent state reset");
        self.push_channel.push(PushMessage::StateReset { generation });
    }

    pub fn set_log_level(&self, level: &str) -> Result<(), AgentError> {
        let control = self.log_control.as_ref().ok_or(LoggingError::Unavailable)?;
        control.set_level(level)?;
        tracing::info!(level = %level, "Log level changed");
        Ok(())
    }
}

/// Assembles an [`Agent`].
pub struct AgentBuilder {
    identity: AgentIdentity,
    options: PipelineOptions,
    keepalive: Duration,
    main_thread: Option<Arc<MainThread>>,
    evaluator: Option<Arc<dyn Evaluator>>,
    view_hierarchy: Option<Arc<dyn ViewHierarchyProvider>>,
    log_control: Option<Arc<dyn LogLevelControl>>,
}

impl AgentBuilder {
    fn new(agent_type: impl Into<String>, application_name: impl Into<String>) -> Self {
        Self {
            identity: AgentIdentity::new(agent_type, application_name),
            options: PipelineOptions::default(),
            keepalive: DEFAULT_KEEPALIVE,
            main_thread: None,
            evaluator: None,
            view_hierarchy: None,
            log_control: None,
        }
    }

    /// Take pipeline and push-channel settings from configuration.
    pub fn config(mut self, config: &AgentConfig) -> Self {
        self.options = config.representation.pipeline_options();
        self.keepalive = config.push_channel.keepalive();
        self
    }

    pub fn pipeline_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Use an existing main context instead of spawning one.
    pub fn main_thread(mut self, main_thread: Arc<MainThread>) -> Self {
        self.main_thread = Some(main_thread);
        self
    }

    pub fn evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn view_hierarchy(mut self, provider: Arc<dyn ViewHierarchyProvider>) -> Self {
        self.view_hierarchy = Some(provider);
        self
    }

    pub fn log_control(mut self, control: Arc<dyn LogLevelControl>) -> Self {
        self.log_control = Some(control);
        self
    }

    pub fn build(self) -> Result<Arc<Agent>, AgentError> {
        let main_thread = match self.main_thread {
            Some(main_thread) => main_thread,
            None => Arc::new(MainThread::spawn()?),
        };
        let identity_cache = Arc::new(IdentityCache::new());
        let pipeline = RepresentationPipeline::new(Arc::clone(&identity_cache), self.options)
            .with_main_thread(Arc::clone(&main_thread));

        tracing::info!(
            agent_id = %self.identity.id,
            agent_type = %self.identity.agent_type,
            application = %self.identity.application_name,
            "Agent created"
        );

        Ok(Arc::new(Agent {
            identity: RwLock::new(self.identity),
            main_thread,
            identity_cache,
            representations: RwLock::new(pipeline),
            push_channel: Arc::new(PushChannel::new(self.keepalive)),
            evaluator: self.evaluator,
            view_hierarchy: self.view_hierarchy,
            log_control: self.log_control,
            keepalive: self.keepalive,
        }))
    }
}

/// Forwards a submission's output segments to the push channel.
struct PushedOutput<'a> {
    code_cell_id: &'a str,
    channel: &'a PushChannel,
}

impl OutputSink for PushedOutput<'_> {
    fn write(&self, stream: OutputStream, text: &str) {
        self.channel.push(PushMessage::CapturedOutput(CapturedOutput {
            code_cell_id: self.code_cell_id.to_string(),
            stream,
            text: text.to_string(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{well_known, RecordObject, RecordTypeExt, RuntimeType};
    use crate::representation::{Candidate, ProviderError, Repr};

    fn on_main<T, F>(agent: &Arc<Agent>, f: F) -> T
    where
        T: Send + 'static,
        F: FnOnce(&Agent) -> T + Send + 'static,
    {
        let inner = Arc::clone(agent);
        agent.main_thread().send(move || f(&inner)).expect("main thread")
    }

    fn point() -> Value {
        let types = well_known::types();
        let ty = RuntimeType::class("Demo.Point")
            .base(&types.object)
            .record_field("X", &types.int32)
            .record_field("Y", &types.int32)
            .build();
        Value::object(RecordObject::new(&ty).with("X", 1).with("Y", 2))
    }

    fn agent() -> Arc<Agent> {
        let evaluator = NamedValueEvaluator::new().with("answer", 42).with("point", point());
        Agent::builder("test", "agent-tests")
            .evaluator(Arc::new(evaluator))
            .build()
            .expect("agent")
    }

    fn submit(unit: &str) -> CompiledSubmission {
        CompiledSubmission {
            code_cell_id: "cell-1".into(),
            unit: unit.into(),
        }
    }

    #[test]
    fn evaluation_is_returned_and_pushed() {
        let agent = agent();
        let evaluation = on_main(&agent, |a| a.evaluate(submit("answer"))).expect("evaluate");

        let result = evaluation.result.expect("result");
        assert_eq!(result.get(0).map(|r| &r.value), Some(&Repr::I32(42)));
        assert_eq!(agent.push_channel().pending(), 1);
    }

    #[test]
    fn printed_output_is_pushed_before_the_evaluation() {
        let agent = agent();
        on_main(&agent, |a| a.evaluate(submit("print hi"))).expect("evaluate");

        let channel = agent.push_channel();
        assert_eq!(channel.pending(), 2);
        match channel.next() {
            Some(PushMessage::CapturedOutput(output)) => {
                assert_eq!(output.code_cell_id, "cell-1");
                assert_eq!(output.stream, OutputStream::Stdout);
                assert_eq!(output.text, "hi\n");
            }
            other => panic!("expected captured output, got {other:?}"),
        }
        assert!(matches!(channel.next(), Some(PushMessage::Evaluation(_))));
    }

    #[test]
    fn evaluation_errors_are_captured() {
        let agent = agent();
        let evaluation = on_main(&agent, |a| a.evaluate(submit("nope"))).expect("evaluate");
        assert!(evaluation.result.is_none());
        assert_eq!(evaluation.exception.map(|e| e.type_name), Some("NameError".to_string()));
    }

    #[test]
    fn set_member_updates_object() {
        let agent = agent();
        let evaluation = on_main(&agent, |a| a.evaluate(submit("point"))).expect("evaluate");
        let proxy = evaluation
            .result
            .expect("result")
            .proxies()
            .next()
            .cloned()
            .expect("proxy");
        let (_, object_handle) = proxy.surface();

        let updated = on_main(&agent, move |a| {
            a.set_object_member(object_handle, "X", &serde_json::json!(10), true)
        })
        .expect("set member")
        .expect("updated proxy");

        let x = updated.values()[0].clone().expect("X");
        assert!(x.iter().any(|r| r.value == Repr::I32(10)));

        let err = on_main(&agent, move |a| {
            a.set_object_member(object_handle, "X", &serde_json::json!("ten"), false)
        })
        .expect_err("conversion");
        assert!(matches!(err, AgentError::Conversion { .. }));
    }

    #[test]
    fn reset_invalidates_handles() {
        let agent = agent();
        let evaluation = on_main(&agent, |a| a.evaluate(submit("point"))).expect("evaluate");
        let proxy = evaluation.result.expect("result").proxies().next().cloned().expect("proxy");
        let handle = proxy.handle();

        on_main(&agent, |a| a.reset_state());
        let err = on_main(&agent, move |a| a.interact(handle, None)).expect_err("stale handle");
        assert!(matches!(err, AgentError::HandleNotFound(_)));
    }

    struct Tagger;

    impl RepresentationProvider for Tagger {
        fn name(&self) -> &str {
            "tagger"
        }

        fn provide_representations(&self, value: &Value) -> Result<Vec<Candidate>, ProviderError> {
            Ok(match value {
                Value::I32(_) => vec![Candidate::new("tagged")],
                _ => Vec::new(),
            })
        }
    }

    #[test]
    fn providers_register_from_any_thread() {
        let agent = agent();
        agent.add_provider(Arc::new(Tagger)).expect("register");

        let represented = on_main(&agent, |a| a.prepare(&Value::I32(1)))
            .expect("prepare")
            .expect("some");
        assert!(represented.iter().any(|r| r.value == Repr::String("tagged".into())));
    }

    #[test]
    fn prepare_off_main_is_rejected() {
        let agent = agent();
        assert!(matches!(agent.prepare(&Value::I32(1)), Err(AgentError::Affinity(_))));
    }

    #[test]
    fn missing_hooks_are_reported() {
        let agent = Agent::builder("test", "bare").build().expect("agent");
        assert!(matches!(
            on_main(&agent, |a| a.evaluate(submit("x"))),
            Err(AgentError::NoEvaluator)
        ));
        assert!(matches!(
            on_main(&agent, |a| a.visual_tree("root")),
            Err(AgentError::NoViewHierarchy)
        ));
        assert!(matches!(agent.set_log_level("debug"), Err(AgentError::Logging(_))));
    }
}
