//! The representation pipeline.
//!
//! # Data Flow
//! ```text
//! prepare(value)
//!   → original value            (when yield_original and wire-safe)
//!   → normalized value          (agent provider first, then built-in)
//!   → textual renderings
//!   → each provider's candidates, normalized
//!   → interactive proxies       (unless disabled or a provider flagged a read error)
//! ```

use std::sync::Arc;

use thiserror::Error;

use super::normalize;
use super::provider::{AgentRepresentationProvider, Candidate, RepresentationProvider};
use super::represented::{Repr, Representation, RepresentedObject, RepresentedType};
use super::to_string::ToStringRepresentation;
use crate::affinity::{AffinityError, MainThread};
use crate::cache::IdentityCache;
use crate::interactive::{ItemPreparer, ProxyRef, DEFAULT_SLICE_SIZE};
use crate::model::{MemberDescriptor, ObjectRef, TypeKind, TypeRef, Value};

/// Pipeline switches.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Require registration calls to come from the main context.
    pub enforce_main_thread: bool,
    /// Also emit the original value when it is wire-safe.
    pub yield_original: bool,
    /// Generate interactive proxies.
    pub yield_interactive: bool,
    /// Elements per enumerable slice.
    pub slice_size: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            enforce_main_thread: true,
            yield_original: false,
            yield_interactive: true,
            slice_size: DEFAULT_SLICE_SIZE,
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Affinity(#[from] AffinityError),

    #[error("an agent representation provider is already registered ({0})")]
    AgentProviderAlreadyRegistered(String),
}

/// Turns runtime values into ordered representation lists.
pub struct RepresentationPipeline {
    options: PipelineOptions,
    providers: Vec<Arc<dyn RepresentationProvider>>,
    agent_provider: Option<Arc<dyn AgentRepresentationProvider>>,
    identity: Arc<IdentityCache>,
    main_thread: Option<Arc<MainThread>>,
}

impl RepresentationPipeline {
    pub fn new(identity: Arc<IdentityCache>, options: PipelineOptions) -> Self {
        Self {
            options,
            providers: Vec::new(),
            agent_provider: None,
            identity,
            main_thread: None,
        }
    }

    /// Check registration affinity against `main_thread`.
    pub fn with_main_thread(mut self, main_thread: Arc<MainThread>) -> Self {
        self.main_thread = Some(main_thread);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    fn ensure_affinity(&self, caller: &str) -> Result<(), AffinityError> {
        match &self.main_thread {
            Some(main) if self.options.enforce_main_thread => main.ensure(caller),
            _ => Ok(()),
        }
    }

    pub fn add_provider(&mut self, provider: Arc<dyn RepresentationProvider>) -> Result<(), RegistrationError> {
        self.ensure_affinity("add_provider")?;
        tracing::debug!(provider = %provider.name(), "Registered representation provider");
        self.providers.push(provider);
        Ok(())
    }

    /// Register the single provider allowed to replace normalization.
    pub fn add_agent_provider<P>(&mut self, provider: Arc<P>) -> Result<(), RegistrationError>
    where
        P: AgentRepresentationProvider + 'static,
    {
        self.ensure_affinity("add_agent_provider")?;
        if let Some(existing) = &self.agent_provider {
            return Err(RegistrationError::AgentProviderAlreadyRegistered(
                existing.name().to_string(),
            ));
        }

        tracing::debug!(provider = %provider.name(), "Registered agent representation provider");
        self.agent_provider = Some(Arc::clone(&provider) as Arc<dyn AgentRepresentationProvider>);
        self.providers.push(provider);
        Ok(())
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Representations of `value`, or `None` for null.
    pub fn prepare(&self, value: &Value) -> Result<Option<RepresentedObject>, AffinityError> {
        self.ensure_affinity("prepare")?;
        Ok(self.prepare_at(0, value))
    }

    fn prepare_at(&self, depth: usize, value: &Value) -> Option<RepresentedObject> {
        if value.is_null() {
            return None;
        }

        let mut represented = RepresentedObject::new(
            value.runtime_type().as_ref().map(RepresentedType::from),
        );

        if self.options.yield_original {
            represented.add_repr(normalize::raw(value));
        }
        represented.add_repr(self.normalize(value));
        represented.add_repr(ToStringRepresentation::from_value(value).map(Repr::ToString));

        let mut skip_interactive = !self.options.yield_interactive;

        for provider in &self.providers {
            match provider.provide_representations(value) {
                Ok(candidates) => {
                    for candidate in candidates {
                        if matches!(candidate.value, Value::MemberError(_)) {
                            skip_interactive = true;
                        }
                        represented.add(self.normalize_candidate(candidate));
                    }
                }
                Err(err) => {
                    tracing::error!(
                        provider = %provider.name(),
                        value_type = %value.type_name(),
                        error = %err,
                        "Representation provider failed"
                    );
                }
            }
        }

        if !skip_interactive {
            for proxy in self.interactive_proxies(depth, value) {
                represented.add_repr(Some(Repr::Proxy(proxy)));
            }
        }

        Some(represented)
    }

    /// Canonical representation, letting the agent provider go first.
    pub fn normalize(&self, value: &Value) -> Option<Repr> {
        if value.is_null() {
            return None;
        }

        if let Some(agent) = &self.agent_provider {
            match agent.normalize(value) {
                Ok(Some(repr)) => return Some(repr),
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(
                        provider = %agent.name(),
                        error = %err,
                        "Agent normalizer failed"
                    );
                }
            }
        }

        normalize::normalize(value)
    }

    /// Normalize a provider candidate. Editability survives only when
    /// normalization left the value unchanged.
    fn normalize_candidate(&self, candidate: Candidate) -> Option<Representation> {
        let unchanged = normalize::raw(&candidate.value);
        let normalized = self.normalize(&candidate.value)?;
        let can_edit = candidate.can_edit
            && unchanged.is_some_and(|raw| raw.same_value(&normalized));
        Some(Representation {
            value: normalized,
            can_edit,
        })
    }

    fn interactive_proxies(&self, depth: usize, value: &Value) -> Vec<ProxyRef> {
        let Value::Object(obj) = value else {
            return Vec::new();
        };

        let mut proxies = Vec::new();

        if self.has_sensible_enumerator(value, obj) {
            let proxy = ProxyRef::enumerable(Arc::clone(obj), depth, self.options.slice_size, &self.identity);
            proxy.initialize(self);
            proxies.push(proxy);
        }

        if self.should_reflect(value) {
            let proxy = ProxyRef::reflective(Arc::clone(obj), depth, &self.identity);
            proxy.initialize(self);
            proxies.push(proxy);
        }

        proxies
    }

    fn has_sensible_enumerator(&self, value: &Value, obj: &ObjectRef) -> bool {
        let vetoed = self.providers.iter().any(|provider| {
            match provider.has_sensible_enumerator(value) {
                Ok(sensible) => !sensible,
                Err(err) => {
                    tracing::error!(provider = %provider.name(), error = %err, "Enumerator check failed");
                    false
                }
            }
        });

        !vetoed && obj.enumerate().is_some()
    }

    fn should_reflect(&self, value: &Value) -> bool {
        !self.providers.iter().any(|provider| match provider.should_reflect(value) {
            Ok(reflect) => !reflect,
            Err(err) => {
                tracing::error!(provider = %provider.name(), error = %err, "Reflection check failed");
                false
            }
        })
    }

    /// A root reflective proxy for `obj`, expanded.
    pub fn interactive_object(&self, obj: &ObjectRef) -> ProxyRef {
        let proxy = ProxyRef::reflective(Arc::clone(obj), 0, &self.identity);
        proxy.initialize(self);
        proxy
    }

    /// Convert a client-supplied value, asking providers in order.
    pub fn try_convert_from_representation(
        &self,
        target_type: &TypeRef,
        representation: &serde_json::Value,
    ) -> Option<Value> {
        self.providers
            .iter()
            .find_map(|provider| provider.try_convert_from_representation(target_type, representation))
    }
}

/// Built-in member visibility rules.
fn is_browsable(member: &MemberDescriptor, declaring_type: &TypeRef) -> bool {
    let flags = member.flags();
    if flags.never_browsable || flags.advanced {
        return false;
    }
    if member.is_delegate() {
        return false;
    }
    // Reading a pending task's result blocks.
    !(declaring_type.kind() == TypeKind::Task && member.name() == "Result")
}

impl ItemPreparer for RepresentationPipeline {
    fn prepare_item(&self, depth: usize, value: &Value) -> Option<RepresentedObject> {
        self.prepare_at(depth, value)
    }

    fn include_member(&self, member: &MemberDescriptor, declaring_type: &TypeRef, target: &Value) -> bool {
        if !is_browsable(member, declaring_type) {
            return false;
        }

        self.providers.iter().all(|provider| {
            provider.should_read_member(member, target).unwrap_or_else(|err| {
                tracing::error!(
                    provider = %provider.name(),
                    member = %member.name(),
                    error = %err,
                    "Member filter failed"
                );
                true
            })
        })
    }
}
