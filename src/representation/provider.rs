//! Extension points for representation providers.

use std::sync::Arc;

use thiserror::Error;

use super::represented::Repr;
use crate::cache::{TypeKey, TypeMap};
use crate::model::{ErrorValue, MemberDescriptor, TypeRef, Value};

/// Failure inside a provider. Always isolated to that provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Runtime(#[from] ErrorValue),
}

/// A value offered by a provider as an additional representation.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub value: Value,
    pub can_edit: bool,
}

impl Candidate {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            can_edit: false,
        }
    }

    pub fn editable(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            can_edit: true,
        }
    }
}

/// Contributes representations and vetoes for values it understands.
///
/// Every method has a neutral default, so a provider implements only
/// what it cares about.
pub trait RepresentationProvider: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn provide_representations(&self, _value: &Value) -> Result<Vec<Candidate>, ProviderError> {
        Ok(Vec::new())
    }

    /// Veto enumerable proxies for `value`.
    fn has_sensible_enumerator(&self, _value: &Value) -> Result<bool, ProviderError> {
        Ok(true)
    }

    /// Veto reflective proxies for `value`.
    fn should_reflect(&self, _value: &Value) -> Result<bool, ProviderError> {
        Ok(true)
    }

    /// Veto reading one member of `target`.
    fn should_read_member(
        &self,
        _member: &MemberDescriptor,
        _target: &Value,
    ) -> Result<bool, ProviderError> {
        Ok(true)
    }

    /// Convert a client-supplied value into a runtime value of `target_type`.
    fn try_convert_from_representation(
        &self,
        _target_type: &TypeRef,
        _representation: &serde_json::Value,
    ) -> Option<Value> {
        None
    }
}

/// A provider that can also take over normalization.
///
/// At most one may be registered with a pipeline. When its normalizer
/// returns a representation the built-in normalizer is skipped.
pub trait AgentRepresentationProvider: RepresentationProvider {
    fn normalize(&self, value: &Value) -> Result<Option<Repr>, ProviderError>;
}

/// Representation function registered for a type.
pub type RepresentFn = Arc<dyn Fn(&Value) -> Result<Option<Candidate>, ProviderError> + Send + Sync>;

/// Handler kinds a [`TypeMapProvider`] dispatches to.
#[derive(Clone)]
pub enum TypeHandler {
    /// Produce an extra representation.
    Represent(RepresentFn),
    /// Suppress reflective proxies for the type.
    SuppressReflection,
    /// Suppress enumerable proxies for the type.
    SuppressEnumeration,
}

/// Provider that dispatches on the value's runtime type.
pub struct TypeMapProvider {
    name: String,
    handlers: TypeMap<TypeHandler>,
}

impl TypeMapProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: TypeMap::new(),
        }
    }

    /// Register a handler. Later registrations run first.
    pub fn add_handler(&self, key: impl Into<TypeKey>, exact_match_required: bool, handler: TypeHandler) {
        self.handlers.add(key, exact_match_required, handler);
    }

    /// Register a representation function.
    pub fn add_representer<F>(&self, key: impl Into<TypeKey>, exact_match_required: bool, f: F)
    where
        F: Fn(&Value) -> Result<Option<Candidate>, ProviderError> + Send + Sync + 'static,
    {
        self.add_handler(key, exact_match_required, TypeHandler::Represent(Arc::new(f)));
    }

    pub fn handlers(&self) -> &TypeMap<TypeHandler> {
        &self.handlers
    }

    fn handlers_for(&self, value: &Value) -> Vec<TypeHandler> {
        value
            .runtime_type()
            .map(|ty| self.handlers.lookup(&ty))
            .unwrap_or_default()
    }
}

impl RepresentationProvider for TypeMapProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn provide_representations(&self, value: &Value) -> Result<Vec<Candidate>, ProviderError> {
        let mut candidates = Vec::new();
        for handler in self.handlers_for(value) {
            if let TypeHandler::Represent(f) = handler {
                candidates.extend(f(value)?);
            }
        }
        Ok(candidates)
    }

    fn has_sensible_enumerator(&self, value: &Value) -> Result<bool, ProviderError> {
        Ok(!self
            .handlers_for(value)
            .iter()
            .any(|h| matches!(h, TypeHandler::SuppressEnumeration)))
    }

    fn should_reflect(&self, value: &Value) -> Result<bool, ProviderError> {
        Ok(!self
            .handlers_for(value)
            .iter()
            .any(|h| matches!(h, TypeHandler::SuppressReflection)))
    }
}
