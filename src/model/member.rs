//! Member descriptors: explicit accessors registered per type.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::object::RuntimeObject;
use super::runtime_type::{TypeKind, TypeRef};
use super::value::{ErrorValue, Value};

/// Reads a member from a target object.
pub type Getter = Arc<dyn Fn(&dyn RuntimeObject) -> Result<Value, ErrorValue> + Send + Sync>;

/// Writes a member on a target object.
pub type Setter = Arc<dyn Fn(&dyn RuntimeObject, Value) -> Result<(), ErrorValue> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Property,
    Field,
}

/// Browsability hints attached to a member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberFlags {
    /// Never shown to clients.
    pub never_browsable: bool,
    /// Only shown in advanced views, which the agent does not offer.
    pub advanced: bool,
}

/// One readable (and optionally writable) member of a runtime type.
#[derive(Clone)]
pub struct MemberDescriptor {
    name: String,
    declaring_type: String,
    member_type: TypeRef,
    kind: MemberKind,
    flags: MemberFlags,
    getter: Getter,
    setter: Option<Setter>,
}

impl MemberDescriptor {
    pub fn property<F>(name: impl Into<String>, member_type: &TypeRef, getter: F) -> Self
    where
        F: Fn(&dyn RuntimeObject) -> Result<Value, ErrorValue> + Send + Sync + 'static,
    {
        Self::new(name, member_type, MemberKind::Property, Arc::new(getter))
    }

    pub fn field<F>(name: impl Into<String>, member_type: &TypeRef, getter: F) -> Self
    where
        F: Fn(&dyn RuntimeObject) -> Result<Value, ErrorValue> + Send + Sync + 'static,
    {
        Self::new(name, member_type, MemberKind::Field, Arc::new(getter))
    }

    fn new(name: impl Into<String>, member_type: &TypeRef, kind: MemberKind, getter: Getter) -> Self {
        Self {
            name: name.into(),
            declaring_type: String::new(),
            member_type: Arc::clone(member_type),
            kind,
            flags: MemberFlags::default(),
            getter,
            setter: None,
        }
    }

    pub fn with_setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&dyn RuntimeObject, Value) -> Result<(), ErrorValue> + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    pub fn never_browsable(mut self) -> Self {
        self.flags.never_browsable = true;
        self
    }

    pub fn advanced(mut self) -> Self {
        self.flags.advanced = true;
        self
    }

    pub(crate) fn declared_by(mut self, type_name: &str) -> Self {
        self.declaring_type = type_name.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn member_type(&self) -> &TypeRef {
        &self.member_type
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn flags(&self) -> MemberFlags {
        self.flags
    }

    pub fn can_write(&self) -> bool {
        self.setter.is_some()
    }

    /// Whether the member's value is a callable.
    pub fn is_delegate(&self) -> bool {
        self.member_type.kind() == TypeKind::Delegate
    }

    pub fn get_value(&self, target: &dyn RuntimeObject) -> Result<Value, ErrorValue> {
        (self.getter)(target)
    }

    /// Write the member. Read-only members report an error value.
    pub fn set_value(&self, target: &dyn RuntimeObject, value: Value) -> Result<(), ErrorValue> {
        match &self.setter {
            Some(setter) => setter(target, value),
            None => Err(ErrorValue::new(
                "ReadOnlyMember",
                format!("{}.{} has no setter", self.declaring_type, self.name),
            )),
        }
    }

    /// Wire description of this member.
    pub fn info(&self) -> MemberInfo {
        MemberInfo {
            name: self.name.clone(),
            declaring_type: self.declaring_type.clone(),
            member_type: self.member_type.name().to_string(),
            kind: self.kind,
            can_write: self.can_write(),
        }
    }
}

impl fmt::Debug for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("name", &self.name)
            .field("declaring_type", &self.declaring_type)
            .field("member_type", &self.member_type.name())
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .field("can_write", &self.can_write())
            .finish()
    }
}

/// Serializable member metadata sent alongside member values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberInfo {
    pub name: String,
    pub declaring_type: String,
    pub member_type: String,
    pub kind: MemberKind,
    pub can_write: bool,
}
