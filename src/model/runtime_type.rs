//! Runtime type descriptors.
//!
//! # Responsibilities
//! - Give every inspectable type an identity (`TypeHandle`) independent of its name
//! - Describe the base-type chain and implemented interfaces used by dispatch
//! - Carry the member-descriptor table consumed by reflective proxies
//!
//! # Design Decisions
//! - Types are built once through `RuntimeTypeBuilder` and shared as `Arc`
//! - Identity is the handle; two distinct types may share a display name
//! - `interfaces` is the flattened implemented-interface set, so an interface
//!   inherited through another interface is listed explicitly

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::member::MemberDescriptor;
use super::value::Integral;

/// Global counter for type handles. Only uniqueness matters.
static TYPE_HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeHandle(u64);

impl TypeHandle {
    fn next() -> Self {
        Self(TYPE_HANDLE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw handle value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type-{}", self.0)
    }
}

/// Broad classification of a runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Delegate,
    /// A pending asynchronous computation. Its `Result` member blocks.
    Task,
    Primitive,
}

/// Storage kind of an enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegralKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
}

impl IntegralKind {
    /// Width of the storage in bytes.
    pub fn size(&self) -> u8 {
        match self {
            IntegralKind::I8 | IntegralKind::U8 => 1,
            IntegralKind::I16 | IntegralKind::U16 => 2,
            IntegralKind::I32 | IntegralKind::U32 => 4,
            IntegralKind::I64 | IntegralKind::U64 => 8,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            IntegralKind::I8 | IntegralKind::I16 | IntegralKind::I32 | IntegralKind::I64
        )
    }
}

/// Enumeration metadata for types of kind [`TypeKind::Enum`].
#[derive(Debug, Clone)]
pub struct EnumInfo {
    pub underlying: IntegralKind,
    pub is_flags: bool,
    pub variants: Vec<(String, Integral)>,
}

impl EnumInfo {
    /// Name of the variant holding exactly `value`, if any.
    pub fn name_of(&self, value: Integral) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| name.as_str())
    }
}

/// Shared reference to a runtime type.
pub type TypeRef = Arc<RuntimeType>;

/// Descriptor of one inspectable type.
pub struct RuntimeType {
    handle: TypeHandle,
    name: String,
    kind: TypeKind,
    base: Option<TypeRef>,
    interfaces: Vec<TypeRef>,
    members: Vec<MemberDescriptor>,
    enum_info: Option<EnumInfo>,
}

impl RuntimeType {
    /// Start building a class type.
    pub fn class(name: impl Into<String>) -> RuntimeTypeBuilder {
        RuntimeTypeBuilder::new(name, TypeKind::Class)
    }

    /// Start building an interface type.
    pub fn interface(name: impl Into<String>) -> RuntimeTypeBuilder {
        RuntimeTypeBuilder::new(name, TypeKind::Interface)
    }

    /// Start building a type of any kind.
    pub fn builder(name: impl Into<String>, kind: TypeKind) -> RuntimeTypeBuilder {
        RuntimeTypeBuilder::new(name, kind)
    }

    pub fn handle(&self) -> TypeHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn base(&self) -> Option<&TypeRef> {
        self.base.as_ref()
    }

    /// Every interface implemented by this type.
    pub fn interfaces(&self) -> &[TypeRef] {
        &self.interfaces
    }

    /// Members declared directly on this type.
    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    pub fn enum_info(&self) -> Option<&EnumInfo> {
        self.enum_info.as_ref()
    }

    /// This type followed by each base type, most-derived first.
    pub fn ancestry(self: &Arc<Self>) -> Vec<TypeRef> {
        let mut chain = vec![Arc::clone(self)];
        let mut current = self.base.clone();
        while let Some(ty) = current {
            current = ty.base.clone();
            chain.push(ty);
        }
        chain
    }

    /// Whether this type, or any base type, declares at least one member.
    pub fn has_members(self: &Arc<Self>) -> bool {
        self.ancestry().iter().any(|ty| !ty.members.is_empty())
    }

    /// Interfaces of this type that no other implemented interface inherits.
    pub fn most_derived_interfaces(&self) -> Vec<TypeRef> {
        let inherited: HashSet<TypeHandle> = self
            .interfaces
            .iter()
            .flat_map(|iface| iface.interfaces.iter().map(|it| it.handle))
            .collect();

        self.interfaces
            .iter()
            .filter(|iface| !inherited.contains(&iface.handle))
            .cloned()
            .collect()
    }

    /// Whether a value of this type can be used where `other` is expected.
    pub fn is_assignable_to(&self, other: &RuntimeType) -> bool {
        if self.handle == other.handle {
            return true;
        }
        if self.interfaces.iter().any(|iface| iface.handle == other.handle) {
            return true;
        }
        match &self.base {
            Some(base) => base.is_assignable_to(other),
            None => false,
        }
    }

    /// Find a member by name, searching from the most-derived type upward.
    pub fn find_member(self: &Arc<Self>, name: &str) -> Option<MemberDescriptor> {
        self.ancestry()
            .iter()
            .find_map(|ty| ty.members.iter().find(|m| m.name() == name).cloned())
    }
}

impl PartialEq for RuntimeType {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for RuntimeType {}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeType")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base", &self.base.as_ref().map(|b| b.name.as_str()))
            .field("members", &self.members.len())
            .finish()
    }
}

/// Explicit registration of a runtime type and its member table.
pub struct RuntimeTypeBuilder {
    name: String,
    kind: TypeKind,
    base: Option<TypeRef>,
    interfaces: Vec<TypeRef>,
    members: Vec<MemberDescriptor>,
    enum_info: Option<EnumInfo>,
}

impl RuntimeTypeBuilder {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            base: None,
            interfaces: Vec::new(),
            members: Vec::new(),
            enum_info: None,
        }
    }

    /// Set the base type. Interfaces of the base are inherited.
    pub fn base(mut self, base: &TypeRef) -> Self {
        self.base = Some(Arc::clone(base));
        self
    }

    /// Declare an implemented interface (and everything it inherits).
    pub fn implements(mut self, iface: &TypeRef) -> Self {
        self.push_interface(iface);
        for inherited in iface.interfaces() {
            self.push_interface(inherited);
        }
        self
    }

    fn push_interface(&mut self, iface: &TypeRef) {
        if !self.interfaces.iter().any(|it| it.handle() == iface.handle()) {
            self.interfaces.push(Arc::clone(iface));
        }
    }

    /// Declare a member. The declaring type is filled in by `build`.
    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }

    /// Attach enumeration metadata and switch the kind to [`TypeKind::Enum`].
    pub fn enumeration(mut self, info: EnumInfo) -> Self {
        self.kind = TypeKind::Enum;
        self.enum_info = Some(info);
        self
    }

    pub fn build(self) -> TypeRef {
        let mut interfaces = self.interfaces;
        if let Some(base) = &self.base {
            for iface in base.interfaces() {
                if !interfaces.iter().any(|it| it.handle() == iface.handle()) {
                    interfaces.push(Arc::clone(iface));
                }
            }
        }

        let members = self
            .members
            .into_iter()
            .map(|m| m.declared_by(&self.name))
            .collect();

        Arc::new(RuntimeType {
            handle: TypeHandle::next(),
            name: self.name,
            kind: self.kind,
            base: self.base,
            interfaces,
            members,
            enum_info: self.enum_info,
        })
    }
}
