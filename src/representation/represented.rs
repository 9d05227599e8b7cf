//! Wire-safe representations and the ordered container that carries them.

use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use super::to_string::ToStringRepresentation;
use crate::interactive::ProxyRef;
use crate::model::{
    EnumInstance, ErrorValue, Integral, IntegralKind, MemberValueError, Pointer, RuntimeType,
    TypeKind, TypeRef,
};

/// Name and kind of the type a representation was produced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepresentedType {
    pub name: String,
    pub kind: TypeKind,
}

impl From<&RuntimeType> for RepresentedType {
    fn from(ty: &RuntimeType) -> Self {
        Self {
            name: ty.name().to_string(),
            kind: ty.kind(),
        }
    }
}

impl From<&TypeRef> for RepresentedType {
    fn from(ty: &TypeRef) -> Self {
        Self::from(ty.as_ref())
    }
}

/// Enumeration value with its full variant table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumValue {
    pub represented_type: RepresentedType,
    pub underlying_type: IntegralKind,
    pub value: Integral,
    pub is_flags: bool,
    pub names: Vec<String>,
    pub values: Vec<Integral>,
}

impl EnumValue {
    pub fn from_instance(instance: &EnumInstance) -> Self {
        let (underlying_type, is_flags, names, values) = match instance.ty.enum_info() {
            Some(info) => (
                info.underlying,
                info.is_flags,
                info.variants.iter().map(|(n, _)| n.clone()).collect(),
                info.variants.iter().map(|(_, v)| *v).collect(),
            ),
            None => (IntegralKind::I32, false, Vec::new(), Vec::new()),
        };

        Self {
            represented_type: RepresentedType::from(&instance.ty),
            underlying_type,
            value: instance.value,
            is_flags,
            names,
            values,
        }
    }
}

/// Error chain flattened for the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExceptionNode {
    pub type_name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner: Option<Box<ExceptionNode>>,
}

impl From<&ErrorValue> for ExceptionNode {
    fn from(err: &ErrorValue) -> Self {
        Self {
            type_name: err.type_name.clone(),
            message: err.message.clone(),
            stack_trace: err.stack_trace.clone(),
            inner: err.inner.as_deref().map(|inner| Box::new(Self::from(inner))),
        }
    }
}

/// Type metadata, for values that are themselves types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeNode {
    pub name: String,
    pub kind: TypeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    pub interfaces: Vec<String>,
}

impl From<&TypeRef> for TypeNode {
    fn from(ty: &TypeRef) -> Self {
        Self {
            name: ty.name().to_string(),
            kind: ty.kind(),
            base: ty.base().map(|b| b.name().to_string()),
            interfaces: ty.interfaces().iter().map(|i| i.name().to_string()).collect(),
        }
    }
}

/// Native-word-sized number; `size` is the agent's pointer width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WordSizedNumber {
    pub value: u64,
    pub signed: bool,
    pub pointer: bool,
    pub size: u8,
}

impl From<Pointer> for WordSizedNumber {
    fn from(p: Pointer) -> Self {
        Self {
            value: p.value,
            signed: p.signed,
            pointer: true,
            size: std::mem::size_of::<usize>() as u8,
        }
    }
}

/// Marks a member whose read failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberValueErrorNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionNode>,
}

impl From<&MemberValueError> for MemberValueErrorNode {
    fn from(err: &MemberValueError) -> Self {
        Self {
            exception: err.error.as_ref().map(ExceptionNode::from),
        }
    }
}

/// One wire-safe rendering of a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Repr {
    Bool(bool),
    Char(char),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Duration(Duration),
    Guid(Uuid),
    Enum(EnumValue),
    Exception(ExceptionNode),
    Word(WordSizedNumber),
    Type(TypeNode),
    ToString(ToStringRepresentation),
    Json(serde_json::Value),
    MemberValueError(MemberValueErrorNode),
    Proxy(ProxyRef),
}

impl Repr {
    /// Equality used for de-duplication.
    ///
    /// Floats compare bitwise so NaN matches itself; proxies compare by identity.
    pub fn same_value(&self, other: &Repr) -> bool {
        match (self, other) {
            (Repr::F32(a), Repr::F32(b)) => a.to_bits() == b.to_bits(),
            (Repr::F64(a), Repr::F64(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }

    pub fn as_proxy(&self) -> Option<&ProxyRef> {
        match self {
            Repr::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }
}

/// A representation plus whether clients may edit through it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Representation {
    pub value: Repr,
    pub can_edit: bool,
}

impl Representation {
    pub fn new(value: Repr) -> Self {
        Self {
            value,
            can_edit: false,
        }
    }

    pub fn editable(value: Repr) -> Self {
        Self {
            value,
            can_edit: true,
        }
    }
}

/// Ordered, de-duplicated representations of a single value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepresentedObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub represented_type: Option<RepresentedType>,
    representations: Vec<Representation>,
}

impl RepresentedObject {
    pub fn new(represented_type: Option<RepresentedType>) -> Self {
        Self {
            represented_type,
            representations: Vec::with_capacity(2),
        }
    }

    /// Append a representation.
    ///
    /// `None` is ignored. A value equal to an existing entry replaces that
    /// entry in place, keeping its position.
    pub fn add(&mut self, representation: Option<Representation>) {
        let Some(representation) = representation else {
            return;
        };

        match self
            .representations
            .iter_mut()
            .find(|existing| existing.value.same_value(&representation.value))
        {
            Some(existing) => *existing = representation,
            None => self.representations.push(representation),
        }
    }

    /// Append a non-editable representation.
    pub fn add_repr(&mut self, value: Option<Repr>) {
        self.add(value.map(Representation::new));
    }

    pub fn get(&self, index: usize) -> Option<&Representation> {
        self.representations.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Representation> {
        self.representations.iter()
    }

    pub fn proxies(&self) -> impl Iterator<Item = &ProxyRef> {
        self.representations.iter().filter_map(|r| r.value.as_proxy())
    }

    pub fn len(&self) -> usize {
        self.representations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.representations.is_empty()
    }
}
