//! Dynamic values flowing through the representation pipeline.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::object::{ObjectRef, RuntimeObject};
use super::runtime_type::{IntegralKind, TypeRef};
use super::well_known;
use crate::interactive::ProxyRef;

/// An integral value of either signedness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Integral {
    Signed(i64),
    Unsigned(u64),
}

impl fmt::Display for Integral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Integral::Signed(v) => write!(f, "{v}"),
            Integral::Unsigned(v) => write!(f, "{v}"),
        }
    }
}

/// A native-word-sized integer (pointer or handle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pointer {
    pub value: u64,
    pub signed: bool,
}

/// An enumeration instance together with its type.
#[derive(Debug, Clone)]
pub struct EnumInstance {
    pub ty: TypeRef,
    pub value: Integral,
}

/// An error raised by inspected code, a runtime "exception".
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorValue {
    pub type_name: String,
    pub message: String,
    pub stack_trace: Option<String>,
    pub inner: Option<Arc<ErrorValue>>,
}

impl ErrorValue {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack_trace: None,
            inner: None,
        }
    }

    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }

    pub fn caused_by(mut self, inner: ErrorValue) -> Self {
        self.inner = Some(Arc::new(inner));
        self
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

impl StdError for ErrorValue {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}

/// Placeholder for a member (or element) whose read failed.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberValueError {
    pub error: Option<ErrorValue>,
}

impl MemberValueError {
    pub fn new(error: ErrorValue) -> Self {
        Self { error: Some(error) }
    }
}

/// A dynamically-typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
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
    Pointer(Pointer),
    Enum(EnumInstance),
    Error(ErrorValue),
    Type(TypeRef),
    MemberError(MemberValueError),
    Proxy(ProxyRef),
    Object(ObjectRef),
}

impl Value {
    /// Wrap a runtime object.
    pub fn object(obj: impl RuntimeObject) -> Self {
        Value::Object(Arc::new(obj))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// The value's runtime type. Null has none.
    pub fn runtime_type(&self) -> Option<TypeRef> {
        let types = well_known::types();
        let ty = match self {
            Value::Null => return None,
            Value::Bool(_) => &types.boolean,
            Value::Char(_) => &types.char,
            Value::I8(_) => &types.int8,
            Value::U8(_) => &types.uint8,
            Value::I16(_) => &types.int16,
            Value::U16(_) => &types.uint16,
            Value::I32(_) => &types.int32,
            Value::U32(_) => &types.uint32,
            Value::I64(_) => &types.int64,
            Value::U64(_) => &types.uint64,
            Value::F32(_) => &types.float32,
            Value::F64(_) => &types.float64,
            Value::String(_) => &types.string,
            Value::Bytes(_) => &types.bytes,
            Value::Duration(_) => &types.duration,
            Value::Guid(_) => &types.guid,
            Value::Pointer(p) if p.signed => &types.intptr,
            Value::Pointer(_) => &types.uintptr,
            Value::Enum(e) => &e.ty,
            Value::Error(_) => &types.error,
            Value::Type(_) => &types.type_,
            Value::MemberError(_) => &types.member_error,
            Value::Proxy(_) => &types.interactive_object,
            Value::Object(obj) => return Some(obj.runtime_type()),
        };
        Some(Arc::clone(ty))
    }

    /// Name of the runtime type, or `"null"`.
    pub fn type_name(&self) -> String {
        self.runtime_type()
            .map(|ty| ty.name().to_string())
            .unwrap_or_else(|| "null".to_string())
    }

    /// Textual form of the value, as its own `to_string` would render it.
    pub fn display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(v) => (if *v { "True" } else { "False" }).to_string(),
            Value::Char(v) => v.to_string(),
            Value::I8(v) => v.to_string(),
            Value::U8(v) => v.to_string(),
            Value::I16(v) => v.to_string(),
            Value::U16(v) => v.to_string(),
            Value::I32(v) => v.to_string(),
            Value::U32(v) => v.to_string(),
            Value::I64(v) => v.to_string(),
            Value::U64(v) => v.to_string(),
            Value::F32(v) => v.to_string(),
            Value::F64(v) => v.to_string(),
            Value::String(v) => v.clone(),
            Value::Bytes(v) => format!("byte[{}]", v.len()),
            Value::Duration(v) => format!("{v:?}"),
            Value::Guid(v) => v.to_string(),
            Value::Pointer(p) => p.value.to_string(),
            Value::Enum(e) => e
                .ty
                .enum_info()
                .and_then(|info| info.name_of(e.value))
                .map(str::to_string)
                .unwrap_or_else(|| e.value.to_string()),
            Value::Error(e) => e.to_string(),
            Value::Type(t) => t.name().to_string(),
            Value::MemberError(_) => self.type_name(),
            Value::Proxy(_) => self.type_name(),
            Value::Object(obj) => obj
                .display()
                .unwrap_or_else(|| obj.runtime_type().name().to_string()),
        }
    }

    /// Coerce a client-supplied JSON value into a value of `target`.
    ///
    /// Returns `None` when no lossless conversion exists.
    pub fn from_json(json: &serde_json::Value, target: &TypeRef) -> Option<Value> {
        let types = well_known::types();
        let handle = target.handle();

        if json.is_null() {
            return Some(Value::Null);
        }
        if handle == types.boolean.handle() {
            return json.as_bool().map(Value::Bool);
        }
        if handle == types.string.handle() {
            return json.as_str().map(|s| Value::String(s.to_string()));
        }
        if handle == types.char.handle() {
            let s = json.as_str()?;
            let mut chars = s.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) => Some(Value::Char(c)),
                _ => None,
            };
        }
        if handle == types.float64.handle() {
            return json.as_f64().map(Value::F64);
        }
        if handle == types.float32.handle() {
            return json.as_f64().map(|v| Value::F32(v as f32));
        }
        if handle == types.guid.handle() {
            return json.as_str().and_then(|s| s.parse().ok()).map(Value::Guid);
        }

        macro_rules! integral {
            ($($field:ident => $variant:ident : $ty:ty),* $(,)?) => {
                $(
                    if handle == types.$field.handle() {
                        return json
                            .as_i64()
                            .and_then(|v| <$ty>::try_from(v).ok())
                            .or_else(|| json.as_u64().and_then(|v| <$ty>::try_from(v).ok()))
                            .map(Value::$variant);
                    }
                )*
            };
        }
        integral!(
            int8 => I8: i8,
            uint8 => U8: u8,
            int16 => I16: i16,
            uint16 => U16: u16,
            int32 => I32: i32,
            uint32 => U32: u32,
            int64 => I64: i64,
            uint64 => U64: u64,
        );

        if let Some(info) = target.enum_info() {
            let value = match json {
                serde_json::Value::String(name) => info
                    .variants
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| *v)?,
                other => {
                    if info.underlying.is_signed() {
                        Integral::Signed(other.as_i64()?)
                    } else {
                        Integral::Unsigned(other.as_u64()?)
                    }
                }
            };
            return Some(Value::Enum(EnumInstance {
                ty: Arc::clone(target),
                value,
            }));
        }

        None
    }

    /// Storage kind for integral values.
    pub fn integral_kind(&self) -> Option<IntegralKind> {
        match self {
            Value::I8(_) => Some(IntegralKind::I8),
            Value::U8(_) => Some(IntegralKind::U8),
            Value::I16(_) => Some(IntegralKind::I16),
            Value::U16(_) => Some(IntegralKind::U16),
            Value::I32(_) => Some(IntegralKind::I32),
            Value::U32(_) => Some(IntegralKind::U32),
            Value::I64(_) => Some(IntegralKind::I64),
            Value::U64(_) => Some(IntegralKind::U64),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Object(obj) => write!(f, "Object({})", obj.runtime_type().name()),
            Value::Proxy(proxy) => write!(f, "Proxy({proxy:?})"),
            Value::Type(ty) => write!(f, "Type({})", ty.name()),
            Value::Enum(e) => write!(f, "Enum({}::{})", e.ty.name(), e.value),
            Value::Error(e) => write!(f, "Error({e})"),
            Value::MemberError(e) => write!(f, "MemberError({:?})", e.error),
            other => write!(f, "{}({})", other.type_name(), other.display_string()),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from!(
    bool => Bool,
    char => Char,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    Vec<u8> => Bytes,
    Duration => Duration,
    Uuid => Guid,
    ErrorValue => Error,
    TypeRef => Type,
    ObjectRef => Object,
    ProxyRef => Proxy,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EnumInfo, RuntimeType};

    #[test]
    fn primitives_have_well_known_types() {
        let types = well_known::types();
        assert_eq!(
            Value::I32(4).runtime_type().map(|t| t.handle()),
            Some(types.int32.handle())
        );
        assert!(Value::Null.runtime_type().is_none());
    }

    #[test]
    fn from_json_respects_target_range() {
        let types = well_known::types();
        assert!(matches!(
            Value::from_json(&serde_json::json!(200), &types.uint8),
            Some(Value::U8(200))
        ));
        assert!(Value::from_json(&serde_json::json!(300), &types.uint8).is_none());
        assert!(Value::from_json(&serde_json::json!("x"), &types.int32).is_none());
    }

    #[test]
    fn from_json_resolves_enum_names() {
        let color = RuntimeType::class("Demo.Color")
            .enumeration(EnumInfo {
                underlying: IntegralKind::I32,
                is_flags: false,
                variants: vec![
                    ("Red".into(), Integral::Signed(0)),
                    ("Blue".into(), Integral::Signed(2)),
                ],
            })
            .build();

        let value = Value::from_json(&serde_json::json!("Blue"), &color).expect("enum value");
        assert_eq!(value.display_string(), "Blue");
    }

    #[test]
    fn error_values_chain_sources() {
        let err = ErrorValue::new("Outer", "boom").caused_by(ErrorValue::new("Inner", "root"));
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Inner: root"));
    }
}
