//! Built-in normalization of runtime values to wire-safe representations.

use super::represented::{
    EnumValue, ExceptionNode, MemberValueErrorNode, Repr, TypeNode, WordSizedNumber,
};
use crate::model::Value;

/// The value itself, if it is already wire-safe.
pub fn raw(value: &Value) -> Option<Repr> {
    Some(match value {
        Value::Bool(v) => Repr::Bool(*v),
        Value::Char(v) => Repr::Char(*v),
        Value::I8(v) => Repr::I8(*v),
        Value::U8(v) => Repr::U8(*v),
        Value::I16(v) => Repr::I16(*v),
        Value::U16(v) => Repr::U16(*v),
        Value::I32(v) => Repr::I32(*v),
        Value::U32(v) => Repr::U32(*v),
        Value::I64(v) => Repr::I64(*v),
        Value::U64(v) => Repr::U64(*v),
        Value::F32(v) => Repr::F32(*v),
        Value::F64(v) => Repr::F64(*v),
        Value::String(v) => Repr::String(v.clone()),
        Value::Bytes(v) => Repr::Bytes(v.clone()),
        Value::Duration(v) => Repr::Duration(*v),
        Value::Guid(v) => Repr::Guid(*v),
        _ => return None,
    })
}

/// Map a value to its canonical representation.
///
/// Objects that do not opt in to serialization have none; they are only
/// reachable through interactive proxies.
pub fn normalize(value: &Value) -> Option<Repr> {
    if let Some(repr) = raw(value) {
        return Some(repr);
    }

    match value {
        Value::Enum(instance) => Some(Repr::Enum(EnumValue::from_instance(instance))),
        Value::Error(err) => Some(Repr::Exception(ExceptionNode::from(err))),
        Value::Type(ty) => Some(Repr::Type(TypeNode::from(ty))),
        Value::Pointer(p) => Some(Repr::Word(WordSizedNumber::from(*p))),
        Value::MemberError(err) => Some(Repr::MemberValueError(MemberValueErrorNode::from(err))),
        Value::Proxy(proxy) => Some(Repr::Proxy(proxy.clone())),
        Value::Object(obj) => obj.to_serializable().map(Repr::Json),
        _ => None,
    }
}
