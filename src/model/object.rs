//! The object trait and two general-purpose implementations.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::member::MemberDescriptor;
use super::runtime_type::{RuntimeTypeBuilder, TypeRef};
use super::value::{ErrorValue, Value};
use super::well_known;

/// Iterator over the elements of an enumerable object.
pub type ElementIter = Box<dyn Iterator<Item = Result<Value, ErrorValue>> + Send>;

/// Shared reference to a runtime object.
pub type ObjectRef = Arc<dyn RuntimeObject>;

/// An inspectable object owned by the host application.
///
/// Objects are shared; identity is the allocation, so two `ObjectRef`s
/// pointing to the same allocation are the same object.
pub trait RuntimeObject: Send + Sync + 'static {
    fn runtime_type(&self) -> TypeRef;

    /// Custom textual form. `None` means "same as the type name".
    fn display(&self) -> Option<String> {
        None
    }

    /// Start enumerating elements. `None` if the object is not a sequence.
    fn enumerate(&self) -> Option<ElementIter> {
        None
    }

    /// Number of elements, when known without enumerating.
    fn count(&self) -> Option<usize> {
        None
    }

    /// JSON form for objects that opt in to structured serialization.
    fn to_serializable(&self) -> Option<serde_json::Value> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// A growable list of values.
pub struct ListObject {
    ty: TypeRef,
    items: RwLock<Vec<Value>>,
}

impl ListObject {
    pub fn new(items: Vec<Value>) -> Self {
        Self::with_type(Arc::clone(&well_known::types().list), items)
    }

    pub fn with_type(ty: TypeRef, items: Vec<Value>) -> Self {
        Self {
            ty,
            items: RwLock::new(items),
        }
    }

    pub fn push(&self, value: Value) {
        self.items.write().push(value);
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl RuntimeObject for ListObject {
    fn runtime_type(&self) -> TypeRef {
        Arc::clone(&self.ty)
    }

    fn display(&self) -> Option<String> {
        Some(format!("{} (Count = {})", self.ty.name(), self.len()))
    }

    fn enumerate(&self) -> Option<ElementIter> {
        let snapshot = self.items.read().clone();
        Some(Box::new(snapshot.into_iter().map(Ok)))
    }

    fn count(&self) -> Option<usize> {
        Some(self.len())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An object whose state is a set of named fields.
///
/// Pair with [`record_field`] to declare members that read and write
/// the field table.
pub struct RecordObject {
    ty: TypeRef,
    fields: RwLock<HashMap<String, Value>>,
    display: Option<String>,
}

impl RecordObject {
    pub fn new(ty: &TypeRef) -> Self {
        Self {
            ty: Arc::clone(ty),
            fields: RwLock::new(HashMap::new()),
            display: None,
        }
    }

    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.write().insert(name.into(), value.into());
        self
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn get(&self, name: &str) -> Value {
        self.fields.read().get(name).cloned().unwrap_or_default()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.fields.write().insert(name.into(), value);
    }
}

impl RuntimeObject for RecordObject {
    fn runtime_type(&self) -> TypeRef {
        Arc::clone(&self.ty)
    }

    fn display(&self) -> Option<String> {
        self.display.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn as_record<'a>(target: &'a dyn RuntimeObject, field: &str) -> Result<&'a RecordObject, ErrorValue> {
    target.as_any().downcast_ref::<RecordObject>().ok_or_else(|| {
        ErrorValue::new(
            "InvalidCast",
            format!("field '{field}' requires a record target"),
        )
    })
}

/// A writable property backed by a [`RecordObject`] field.
pub fn record_field(name: &str, member_type: &TypeRef) -> MemberDescriptor {
    let read_name = name.to_string();
    let write_name = name.to_string();
    MemberDescriptor::property(name, member_type, move |target| {
        Ok(as_record(target, &read_name)?.get(&read_name))
    })
    .with_setter(move |target, value| {
        as_record(target, &write_name)?.set(write_name.clone(), value);
        Ok(())
    })
}

/// Extension for declaring record-backed fields on a type builder.
pub trait RecordTypeExt {
    fn record_field(self, name: &str, member_type: &TypeRef) -> Self;
}

impl RecordTypeExt for RuntimeTypeBuilder {
    fn record_field(self, name: &str, member_type: &TypeRef) -> Self {
        self.member(record_field(name, member_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RuntimeType;

    #[test]
    fn record_fields_read_and_write() {
        let types = well_known::types();
        let point = RuntimeType::class("Demo.Point")
            .base(&types.object)
            .record_field("X", &types.int32)
            .build();
        let obj = RecordObject::new(&point).with("X", 3);

        let member = point.find_member("X").expect("member X");
        assert!(matches!(member.get_value(&obj), Ok(Value::I32(3))));

        member.set_value(&obj, Value::I32(9)).expect("set X");
        assert!(matches!(obj.get("X"), Value::I32(9)));
    }

    #[test]
    fn list_enumerates_snapshot() {
        let list = ListObject::new(vec![Value::I32(1), Value::I32(2)]);
        let iter = list.enumerate().expect("enumerable");
        list.push(Value::I32(3));
        assert_eq!(iter.count(), 2);
        assert_eq!(list.count(), Some(3));
    }
}
