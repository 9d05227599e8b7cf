//! Object model.
//!
//! Explicit runtime type descriptors, member accessors, and dynamic values.
//! Host applications register their types here; the pipeline and proxies
//! only ever see objects through this model.

mod member;
mod object;
mod runtime_type;
mod value;
pub mod well_known;

pub use member::{Getter, MemberDescriptor, MemberFlags, MemberInfo, MemberKind, Setter};
pub use object::{
    record_field, ElementIter, ListObject, ObjectRef, RecordObject, RecordTypeExt, RuntimeObject,
};
pub use runtime_type::{
    EnumInfo, IntegralKind, RuntimeType, RuntimeTypeBuilder, TypeHandle, TypeKind, TypeRef,
};
pub use value::{EnumInstance, ErrorValue, Integral, MemberValueError, Pointer, Value};
