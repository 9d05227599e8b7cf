//! Built-in runtime types shared by every agent in the process.

use std::sync::OnceLock;

use super::runtime_type::{RuntimeType, TypeKind, TypeRef};

/// The built-in type table.
pub struct WellKnownTypes {
    pub object: TypeRef,
    pub boolean: TypeRef,
    pub char: TypeRef,
    pub int8: TypeRef,
    pub uint8: TypeRef,
    pub int16: TypeRef,
    pub uint16: TypeRef,
    pub int32: TypeRef,
    pub uint32: TypeRef,
    pub int64: TypeRef,
    pub uint64: TypeRef,
    pub float32: TypeRef,
    pub float64: TypeRef,
    pub string: TypeRef,
    pub bytes: TypeRef,
    pub duration: TypeRef,
    pub guid: TypeRef,
    pub intptr: TypeRef,
    pub uintptr: TypeRef,
    pub error: TypeRef,
    pub type_: TypeRef,
    pub member_error: TypeRef,
    pub interactive_object: TypeRef,
    pub delegate: TypeRef,
    pub task: TypeRef,
    pub enumerable: TypeRef,
    pub collection: TypeRef,
    pub list: TypeRef,
}

static TYPES: OnceLock<WellKnownTypes> = OnceLock::new();

/// Get the built-in type table.
pub fn types() -> &'static WellKnownTypes {
    TYPES.get_or_init(WellKnownTypes::build)
}

impl WellKnownTypes {
    fn build() -> Self {
        let object = RuntimeType::class("object").build();
        let primitive = |name: &str| {
            RuntimeType::builder(name, TypeKind::Primitive)
                .base(&object)
                .build()
        };

        let enumerable = RuntimeType::interface("IEnumerable").build();
        let collection = RuntimeType::interface("ICollection")
            .implements(&enumerable)
            .build();

        Self {
            boolean: primitive("bool"),
            char: primitive("char"),
            int8: primitive("sbyte"),
            uint8: primitive("byte"),
            int16: primitive("short"),
            uint16: primitive("ushort"),
            int32: primitive("int"),
            uint32: primitive("uint"),
            int64: primitive("long"),
            uint64: primitive("ulong"),
            float32: primitive("float"),
            float64: primitive("double"),
            string: primitive("string"),
            bytes: primitive("byte[]"),
            duration: primitive("TimeSpan"),
            guid: primitive("Guid"),
            intptr: primitive("IntPtr"),
            uintptr: primitive("UIntPtr"),
            error: RuntimeType::class("Exception").base(&object).build(),
            type_: RuntimeType::class("Type").base(&object).build(),
            member_error: RuntimeType::class("GetMemberValueError").base(&object).build(),
            interactive_object: RuntimeType::class("InteractiveObject").base(&object).build(),
            delegate: RuntimeType::builder("Delegate", TypeKind::Delegate)
                .base(&object)
                .build(),
            task: RuntimeType::builder("Task", TypeKind::Task)
                .base(&object)
                .build(),
            list: RuntimeType::class("List")
                .base(&object)
                .implements(&collection)
                .build(),
            enumerable,
            collection,
            object,
        }
    }
}
