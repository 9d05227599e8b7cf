//! Interactive proxies.
//!
//! # Responsibilities
//! - Wrap an object so clients can read its members on demand
//! - Page through sequences one slice at a time
//! - Resolve client interaction messages to the proxy they target
//!
//! # Data Flow
//! ```text
//! pipeline.prepare(value) → ProxyRef::initialize → (depth 0) expand
//! client Interact{handle, message} → ProxyRef::interact → child.expand
//! serialize → surface handles → snapshot of current state
//! ```
//!
//! # Design Decisions
//! - Member values are prepared through `ItemPreparer`, so proxies never
//!   hold the pipeline and pick up provider changes between interactions
//! - Handles are allocated when a proxy is first serialized, not when it
//!   is created, so nested proxies a client never sees stay out of the cache

mod enumerable;
mod proxy;
mod reflective;

use thiserror::Error;

use crate::model::{MemberDescriptor, TypeRef, Value};
use crate::representation::RepresentedObject;

pub use proxy::{InteractMessage, InteractiveProxy, ProxyRef, ProxyState};

/// Default number of elements per enumerable slice.
pub const DEFAULT_SLICE_SIZE: usize = 10;

/// Prepares nested values on behalf of a proxy.
pub trait ItemPreparer {
    /// Representations of a value found at `depth`.
    fn prepare_item(&self, depth: usize, value: &Value) -> Option<RepresentedObject>;

    /// Whether `member`, declared on `declaring_type`, should be read from `target`.
    fn include_member(&self, member: &MemberDescriptor, declaring_type: &TypeRef, target: &Value) -> bool;
}

#[derive(Debug, Clone, Error)]
pub enum InteractionError {
    #[error("interaction message is required")]
    MissingMessage,

    #[error("member index {index} out of range ({len} members)")]
    MemberIndexOutOfRange { index: usize, len: usize },

    #[error("member {0} has no value")]
    NoValue(usize),

    #[error("representation index {index} out of range ({len} representations)")]
    RepresentationIndexOutOfRange { index: usize, len: usize },

    #[error("representation {representation_index} of member {member_index} is not interactive")]
    NotInteractive {
        member_index: usize,
        representation_index: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::sync::Arc;

    use crate::cache::IdentityCache;
    use crate::model::{
        well_known, ElementIter, ErrorValue, ListObject, MemberDescriptor, RecordObject,
        RecordTypeExt, RuntimeObject, RuntimeType, TypeKind,
    };
    use crate::representation::{PipelineOptions, Repr, RepresentationPipeline};

    fn pipeline() -> (Arc<IdentityCache>, RepresentationPipeline) {
        let identity = Arc::new(IdentityCache::new());
        let pipeline = RepresentationPipeline::new(Arc::clone(&identity), PipelineOptions::default());
        (identity, pipeline)
    }

    fn reflective_root(pipeline: &RepresentationPipeline, value: &Value) -> ProxyRef {
        pipeline
            .prepare_item(0, value)
            .expect("represented")
            .proxies()
            .find(|p| !p.is_enumerable())
            .cloned()
            .expect("reflective proxy")
    }

    #[test]
    fn members_are_sorted_and_deduplicated() {
        let types = well_known::types();
        let base = RuntimeType::class("Demo.Base")
            .base(&types.object)
            .record_field("Name", &types.string)
            .record_field("Age", &types.int32)
            .build();
        let derived = RuntimeType::class("Demo.Derived")
            .base(&base)
            .member(MemberDescriptor::property("Name", &types.string, |_| {
                Ok(Value::from("overridden"))
            }))
            .build();
        let obj = Value::object(RecordObject::new(&derived).with("Name", "base").with("Age", 4));

        let (_, pipeline) = pipeline();
        let proxy = reflective_root(&pipeline, &obj);
        assert_eq!(proxy.state(), ProxyState::Expanded);

        let members = proxy.members();
        let names: Vec<_> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Age", "Name"]);
        assert_eq!(members[1].declaring_type, "Demo.Derived");

        let name_value = proxy.values()[1].clone().expect("name value");
        assert!(name_value
            .iter()
            .any(|r| r.value == Repr::String("overridden".into())));
    }

    #[test]
    fn member_read_failure_becomes_placeholder() {
        let types = well_known::types();
        let ty = RuntimeType::class("Demo.Faulty")
            .base(&types.object)
            .member(MemberDescriptor::property("Broken", &types.int32, |_| {
                Err(ErrorValue::new("InvalidOperation", "not ready"))
            }))
            .record_field("Fine", &types.int32)
            .build();
        let obj = Value::object(RecordObject::new(&ty).with("Fine", 1));

        let (_, pipeline) = pipeline();
        let proxy = reflective_root(&pipeline, &obj);
        let values = proxy.values();
        assert_eq!(values.len(), 2);

        let broken = values[0].clone().expect("placeholder");
        assert!(broken
            .iter()
            .any(|r| matches!(r.value, Repr::MemberValueError(_))));
        assert!(values[1].clone().expect("fine").iter().any(|r| r.value == Repr::I32(1)));
    }

    #[test]
    fn hidden_members_are_filtered() {
        let types = well_known::types();
        let task = RuntimeType::builder("Demo.Job", TypeKind::Task)
            .base(&types.object)
            .member(MemberDescriptor::property("Result", &types.int32, |_| {
                Err(ErrorValue::new("InvalidOperation", "task result would block"))
            }))
            .member(MemberDescriptor::property("Secret", &types.int32, |_| Ok(Value::I32(1))).never_browsable())
            .member(MemberDescriptor::property("Tuning", &types.int32, |_| Ok(Value::I32(2))).advanced())
            .member(MemberDescriptor::property("Callback", &types.delegate, |_| Ok(Value::Null)))
            .record_field("Id", &types.int32)
            .build();
        let obj = Value::object(RecordObject::new(&task).with("Id", 7));

        let (_, pipeline) = pipeline();
        let proxy = reflective_root(&pipeline, &obj);
        let names: Vec<_> = proxy.members().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["Id"]);
    }

    #[test]
    fn enumerable_pages_in_slices() {
        let items = (0..25).map(Value::I32).collect();
        let list = Value::object(ListObject::new(items));

        let (_, pipeline) = pipeline();
        let represented = pipeline.prepare_item(0, &list).expect("represented");
        let proxy = represented
            .proxies()
            .find(|p| p.is_enumerable())
            .cloned()
            .expect("enumerable proxy");

        assert_eq!(proxy.values().len(), 10);
        assert!(!proxy.is_last_slice());

        let next = proxy
            .interact(Some(InteractMessage::ReadAllMembers), true, &pipeline)
            .expect("interact")
            .expect("proxy");
        assert!(next.ptr_eq(&proxy));
        assert_eq!(proxy.values().len(), 10);
        assert!(!proxy.is_last_slice());

        proxy.interact(None, true, &pipeline).expect("interact");
        assert_eq!(proxy.values().len(), 5);
        assert!(proxy.is_last_slice());
    }

    struct Flaky;

    impl RuntimeObject for Flaky {
        fn runtime_type(&self) -> TypeRef {
            Arc::clone(&well_known::types().list)
        }

        fn enumerate(&self) -> Option<ElementIter> {
            Some(Box::new(
                vec![
                    Ok(Value::I32(1)),
                    Err(ErrorValue::new("IOException", "disk")),
                    Ok(Value::I32(3)),
                ]
                .into_iter(),
            ))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn element_failure_does_not_end_enumeration() {
        let (_, pipeline) = pipeline();
        let represented = pipeline.prepare_item(0, &Value::object(Flaky)).expect("represented");
        let proxy = represented.proxies().find(|p| p.is_enumerable()).cloned().expect("proxy");

        let slice = proxy.values();
        assert_eq!(slice.len(), 3);
        assert!(slice[1]
            .as_ref()
            .expect("placeholder")
            .iter()
            .any(|r| matches!(r.value, Repr::MemberValueError(_))));
        assert!(proxy.is_last_slice());
    }

    #[test]
    fn nested_proxies_expand_on_interaction() {
        let types = well_known::types();
        let node = RuntimeType::class("Demo.Node")
            .base(&types.object)
            .record_field("Child", &types.object)
            .record_field("Value", &types.int32)
            .build();
        let leaf = Value::object(RecordObject::new(&node).with("Value", 2));
        let root = Value::object(RecordObject::new(&node).with("Child", leaf).with("Value", 1));

        let (_, pipeline) = pipeline();
        let proxy = reflective_root(&pipeline, &root);

        let child_values = proxy.values()[0].clone().expect("child represented");
        let (index, child) = child_values
            .iter()
            .enumerate()
            .find_map(|(i, r)| r.value.as_proxy().map(|p| (i, p.clone())))
            .expect("child proxy");
        assert_eq!(child.depth(), 1);
        assert_eq!(child.state(), ProxyState::Prepared);

        let expanded = proxy
            .interact(
                Some(InteractMessage::Member {
                    member_index: 0,
                    representation_index: index,
                }),
                true,
                &pipeline,
            )
            .expect("interact")
            .expect("child");
        assert!(expanded.ptr_eq(&child));
        assert_eq!(child.state(), ProxyState::Expanded);
        assert_eq!(child.members().len(), 2);
    }

    #[test]
    fn bad_indexes_are_reported() {
        let types = well_known::types();
        let ty = RuntimeType::class("Demo.One")
            .base(&types.object)
            .record_field("X", &types.int32)
            .build();
        let (_, pipeline) = pipeline();
        let proxy = reflective_root(&pipeline, &Value::object(RecordObject::new(&ty).with("X", 1)));

        let err = proxy
            .interact(
                Some(InteractMessage::Member {
                    member_index: 5,
                    representation_index: 0,
                }),
                true,
                &pipeline,
            )
            .expect_err("out of range");
        assert!(matches!(err, InteractionError::MemberIndexOutOfRange { index: 5, len: 1 }));

        let err = proxy
            .interact(
                Some(InteractMessage::Member {
                    member_index: 0,
                    representation_index: 0,
                }),
                true,
                &pipeline,
            )
            .expect_err("not a proxy");
        assert!(matches!(err, InteractionError::NotInteractive { .. }));

        assert!(matches!(
            proxy.interact(None, true, &pipeline),
            Err(InteractionError::MissingMessage)
        ));
    }

    #[test]
    fn handles_are_allocated_on_first_surface() {
        let types = well_known::types();
        let ty = RuntimeType::class("Demo.Empty").base(&types.object).build();
        let (identity, pipeline) = pipeline();
        let proxy = reflective_root(&pipeline, &Value::object(RecordObject::new(&ty)));
        assert!(identity.is_empty());

        let handle = proxy.handle();
        assert!(!handle.is_none());
        assert_eq!(proxy.handle(), handle);
        assert!(identity.get_proxy(handle).is_some_and(|p| p.ptr_eq(&proxy)));

        identity.clear();
        let fresh = proxy.handle();
        assert_eq!(identity.generation(), 1);
        assert!(identity.get_proxy(fresh).is_some());
    }
}
