//! Member-by-member view of an object.

use std::collections::HashSet;
use std::sync::Arc;

use serde::ser::SerializeMap;

use super::ItemPreparer;
use crate::model::{MemberInfo, MemberValueError, ObjectRef, Value};
use crate::representation::RepresentedObject;

#[derive(Default)]
pub(crate) struct ReflectiveState {
    has_members: bool,
    to_string_representation: Option<String>,
    suppress_to_string_representation: bool,
    members: Vec<MemberInfo>,
    values: Vec<Option<RepresentedObject>>,
}

impl ReflectiveState {
    pub(crate) fn prepare(&mut self, target: &ObjectRef) {
        let ty = target.runtime_type();
        self.has_members = ty.has_members();

        match target.display() {
            Some(text) if text != ty.name() => {
                self.to_string_representation = Some(text);
                self.suppress_to_string_representation = false;
            }
            _ => {
                self.to_string_representation = None;
                self.suppress_to_string_representation = true;
            }
        }
    }

    /// Read every visible member, isolating failures per member.
    pub(crate) fn read_members(&mut self, target: &ObjectRef, depth: usize, preparer: &dyn ItemPreparer) {
        let target_value = Value::Object(Arc::clone(target));
        let mut seen = HashSet::new();
        let mut read = Vec::new();

        for declaring in target.runtime_type().ancestry() {
            for member in declaring.members() {
                // Most-derived declaration wins.
                if !seen.insert(member.name().to_string()) {
                    continue;
                }
                if !preparer.include_member(member, &declaring, &target_value) {
                    continue;
                }

                let value = member.get_value(&**target).unwrap_or_else(|err| {
                    tracing::debug!(
                        member = %member.name(),
                        declaring_type = %declaring.name(),
                        error = %err,
                        "Member read failed"
                    );
                    Value::MemberError(MemberValueError::new(err))
                });

                read.push((member.info(), preparer.prepare_item(depth + 1, &value)));
            }
        }

        read.sort_by(|(a, _), (b, _)| a.name.cmp(&b.name));
        let (members, values): (Vec<_>, Vec<_>) = read.into_iter().unzip();
        self.members = members;
        self.values = values;
    }

    pub(crate) fn values(&self) -> &[Option<RepresentedObject>] {
        &self.values
    }

    pub(crate) fn members(&self) -> &[MemberInfo] {
        &self.members
    }

    pub(crate) fn reset(&mut self) {
        self.members.clear();
        self.values.clear();
    }

    pub(crate) fn serialize_fields<M: SerializeMap>(&self, map: &mut M) -> Result<(), M::Error> {
        map.serialize_entry("kind", "reflective")?;
        map.serialize_entry("has_members", &self.has_members)?;
        map.serialize_entry("to_string_representation", &self.to_string_representation)?;
        map.serialize_entry(
            "suppress_to_string_representation",
            &self.suppress_to_string_representation,
        )?;
        map.serialize_entry("members", &self.members)?;
        map.serialize_entry("values", &self.values)
    }
}
