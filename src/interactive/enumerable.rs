//! Slice-at-a-time view of a sequence.

use serde::ser::SerializeMap;

use super::ItemPreparer;
use crate::model::{ElementIter, MemberValueError, ObjectRef, Value};
use crate::representation::RepresentedObject;

pub(crate) struct EnumerableState {
    slice_size: usize,
    iter: Option<ElementIter>,
    count: Option<usize>,
    slice: Vec<Option<RepresentedObject>>,
    is_last_slice: bool,
}

impl EnumerableState {
    pub(crate) fn new(slice_size: usize) -> Self {
        Self {
            slice_size: slice_size.max(1),
            iter: None,
            count: None,
            slice: Vec::new(),
            is_last_slice: false,
        }
    }

    pub(crate) fn prepare(&mut self, target: &ObjectRef) {
        self.iter = target.enumerate();
        self.count = target.count();
        self.slice.clear();
        self.is_last_slice = false;
    }

    /// Replace the current slice with up to `slice_size` further elements.
    pub(crate) fn read_slice(&mut self, depth: usize, preparer: &dyn ItemPreparer) {
        self.slice.clear();

        let Some(iter) = self.iter.as_mut() else {
            self.is_last_slice = true;
            return;
        };

        while self.slice.len() < self.slice_size {
            let Some(next) = iter.next() else {
                self.is_last_slice = true;
                self.iter = None;
                break;
            };

            let element = next.unwrap_or_else(|err| {
                tracing::debug!(error = %err, "Element read failed");
                Value::MemberError(MemberValueError::new(err))
            });
            self.slice.push(preparer.prepare_item(depth + 1, &element));
        }
    }

    pub(crate) fn values(&self) -> &[Option<RepresentedObject>] {
        &self.slice
    }

    pub(crate) fn is_last_slice(&self) -> bool {
        self.is_last_slice
    }

    pub(crate) fn reset(&mut self) {
        self.iter = None;
        self.slice.clear();
        self.is_last_slice = false;
    }

    pub(crate) fn serialize_fields<M: SerializeMap>(&self, map: &mut M) -> Result<(), M::Error> {
        map.serialize_entry("kind", "enumerable")?;
        map.serialize_entry("count", &self.count)?;
        map.serialize_entry("slice", &self.slice)?;
        map.serialize_entry("is_last_slice", &self.is_last_slice)
    }
}
