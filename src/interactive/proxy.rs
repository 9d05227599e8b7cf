//! Shared handle to an interactive proxy and its state machine.
//!
//! A proxy moves `Prepared → Expanded`; `reset` moves it to `Reset`, and the
//! next interaction prepares it again. Proxies at depth 0 expand as soon as
//! they are initialized; deeper proxies wait for an explicit interaction.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::enumerable::EnumerableState;
use super::reflective::ReflectiveState;
use super::{InteractionError, ItemPreparer};
use crate::cache::{Handle, IdentityCache};
use crate::model::{MemberInfo, ObjectRef};
use crate::representation::{RepresentedObject, RepresentedType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyState {
    Prepared,
    Expanded,
    Reset,
}

/// Client request to interact with a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractMessage {
    /// Read every member (or the next slice) of the proxy itself.
    ReadAllMembers,
    /// Expand the proxy found at `values[member_index][representation_index]`.
    Member {
        member_index: usize,
        representation_index: usize,
    },
}

pub(crate) enum ProxyKind {
    Reflective(ReflectiveState),
    Enumerable(EnumerableState),
}

#[derive(Debug, Clone, Copy)]
struct Surfaced {
    generation: u64,
    handle: Handle,
    object_handle: Handle,
}

pub struct InteractiveProxy {
    depth: usize,
    state: ProxyState,
    target: ObjectRef,
    represented_type: RepresentedType,
    kind: ProxyKind,
    identity: Weak<IdentityCache>,
    surfaced: Option<Surfaced>,
}

impl InteractiveProxy {
    fn prepare(&mut self) {
        match &mut self.kind {
            ProxyKind::Reflective(state) => state.prepare(&self.target),
            ProxyKind::Enumerable(state) => state.prepare(&self.target),
        }
        self.state = ProxyState::Prepared;
    }

    fn expand(&mut self, preparer: &dyn ItemPreparer) {
        if self.state == ProxyState::Reset {
            self.prepare();
        }
        match &mut self.kind {
            ProxyKind::Reflective(state) => state.read_members(&self.target, self.depth, preparer),
            ProxyKind::Enumerable(state) => state.read_slice(self.depth, preparer),
        }
        self.state = ProxyState::Expanded;
    }

    fn values(&self) -> &[Option<RepresentedObject>] {
        match &self.kind {
            ProxyKind::Reflective(state) => state.values(),
            ProxyKind::Enumerable(state) => state.values(),
        }
    }

    fn child(&self, member_index: usize, representation_index: usize) -> Result<ProxyRef, InteractionError> {
        let values = self.values();
        let represented = values
            .get(member_index)
            .ok_or(InteractionError::MemberIndexOutOfRange {
                index: member_index,
                len: values.len(),
            })?
            .as_ref()
            .ok_or(InteractionError::NoValue(member_index))?;

        let representation = represented.get(representation_index).ok_or(
            InteractionError::RepresentationIndexOutOfRange {
                index: representation_index,
                len: represented.len(),
            },
        )?;

        representation
            .value
            .as_proxy()
            .cloned()
            .ok_or(InteractionError::NotInteractive {
                member_index,
                representation_index,
            })
    }
}

/// Shared, lockable reference to an interactive proxy.
///
/// Equality is identity: two refs are equal only if they share the proxy.
#[derive(Clone)]
pub struct ProxyRef(Arc<Mutex<InteractiveProxy>>);

impl ProxyRef {
    /// A member-by-member proxy for `target`.
    pub fn reflective(target: ObjectRef, depth: usize, identity: &Arc<IdentityCache>) -> Self {
        Self::new(target, depth, ProxyKind::Reflective(ReflectiveState::default()), identity)
    }

    /// A slice-at-a-time proxy for an enumerable `target`.
    pub fn enumerable(
        target: ObjectRef,
        depth: usize,
        slice_size: usize,
        identity: &Arc<IdentityCache>,
    ) -> Self {
        Self::new(
            target,
            depth,
            ProxyKind::Enumerable(EnumerableState::new(slice_size)),
            identity,
        )
    }

    fn new(target: ObjectRef, depth: usize, kind: ProxyKind, identity: &Arc<IdentityCache>) -> Self {
        let represented_type = RepresentedType::from(&target.runtime_type());
        Self(Arc::new(Mutex::new(InteractiveProxy {
            depth,
            state: ProxyState::Prepared,
            target,
            represented_type,
            kind,
            identity: Arc::downgrade(identity),
            surfaced: None,
        })))
    }

    /// Prepare, and expand immediately when at the root.
    pub fn initialize(&self, preparer: &dyn ItemPreparer) {
        let mut proxy = self.0.lock();
        proxy.prepare();
        if proxy.depth == 0 {
            proxy.expand(preparer);
        }
    }

    /// Apply an interaction and return the proxy the client should see next.
    pub fn interact(
        &self,
        message: Option<InteractMessage>,
        is_user_interaction: bool,
        preparer: &dyn ItemPreparer,
    ) -> Result<Option<ProxyRef>, InteractionError> {
        let child = {
            let mut proxy = self.0.lock();
            match message {
                Some(InteractMessage::ReadAllMembers) => {
                    proxy.expand(preparer);
                    return Ok(Some(self.clone()));
                }
                None if !is_user_interaction => {
                    if proxy.depth > 0 {
                        return Ok(None);
                    }
                    proxy.expand(preparer);
                    return Ok(Some(self.clone()));
                }
                None if matches!(proxy.kind, ProxyKind::Enumerable(_)) => {
                    proxy.expand(preparer);
                    return Ok(Some(self.clone()));
                }
                None => return Err(InteractionError::MissingMessage),
                Some(InteractMessage::Member {
                    member_index,
                    representation_index,
                }) => proxy.child(member_index, representation_index)?,
            }
        };

        child.0.lock().expand(preparer);
        Ok(Some(child))
    }

    /// Drop expanded state; the next interaction prepares again.
    pub fn reset(&self) {
        let mut proxy = self.0.lock();
        match &mut proxy.kind {
            ProxyKind::Reflective(state) => state.reset(),
            ProxyKind::Enumerable(state) => state.reset(),
        }
        proxy.state = ProxyState::Reset;
    }

    /// Allocate (or reuse) the client handles for this proxy and its target.
    ///
    /// Returns `(proxy handle, target handle)`.
    pub fn surface(&self) -> (Handle, Handle) {
        let (identity, target, surfaced) = {
            let proxy = self.0.lock();
            (proxy.identity.upgrade(), Arc::clone(&proxy.target), proxy.surfaced)
        };
        let Some(identity) = identity else {
            return (Handle::NONE, Handle::NONE);
        };

        let generation = identity.generation();
        if let Some(s) = surfaced.filter(|s| s.generation == generation) {
            return (s.handle, s.object_handle);
        }

        let handle = identity.handle_for_proxy(self);
        let object_handle = identity.handle_for_object(&target);
        self.0.lock().surfaced = Some(Surfaced {
            generation,
            handle,
            object_handle,
        });
        (handle, object_handle)
    }

    pub fn handle(&self) -> Handle {
        self.surface().0
    }

    pub fn target(&self) -> ObjectRef {
        Arc::clone(&self.0.lock().target)
    }

    pub fn depth(&self) -> usize {
        self.0.lock().depth
    }

    pub fn state(&self) -> ProxyState {
        self.0.lock().state
    }

    pub fn is_enumerable(&self) -> bool {
        matches!(self.0.lock().kind, ProxyKind::Enumerable(_))
    }

    /// Whether the enumerable proxy has produced its final slice.
    pub fn is_last_slice(&self) -> bool {
        match &self.0.lock().kind {
            ProxyKind::Enumerable(state) => state.is_last_slice(),
            ProxyKind::Reflective(_) => true,
        }
    }

    /// Current member values (or slice elements).
    pub fn values(&self) -> Vec<Option<RepresentedObject>> {
        self.0.lock().values().to_vec()
    }

    /// Member metadata, empty for enumerable proxies.
    pub fn members(&self) -> Vec<MemberInfo> {
        match &self.0.lock().kind {
            ProxyKind::Reflective(state) => state.members().to_vec(),
            ProxyKind::Enumerable(_) => Vec::new(),
        }
    }

    pub fn ptr_eq(&self, other: &ProxyRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn address(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for ProxyRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ProxyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProxyRef")
            .field(&format_args!("{:#x}", self.address()))
            .finish()
    }
}

impl Serialize for ProxyRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (handle, object_handle) = self.surface();
        let proxy = self.0.lock();

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("handle", &handle)?;
        map.serialize_entry("represented_object_handle", &object_handle)?;
        map.serialize_entry("represented_type", &proxy.represented_type)?;
        map.serialize_entry("depth", &proxy.depth)?;
        map.serialize_entry("state", &proxy.state)?;
        match &proxy.kind {
            ProxyKind::Reflective(state) => state.serialize_fields(&mut map)?,
            ProxyKind::Enumerable(state) => state.serialize_fields(&mut map)?,
        }
        map.end()
    }
}
