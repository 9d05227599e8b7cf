//! Caches shared across requests.
//!
//! - `identity`: object ⇄ handle mapping used by every request that names an object
//! - `type_map`: type-keyed handler registry with inheritance-aware lookup

pub mod identity;
pub mod type_map;

pub use identity::{Cached, Handle, IdentityCache};
pub use type_map::{TypeKey, TypeMap};
