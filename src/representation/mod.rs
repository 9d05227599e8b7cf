//! Representation subsystem.
//!
//! # Responsibilities
//! - Turn any runtime value into an ordered, de-duplicated list of
//!   wire-safe representations
//! - Host pluggable providers that add representations or veto proxies
//! - Convert client-supplied values back into runtime values
//!
//! # Design Decisions
//! - A failing provider is logged and skipped; it never fails the request
//! - Registration is main-thread only; preparation runs wherever the
//!   caller already is (handlers are marshaled before they get here)

mod normalize;
mod pipeline;
mod provider;
mod represented;
mod to_string;

pub use normalize::{normalize, raw};
pub use pipeline::{PipelineOptions, RegistrationError, RepresentationPipeline};
pub use provider::{
    AgentRepresentationProvider, Candidate, ProviderError, RepresentFn, RepresentationProvider,
    TypeHandler, TypeMapProvider,
};
pub use represented::{
    EnumValue, ExceptionNode, MemberValueErrorNode, Repr, Representation, RepresentedObject,
    RepresentedType, TypeNode, WordSizedNumber,
};
pub use to_string::{FormattedValue, ToStringRepresentation};
