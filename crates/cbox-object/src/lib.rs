//! Object interface for the cbox control-object runtime.
//!
//! Every control object in a box implements [`Object`]. Objects never hand
//! out raw pointers to each other; instead an object declares, through
//! [`Object::implements`], which capabilities it satisfies, and siblings
//! reach it by id through an [`ObjectLookup`].
//!
//! # Modules
//!
//! - [`object`]: the [`Object`] trait and the [`ObjectLookup`] seam
//! - [`capability`]: capability tags, the [`Capability`] union and the
//!   [`Interface`] downcast trait
//! - [`factory`]: type-indexed constructors
//! - [`tombstone`]: placeholder kept at a retired id

pub mod capability;
pub mod factory;
pub mod object;
pub mod tombstone;

pub use capability::{
    interfaces, Capability, CapabilityMut, Interface, MutexTarget, ProcessValue, Temp,
    TempSensor,
};
pub use factory::ObjectFactory;
pub use object::{AsAny, NoLinks, Object, ObjectLookup};
pub use tombstone::Tombstone;

#[doc(hidden)]
pub mod __private {
    pub use cbox_types::TypeId;
}
