//! Foundation types for the cbox control-object runtime.
//!
//! Every other cbox crate depends on `cbox-types`. Nothing in here knows
//! about objects, storage or the wire protocol; it only defines the
//! vocabulary they share.
//!
//! # Key Types
//!
//! - [`ObjectId`]: 16-bit identifier of a live object, stable across restarts
//! - [`TypeId`]: 16-bit tag naming a concrete object type or a capability
//! - [`UpdateTime`]: next service deadline, or `Never`
//! - [`CboxError`]: closed set of protocol/object outcomes with wire codes

pub mod error;
pub mod id;
pub mod update;

pub use error::{CboxError, CboxResult, ErrorClass};
pub use id::{ObjectId, TypeId};
pub use update::{Ticks, UpdateTime};
