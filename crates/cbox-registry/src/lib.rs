//! Object registry for the cbox runtime.
//!
//! The [`Container`] owns every live object. Objects refer to each other
//! only through [`CboxPtr`]s, which re-resolve the target id on every use
//! and hand out short-lived borrow guards. The scheduler half of the
//! container runs cooperative update passes in ascending id order.
//!
//! # Modules
//!
//! - [`container`]: id-keyed arena, allocation, removal and tombstoning
//! - [`resolver`]: weak references and typed resolution
//! - [`scheduler`]: update passes and forced updates
//! - [`list`]: restartable listing cursor

pub mod container;
pub mod list;
pub mod resolver;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use container::{Container, DEFAULT_USER_START};
pub use list::{ListCursor, ListFilter};
pub use resolver::{resolve, resolve_mut, CboxPtr, Guard, GuardMut};
