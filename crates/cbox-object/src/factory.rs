use cbox_types::{CboxError, CboxResult, TypeId};
use tracing::debug;

use crate::object::Object;

type Constructor = Box<dyn Fn() -> Box<dyn Object>>;

/// Type-indexed table of object constructors.
///
/// Every constructor produces a default-valued object; the caller then
/// applies a payload with `stream_from`.
#[derive(Default)]
pub struct ObjectFactory {
    entries: Vec<(TypeId, Constructor)>,
}

impl ObjectFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F>(mut self, type_id: TypeId, make: F) -> Self
    where
        F: Fn() -> Box<dyn Object> + 'static,
    {
        self.register(type_id, make);
        self
    }

    /// Register a constructor. A second registration for the same type
    /// replaces the first.
    pub fn register<F>(&mut self, type_id: TypeId, make: F)
    where
        F: Fn() -> Box<dyn Object> + 'static,
    {
        match self.entries.iter_mut().find(|(t, _)| *t == type_id) {
            Some(entry) => entry.1 = Box::new(make),
            None => self.entries.push((type_id, Box::new(make))),
        }
    }

    /// Construct a default object of `type_id`.
    pub fn make(&self, type_id: TypeId) -> CboxResult<Box<dyn Object>> {
        self.entries
            .iter()
            .find(|(t, _)| *t == type_id)
            .map(|(_, make)| make())
            .ok_or_else(|| {
                debug!(type_id = %type_id, "no constructor registered");
                CboxError::ObjectNotCreatable
            })
    }

    pub fn knows(&self, type_id: TypeId) -> bool {
        self.entries.iter().any(|(t, _)| *t == type_id)
    }

    /// Registered types in registration order.
    pub fn type_ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.entries.iter().map(|(t, _)| *t)
    }
}

impl std::fmt::Debug for ObjectFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectFactory")
            .field("types", &self.type_ids().collect::<Vec<_>>())
            .finish()
    }
}
