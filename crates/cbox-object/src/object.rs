use std::any::Any;
use std::cell::{Ref, RefMut};

use cbox_codec::{DataIn, DataOut};
use cbox_types::{CboxResult, ObjectId, Ticks, TypeId, UpdateTime};

use crate::capability::{Capability, CapabilityMut};

/// Upcast to `Any`, so concrete blocks can be recovered from `dyn Object`.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A control object living in a box.
///
/// Implementations must satisfy these invariants:
/// - `stream_from` is transactional: decode into a scratch value and apply
///   only when the whole payload decoded. A failed call leaves the object
///   exactly as it was.
/// - `stream_persisted_to` writes only the state that has to survive a
///   restart. Runtime-only objects return `PersistingNotNeeded`.
/// - `update` always reports a deadline strictly after `now`, or `Never`.
/// - `implements` answers for the object's own block type and for every
///   capability tag it exposes, and for nothing else.
pub trait Object: AsAny {
    /// The block type this object was created as.
    fn block_type(&self) -> TypeId;

    /// Serialize the full externally visible state: settings and live values.
    fn stream_to(&self, out: &mut dyn DataOut) -> CboxResult<()>;

    /// Apply a settings update received from the host.
    fn stream_from(&mut self, input: &mut DataIn<'_>) -> CboxResult<()>;

    /// Serialize the subset of state that is written to storage.
    fn stream_persisted_to(&self, out: &mut dyn DataOut) -> CboxResult<()>;

    /// Advance internal state to `now` and report when to come back.
    ///
    /// `links` resolves sibling objects. It cannot resolve the object being
    /// updated.
    fn update(&mut self, now: Ticks, links: &dyn ObjectLookup) -> UpdateTime;

    /// Shared handle for capability `iface`, if this object provides it.
    fn implements(&self, iface: TypeId) -> Option<Capability<'_>>;

    /// Mutable handle for capability `iface`. Only capabilities that are
    /// meant to be driven by other objects are offered here.
    fn implements_mut(&mut self, _iface: TypeId) -> Option<CapabilityMut<'_>> {
        None
    }
}

/// Read access to the objects of a box, keyed by id.
///
/// Returned borrows are scoped: they must be dropped before control returns
/// to the scheduler or the command processor. An object that is already
/// borrowed (for instance the one currently being updated) resolves to
/// `None`, the same as a missing one.
pub trait ObjectLookup {
    fn lookup(&self, id: ObjectId) -> Option<Ref<'_, dyn Object + 'static>>;

    fn lookup_mut(&self, id: ObjectId) -> Option<RefMut<'_, dyn Object + 'static>>;

    /// Id of the object currently being updated through this lookup, or
    /// `INVALID` outside of an update.
    fn current_id(&self) -> ObjectId {
        ObjectId::INVALID
    }
}

/// Lookup that never finds anything. Useful when an object is updated
/// outside of a container.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLinks;

impl ObjectLookup for NoLinks {
    fn lookup(&self, _id: ObjectId) -> Option<Ref<'_, dyn Object + 'static>> {
        None
    }

    fn lookup_mut(&self, _id: ObjectId) -> Option<RefMut<'_, dyn Object + 'static>> {
        None
    }
}
