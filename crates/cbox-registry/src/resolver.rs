//! Weak references between objects.
//!
//! A [`CboxPtr`] is just an id plus the interface the holder expects to find
//! there. It owns nothing and caches nothing: every use re-resolves the id,
//! so a deleted or replaced target simply stops resolving. The guard a
//! resolution returns is a `RefCell` borrow scoped to the caller's current
//! step and cannot outlive the lookup it came from.

use std::cell::{Ref, RefMut};
use std::fmt;
use std::marker::PhantomData;

use cbox_object::{Interface, ObjectLookup};
use cbox_types::ObjectId;

/// Shared view of a resolved target.
pub type Guard<'a, T> = Ref<'a, T>;

/// Exclusive view of a resolved target.
pub type GuardMut<'a, T> = RefMut<'a, T>;

/// Resolve `id` to interface `T`.
///
/// `None` covers every "not available right now" case alike: no object at
/// `id`, an object that doesn't provide `T`, and an object that is already
/// borrowed (such as the caller itself during its own update).
pub fn resolve<'a, T, L>(lookup: &'a L, id: ObjectId) -> Option<Guard<'a, T>>
where
    T: Interface + ?Sized,
    L: ObjectLookup + ?Sized,
{
    let object = lookup.lookup(id)?;
    Ref::filter_map(object, |o| o.implements(T::TAG).and_then(T::cast)).ok()
}

/// Resolve `id` to interface `T` for mutation. Only capabilities an object
/// offers through `implements_mut` can be reached this way.
pub fn resolve_mut<'a, T, L>(lookup: &'a L, id: ObjectId) -> Option<GuardMut<'a, T>>
where
    T: Interface + ?Sized,
    L: ObjectLookup + ?Sized,
{
    let object = lookup.lookup_mut(id)?;
    RefMut::filter_map(object, |o| o.implements_mut(T::TAG).and_then(T::cast_mut)).ok()
}

/// Non-owning, id-based reference to an object providing `T`.
pub struct CboxPtr<T: Interface + ?Sized> {
    id: ObjectId,
    _target: PhantomData<fn() -> *const T>,
}

impl<T: Interface + ?Sized> CboxPtr<T> {
    pub const fn new(id: ObjectId) -> Self {
        Self {
            id,
            _target: PhantomData,
        }
    }

    /// A pointer that resolves to nothing.
    pub const fn unset() -> Self {
        Self::new(ObjectId::INVALID)
    }

    /// Target id, [`ObjectId::INVALID`] when unset.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Point at `id`. The target is not checked until the next resolve.
    pub fn set_id(&mut self, id: ObjectId) {
        self.id = id;
    }

    /// Returns `true` if the pointer names a target id.
    pub fn is_set(&self) -> bool {
        self.id.is_valid()
    }

    pub fn resolve<'a, L>(&self, lookup: &'a L) -> Option<Guard<'a, T>>
    where
        L: ObjectLookup + ?Sized,
    {
        if !self.is_set() {
            return None;
        }
        resolve(lookup, self.id)
    }

    pub fn resolve_mut<'a, L>(&self, lookup: &'a L) -> Option<GuardMut<'a, T>>
    where
        L: ObjectLookup + ?Sized,
    {
        if !self.is_set() {
            return None;
        }
        resolve_mut(lookup, self.id)
    }
}

impl<T: Interface + ?Sized> Clone for CboxPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Interface + ?Sized> Copy for CboxPtr<T> {}

impl<T: Interface + ?Sized> Default for CboxPtr<T> {
    fn default() -> Self {
        Self::unset()
    }
}

impl<T: Interface + ?Sized> PartialEq for CboxPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: Interface + ?Sized> Eq for CboxPtr<T> {}

impl<T: Interface + ?Sized> fmt::Debug for CboxPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CboxPtr({}, iface={})", self.id, T::TAG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::testing::{factory, sensor_payload, Sensor, SENSOR};
    use cbox_codec::DataIn;
    use cbox_object::{MutexTarget, NoLinks, TempSensor};

    fn with_sensor(value: i32) -> (Container, ObjectId) {
        let mut c = Container::new(ObjectId::new(10));
        let payload = sensor_payload(value);
        let id = c
            .create(&factory(), SENSOR, &mut DataIn::new(&payload))
            .unwrap();
        (c, id)
    }

    #[test]
    fn resolves_capability() {
        let (c, id) = with_sensor(19_250);
        let ptr: CboxPtr<dyn TempSensor> = CboxPtr::new(id);
        assert_eq!(ptr.resolve(&c).unwrap().value(), Some(19_250));
    }

    #[test]
    fn unset_pointer_resolves_to_nothing() {
        let (c, _) = with_sensor(1);
        let ptr: CboxPtr<dyn TempSensor> = CboxPtr::default();
        assert!(!ptr.is_set());
        assert!(ptr.resolve(&c).is_none());
        assert!(ptr.resolve(&NoLinks).is_none());
    }

    #[test]
    fn wrong_interface_is_none() {
        let (c, id) = with_sensor(1);
        let ptr: CboxPtr<dyn MutexTarget> = CboxPtr::new(id);
        assert!(ptr.resolve(&c).is_none());
        assert!(ptr.resolve_mut(&c).is_none());
    }

    #[test]
    fn pointer_fails_cleanly_after_removal() {
        let (mut c, id) = with_sensor(1);
        let ptr: CboxPtr<dyn TempSensor> = CboxPtr::new(id);
        assert!(ptr.resolve(&c).is_some());
        c.remove(id).unwrap();
        assert!(ptr.resolve(&c).is_none());
    }

    #[test]
    fn pointer_follows_replacement_at_same_id() {
        let (mut c, id) = with_sensor(1);
        let ptr: CboxPtr<dyn TempSensor> = CboxPtr::new(id);
        c.remove(id).unwrap();
        c.insert_with_id(id, Box::new(Sensor::new(2))).unwrap();
        assert_eq!(ptr.resolve(&c).unwrap().value(), Some(2));
    }

    #[test]
    fn mutable_guard_excludes_readers() {
        let (c, id) = with_sensor(1);
        let ptr: CboxPtr<Sensor> = CboxPtr::new(id);
        let mut guard = ptr.resolve_mut(&c).unwrap();
        guard.value = 5;
        assert!(ptr.resolve(&c).is_none());
        drop(guard);
        assert_eq!(ptr.resolve(&c).unwrap().value, 5);
    }

    #[test]
    fn repointing() {
        let (mut c, a) = with_sensor(1);
        let payload = sensor_payload(2);
        let b = c
            .create(&factory(), SENSOR, &mut DataIn::new(&payload))
            .unwrap();
        let mut ptr: CboxPtr<dyn TempSensor> = CboxPtr::new(a);
        ptr.set_id(b);
        assert_eq!(ptr.id(), b);
        assert_eq!(ptr.resolve(&c).unwrap().value(), Some(2));
        assert_eq!(ptr, CboxPtr::new(b));
    }
}
