use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;

use tracing::{debug, warn};

use cbox_codec::DataIn;
use cbox_object::{Interface, Object, ObjectFactory, ObjectLookup, Tombstone};
use cbox_types::{CboxError, CboxResult, ObjectId, TypeId, UpdateTime};

use crate::list::{ListCursor, ListFilter};
use crate::resolver;

/// Id the allocator starts from unless configured otherwise.
pub const DEFAULT_USER_START: ObjectId = ObjectId::new(100);

/// A live object and its scheduling state.
pub(crate) struct Entry {
    pub(crate) object: Box<dyn Object>,
    pub(crate) next_update: UpdateTime,
}

impl Entry {
    fn object(&self) -> &(dyn Object + 'static) {
        self.object.as_ref()
    }

    fn object_mut(&mut self) -> &mut (dyn Object + 'static) {
        self.object.as_mut()
    }
}

/// Owner of every live object, keyed by id.
///
/// Entries sit behind per-entry `RefCell`s so that an object being updated
/// can resolve its siblings through `&Container` while the map itself stays
/// untouched. Inserting and removing require `&mut self`, which means no
/// borrow handed out by [`lookup`](ObjectLookup::lookup) can be alive at
/// that point.
///
/// Ids below `user_start` belong to system objects installed by the box.
/// User ids are allocated from a counter that only ever moves up.
pub struct Container {
    pub(crate) entries: BTreeMap<ObjectId, RefCell<Entry>>,
    user_start: ObjectId,
    /// Next candidate id. Kept wider than an id so "past the end" is
    /// representable.
    next_id: u32,
}

impl Container {
    /// An empty container allocating user ids from `user_start`. An invalid
    /// `user_start` is taken as `1`.
    pub fn new(user_start: ObjectId) -> Self {
        let user_start = if user_start.is_valid() {
            user_start
        } else {
            ObjectId::new(1)
        };
        Self {
            entries: BTreeMap::new(),
            user_start,
            next_id: u32::from(user_start.raw()),
        }
    }

    /// First id handed out to user objects.
    pub fn user_start(&self) -> ObjectId {
        self.user_start
    }

    /// Returns `true` for ids reserved to system objects.
    pub fn is_system(&self, id: ObjectId) -> bool {
        id < self.user_start
    }

    /// Number of objects held, system objects included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if an object is held at `id`.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Block type of the object at `id`.
    pub fn type_of(&self, id: ObjectId) -> Option<TypeId> {
        self.entries
            .get(&id)
            .and_then(|cell| cell.try_borrow().ok())
            .map(|entry| entry.object.block_type())
    }

    /// Build an object of `type_id`, apply `payload` and insert it under a
    /// fresh id.
    ///
    /// The id is consumed even if the payload is rejected, so a failed create
    /// never causes the next one to reuse an id the host may have seen.
    pub fn create(
        &mut self,
        factory: &ObjectFactory,
        type_id: TypeId,
        payload: &mut DataIn<'_>,
    ) -> CboxResult<ObjectId> {
        let mut object = factory.make(type_id)?;
        let id = self.allocate_id()?;
        object.stream_from(payload)?;
        payload.expect_end()?;
        self.entries.insert(id, Self::entry(object));
        debug!(id = %id, type_id = %type_id, "object created");
        Ok(id)
    }

    /// Insert an object under a known id. Used when restoring from storage.
    ///
    /// The allocator is moved past `id` so later creates never collide.
    pub fn insert_with_id(&mut self, id: ObjectId, object: Box<dyn Object>) -> CboxResult<()> {
        if !id.is_valid() || id.is_reserved() {
            return Err(CboxError::InvalidObjectId);
        }
        if self.entries.contains_key(&id) {
            warn!(id = %id, "duplicate insert rejected");
            return Err(CboxError::InvalidObjectId);
        }
        self.entries.insert(id, Self::entry(object));
        if !self.is_system(id) {
            self.next_id = self.next_id.max(u32::from(id.raw()) + 1);
        }
        Ok(())
    }

    /// Install a system object below the user start id.
    pub fn add_system(&mut self, id: ObjectId, object: Box<dyn Object>) -> CboxResult<()> {
        if !id.is_valid() || !self.is_system(id) {
            return Err(CboxError::InvalidObjectId);
        }
        if self.entries.contains_key(&id) {
            return Err(CboxError::InvalidObjectId);
        }
        self.entries.insert(id, Self::entry(object));
        Ok(())
    }

    /// Typed shared view of `id`. A missing object and one that doesn't offer
    /// `T` both give `None`.
    pub fn get<T: Interface + ?Sized>(&self, id: ObjectId) -> Option<Ref<'_, T>> {
        resolver::resolve(self, id)
    }

    pub fn get_mut<T: Interface + ?Sized>(&self, id: ObjectId) -> Option<RefMut<'_, T>> {
        resolver::resolve_mut(self, id)
    }

    /// Direct access for command dispatch. Exclusive access to the container
    /// rules out any outstanding guard.
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut (dyn Object + 'static)> {
        self.entries
            .get_mut(&id)
            .map(|cell| cell.get_mut().object.as_mut())
    }

    /// Erase the object at `id`. Every weak reference to it resolves to
    /// nothing from now on.
    pub fn remove(&mut self, id: ObjectId) -> CboxResult<Box<dyn Object>> {
        self.check_deletable(id)?;
        let entry = self
            .entries
            .remove(&id)
            .ok_or(CboxError::ObjectNotFound)?;
        debug!(id = %id, "object removed");
        Ok(entry.into_inner().object)
    }

    /// Replace the object at `id` with a [`Tombstone`] holding the id.
    pub fn retire(&mut self, id: ObjectId) -> CboxResult<()> {
        self.check_deletable(id)?;
        let cell = self.entries.get_mut(&id).ok_or(CboxError::ObjectNotFound)?;
        *cell.get_mut() = Entry {
            object: Box::new(Tombstone::new(id)),
            next_update: UpdateTime::Never,
        };
        debug!(id = %id, "object retired");
        Ok(())
    }

    /// Drop every user object, tombstones included. Returns the erased ids.
    pub fn clear_user(&mut self) -> Vec<ObjectId> {
        let user = self.entries.split_off(&self.user_start);
        let ids: Vec<ObjectId> = user.keys().copied().collect();
        debug!(count = ids.len(), "user objects cleared");
        ids
    }

    /// Restartable cursor over `(id, type)` pairs matching `filter`.
    pub fn list(&self, filter: ListFilter) -> ListCursor {
        ListCursor::new(filter)
    }

    /// Ids of all live objects in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.entries.keys().copied()
    }

    fn check_deletable(&self, id: ObjectId) -> CboxResult<()> {
        if self.is_system(id) && self.entries.contains_key(&id) {
            return Err(CboxError::ObjectNotDeletable);
        }
        Ok(())
    }

    fn allocate_id(&mut self) -> CboxResult<ObjectId> {
        loop {
            let raw = u16::try_from(self.next_id)
                .ok()
                .filter(|&raw| raw <= ObjectId::MAX_ALLOCATABLE.raw());
            let Some(raw) = raw else {
                warn!("user id space exhausted");
                return Err(CboxError::IdSpaceExhausted);
            };
            self.next_id += 1;
            let id = ObjectId::new(raw);
            if !self.entries.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    fn entry(object: Box<dyn Object>) -> RefCell<Entry> {
        RefCell::new(Entry {
            object,
            next_update: UpdateTime::At(0),
        })
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new(DEFAULT_USER_START)
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("len", &self.entries.len())
            .field("user_start", &self.user_start)
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl ObjectLookup for Container {
    fn lookup(&self, id: ObjectId) -> Option<Ref<'_, dyn Object + 'static>> {
        let entry = self.entries.get(&id)?.try_borrow().ok()?;
        Some(Ref::map(entry, Entry::object))
    }

    fn lookup_mut(&self, id: ObjectId) -> Option<RefMut<'_, dyn Object + 'static>> {
        let entry = self.entries.get(&id)?.try_borrow_mut().ok()?;
        Some(RefMut::map(entry, Entry::object_mut))
    }
}
