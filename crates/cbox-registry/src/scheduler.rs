//! Cooperative update pass over a [`Container`].
//!
//! A pass visits objects in ascending id order. Each object is updated at
//! most once per pass and only when its deadline has been reached. The pass
//! runs through `&Container`, so objects can resolve siblings while it is in
//! progress but nothing can be inserted or removed.

use std::cell::{Ref, RefMut};

use tracing::{error, trace};

use cbox_object::{Object, ObjectLookup};
use cbox_types::{ObjectId, Ticks, UpdateTime};

use crate::container::{Container, Entry};

impl Container {
    /// Update every due object. Returns the earliest deadline over all
    /// objects, or `Never` if none wants to be serviced again.
    pub fn update_all(&self, now: Ticks) -> UpdateTime {
        let mut earliest = UpdateTime::Never;
        for (&id, cell) in &self.entries {
            let Ok(mut entry) = cell.try_borrow_mut() else {
                error!(id = %id, "object still borrowed at update time; skipped");
                continue;
            };
            if entry.next_update.is_due(now) {
                self.run_update(id, &mut entry, now);
            }
            earliest = earliest.min(entry.next_update);
        }
        earliest
    }

    /// Update one object now, regardless of its deadline. Used after a write
    /// so new settings take effect without waiting for the next pass.
    pub fn force_update(&self, id: ObjectId, now: Ticks) -> Option<UpdateTime> {
        let mut entry = self.entries.get(&id)?.try_borrow_mut().ok()?;
        self.run_update(id, &mut entry, now);
        Some(entry.next_update)
    }

    /// Earliest deadline without updating anything.
    pub fn next_update(&self) -> UpdateTime {
        self.entries
            .values()
            .filter_map(|cell| cell.try_borrow().ok().map(|e| e.next_update))
            .min()
            .unwrap_or(UpdateTime::Never)
    }

    fn run_update(&self, id: ObjectId, entry: &mut Entry, now: Ticks) {
        let links = UpdateLinks {
            container: self,
            current: id,
        };
        let next = entry.object.update(now, &links);
        debug_assert!(!next.is_due(now), "object {id} asked for {next:?} at {now}");
        entry.next_update = if next.is_due(now) {
            error!(id = %id, next = %next, now, "update deadline not in the future; clamped");
            UpdateTime::At(now + 1)
        } else {
            next
        };
        trace!(id = %id, next = %entry.next_update, "object updated");
    }
}

/// Lookup handed to an object during its update: the container, plus the
/// id of the object being updated.
struct UpdateLinks<'a> {
    container: &'a Container,
    current: ObjectId,
}

impl ObjectLookup for UpdateLinks<'_> {
    fn lookup(&self, id: ObjectId) -> Option<Ref<'_, dyn Object + 'static>> {
        self.container.lookup(id)
    }

    fn lookup_mut(&self, id: ObjectId) -> Option<RefMut<'_, dyn Object + 'static>> {
        self.container.lookup_mut(id)
    }

    fn current_id(&self) -> ObjectId {
        self.current
    }
}
