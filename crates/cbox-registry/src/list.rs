use std::ops::Bound;

use cbox_types::{ObjectId, TypeId};

use crate::container::Container;

/// Which objects a listing visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    All,
    /// Objects at or above the user start id.
    User,
    /// Objects that answer `implements` for the given tag.
    Compatible(TypeId),
}

/// Lazy cursor over `(id, type)` pairs in ascending id order.
///
/// The cursor only remembers the last id it returned, not a borrow of the
/// container, so the container can be mutated between steps. An object
/// deleted before the cursor reaches it is skipped; one created behind the
/// cursor is not visited.
#[derive(Debug, Clone)]
pub struct ListCursor {
    filter: ListFilter,
    last: Option<ObjectId>,
}

impl ListCursor {
    pub fn new(filter: ListFilter) -> Self {
        Self { filter, last: None }
    }

    /// Start over from the lowest id.
    pub fn restart(&mut self) {
        self.last = None;
    }

    /// Advance to the next matching object.
    pub fn next(&mut self, container: &Container) -> Option<(ObjectId, TypeId)> {
        let lower = match self.last {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };
        for (&id, cell) in container.entries.range((lower, Bound::Unbounded)) {
            self.last = Some(id);
            // an entry borrowed elsewhere can't be inspected; skip it
            let Ok(entry) = cell.try_borrow() else {
                continue;
            };
            let matches = match self.filter {
                ListFilter::All => true,
                ListFilter::User => !container.is_system(id),
                ListFilter::Compatible(tag) => entry.object.implements(tag).is_some(),
            };
            if matches {
                return Some((id, entry.object.block_type()));
            }
        }
        None
    }

    /// Drain the rest of the listing.
    pub fn collect(mut self, container: &Container) -> Vec<(ObjectId, TypeId)> {
        let mut out = Vec::new();
        while let Some(item) = self.next(container) {
            out.push(item);
        }
        out
    }
}
