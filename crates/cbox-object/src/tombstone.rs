use cbox_codec::{DataIn, DataOut};
use cbox_types::{CboxError, CboxResult, ObjectId, Ticks, TypeId, UpdateTime};

use crate::capability::Capability;
use crate::object::{Object, ObjectLookup};

/// Placeholder left at the id of a deleted or no longer supported object.
///
/// It keeps the id addressable so hosts that still refer to it get a stable
/// answer: a read returns the id it used to hold and every write is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tombstone {
    original_id: ObjectId,
}

impl Tombstone {
    pub fn new(original_id: ObjectId) -> Self {
        Self { original_id }
    }

    pub fn original_id(&self) -> ObjectId {
        self.original_id
    }
}

impl Object for Tombstone {
    fn block_type(&self) -> TypeId {
        TypeId::TOMBSTONE
    }

    fn stream_to(&self, out: &mut dyn DataOut) -> CboxResult<()> {
        out.put_object_id(self.original_id)
    }

    fn stream_from(&mut self, _input: &mut DataIn<'_>) -> CboxResult<()> {
        Err(CboxError::ObjectNotWritable)
    }

    fn stream_persisted_to(&self, _out: &mut dyn DataOut) -> CboxResult<()> {
        Err(CboxError::ObjectNotWritable)
    }

    fn update(&mut self, _now: Ticks, _links: &dyn ObjectLookup) -> UpdateTime {
        UpdateTime::Never
    }

    fn implements(&self, _iface: TypeId) -> Option<Capability<'_>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{interfaces, NoLinks};

    #[test]
    fn streams_only_the_original_id() {
        let t = Tombstone::new(ObjectId::new(0x0107));
        let mut out = Vec::new();
        t.stream_to(&mut out).unwrap();
        assert_eq!(out, vec![0x07, 0x01]);
    }

    #[test]
    fn refuses_writes_and_persistence() {
        let mut t = Tombstone::new(ObjectId::new(7));
        let mut input = DataIn::new(&[1, 2, 3]);
        assert_eq!(t.stream_from(&mut input), Err(CboxError::ObjectNotWritable));
        assert_eq!(input.position(), 0);

        let mut out = Vec::new();
        assert_eq!(
            t.stream_persisted_to(&mut out),
            Err(CboxError::ObjectNotWritable)
        );
        assert!(out.is_empty());
        assert_eq!(t.original_id(), ObjectId::new(7));
    }

    #[test]
    fn is_inert() {
        let mut t = Tombstone::new(ObjectId::new(7));
        assert_eq!(t.update(1_000, &NoLinks), UpdateTime::Never);
        assert_eq!(t.block_type(), TypeId::TOMBSTONE);
        assert!(t.implements(TypeId::TOMBSTONE).is_none());
        assert!(t.implements(interfaces::TEMP_SENSOR).is_none());
        assert!(t.implements_mut(interfaces::MUTEX_TARGET).is_none());
    }
}
