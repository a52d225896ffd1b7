//! Small objects shared by the unit tests of this crate.

use cbox_codec::{DataIn, DataOut};
use cbox_object::{
    block_interface, interfaces, Capability, CapabilityMut, Object, ObjectFactory, ObjectLookup,
    Temp, TempSensor,
};
use cbox_types::{CboxResult, ObjectId, Ticks, TypeId, UpdateTime};

use crate::resolver::CboxPtr;

pub const SENSOR: TypeId = TypeId::new(0x0010);
pub const FOLLOWER: TypeId = TypeId::new(0x0011);

/// Fixed-value sensor that counts its updates.
pub struct Sensor {
    pub value: Temp,
    pub period: Ticks,
    pub updates: u32,
}

impl Sensor {
    pub fn new(value: Temp) -> Self {
        Self {
            value,
            period: 100,
            updates: 0,
        }
    }
}

impl TempSensor for Sensor {
    fn value(&self) -> Option<Temp> {
        Some(self.value)
    }
}

impl Object for Sensor {
    fn block_type(&self) -> TypeId {
        SENSOR
    }

    fn stream_to(&self, out: &mut dyn DataOut) -> CboxResult<()> {
        out.put_i32(self.value)?;
        out.put_u32(self.updates)
    }

    fn stream_from(&mut self, input: &mut DataIn<'_>) -> CboxResult<()> {
        self.value = input.get_i32()?;
        Ok(())
    }

    fn stream_persisted_to(&self, out: &mut dyn DataOut) -> CboxResult<()> {
        out.put_i32(self.value)
    }

    fn update(&mut self, now: Ticks, _links: &dyn ObjectLookup) -> UpdateTime {
        self.updates += 1;
        if self.period == 0 {
            UpdateTime::Never
        } else {
            UpdateTime::after(now, self.period)
        }
    }

    fn implements(&self, iface: TypeId) -> Option<Capability<'_>> {
        match iface {
            SENSOR => Some(Capability::Block(self)),
            interfaces::TEMP_SENSOR => Some(Capability::TempSensor(self)),
            _ => None,
        }
    }

    fn implements_mut(&mut self, iface: TypeId) -> Option<CapabilityMut<'_>> {
        if iface == SENSOR {
            Some(CapabilityMut::Block(self))
        } else {
            None
        }
    }
}

block_interface!(Sensor, SENSOR);

/// Reads a linked sensor on every update and records what it saw.
pub struct Follower {
    pub target: CboxPtr<dyn TempSensor>,
    pub own: ObjectId,
    pub seen: Option<Temp>,
    pub saw_itself: bool,
    pub updated_as: ObjectId,
}

impl Follower {
    pub fn new(target: ObjectId, own: ObjectId) -> Self {
        Self {
            target: CboxPtr::new(target),
            own,
            seen: None,
            saw_itself: false,
            updated_as: ObjectId::INVALID,
        }
    }
}

impl Object for Follower {
    fn block_type(&self) -> TypeId {
        FOLLOWER
    }

    fn stream_to(&self, out: &mut dyn DataOut) -> CboxResult<()> {
        out.put_object_id(self.target.id())
    }

    fn stream_from(&mut self, input: &mut DataIn<'_>) -> CboxResult<()> {
        let id = input.get_object_id()?;
        self.target.set_id(id);
        Ok(())
    }

    fn stream_persisted_to(&self, out: &mut dyn DataOut) -> CboxResult<()> {
        self.stream_to(out)
    }

    fn update(&mut self, now: Ticks, links: &dyn ObjectLookup) -> UpdateTime {
        self.seen = self.target.resolve(links).and_then(|s| s.value());
        self.saw_itself = links.lookup(self.own).is_some();
        self.updated_as = links.current_id();
        UpdateTime::after(now, 100)
    }

    fn implements(&self, iface: TypeId) -> Option<Capability<'_>> {
        (iface == FOLLOWER).then_some(Capability::Block(self))
    }
}

block_interface!(Follower, FOLLOWER);

pub fn factory() -> ObjectFactory {
    ObjectFactory::new()
        .with(SENSOR, || Box::new(Sensor::new(0)))
        .with(FOLLOWER, || {
            Box::new(Follower::new(ObjectId::INVALID, ObjectId::INVALID))
        })
}

pub fn sensor_payload(value: Temp) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}
