//! Setpoint/sensor pair: a target setting bound to a linked temperature
//! sensor. Exposes the pair as a [`ProcessValue`].

use serde::{Deserialize, Serialize};
use tracing::trace;

use cbox_codec::{read_proto, write_proto, DataIn, DataOut, ProtoMessage};
use cbox_object::{
    block_interface, interfaces, Capability, CapabilityMut, Object, ObjectLookup, ProcessValue,
    Temp, TempSensor,
};
use cbox_registry::CboxPtr;
use cbox_types::{CboxResult, ObjectId, Ticks, TypeId, UpdateTime};

use crate::block_types::SETPOINT_SENSOR_PAIR;

const UPDATE_INTERVAL: Ticks = 1_000;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetpointSensorPairMessage {
    pub sensor_id: ObjectId,
    pub stored_setting: Temp,
    pub setting_enabled: bool,
    /// Read-only: the setting in effect, `None` while disabled.
    pub setting: Option<Temp>,
    /// Read-only: the last reading taken from the sensor.
    pub value: Option<Temp>,
}

impl ProtoMessage for SetpointSensorPairMessage {
    const SCHEMA: u8 = 1;
}

#[derive(Debug, Default)]
pub struct SetpointSensorPairBlock {
    sensor: CboxPtr<dyn TempSensor>,
    stored_setting: Temp,
    setting_enabled: bool,
    value: Option<Temp>,
}

impl SetpointSensorPairBlock {
    pub fn new(sensor_id: ObjectId, setting: Temp) -> Self {
        Self {
            sensor: CboxPtr::new(sensor_id),
            stored_setting: setting,
            setting_enabled: true,
            value: None,
        }
    }

    pub fn sensor_id(&self) -> ObjectId {
        self.sensor.id()
    }

    fn message(&self, value: Option<Temp>) -> SetpointSensorPairMessage {
        SetpointSensorPairMessage {
            sensor_id: self.sensor.id(),
            stored_setting: self.stored_setting,
            setting_enabled: self.setting_enabled,
            setting: ProcessValue::setting(self),
            value,
        }
    }
}

impl ProcessValue for SetpointSensorPairBlock {
    fn setting(&self) -> Option<Temp> {
        self.setting_enabled.then_some(self.stored_setting)
    }

    fn value(&self) -> Option<Temp> {
        self.value
    }
}

impl Object for SetpointSensorPairBlock {
    fn block_type(&self) -> TypeId {
        SETPOINT_SENSOR_PAIR
    }

    fn stream_to(&self, out: &mut dyn DataOut) -> CboxResult<()> {
        write_proto(out, &self.message(self.value))
    }

    fn stream_from(&mut self, input: &mut DataIn<'_>) -> CboxResult<()> {
        let msg: SetpointSensorPairMessage = read_proto(input)?;
        if msg.sensor_id != self.sensor.id() {
            // a reading from the old sensor says nothing about the new one
            self.value = None;
        }
        self.sensor.set_id(msg.sensor_id);
        self.stored_setting = msg.stored_setting;
        self.setting_enabled = msg.setting_enabled;
        Ok(())
    }

    fn stream_persisted_to(&self, out: &mut dyn DataOut) -> CboxResult<()> {
        let mut msg = self.message(None);
        msg.setting = None;
        write_proto(out, &msg)
    }

    fn update(&mut self, now: Ticks, links: &dyn ObjectLookup) -> UpdateTime {
        self.value = self.sensor.resolve(links).and_then(|s| s.value());
        trace!(sensor = %self.sensor.id(), value = ?self.value, "pair sampled sensor");
        UpdateTime::after(now, UPDATE_INTERVAL)
    }

    fn implements(&self, iface: TypeId) -> Option<Capability<'_>> {
        match iface {
            SETPOINT_SENSOR_PAIR => Some(Capability::Block(self)),
            interfaces::PROCESS_VALUE => Some(Capability::ProcessValue(self)),
            _ => None,
        }
    }

    fn implements_mut(&mut self, iface: TypeId) -> Option<CapabilityMut<'_>> {
        if iface == SETPOINT_SENSOR_PAIR {
            Some(CapabilityMut::Block(self))
        } else {
            None
        }
    }
}

block_interface!(SetpointSensorPairBlock, SETPOINT_SENSOR_PAIR);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temp_sensor_mock::TempSensorMockBlock;
    use cbox_object::NoLinks;
    use cbox_registry::Container;
    use proptest::prelude::*;

    fn encode(sensor: u16, setting: Temp, enabled: bool) -> Vec<u8> {
        let mut out = Vec::new();
        write_proto(
            &mut out,
            &SetpointSensorPairMessage {
                sensor_id: ObjectId::new(sensor),
                stored_setting: setting,
                setting_enabled: enabled,
                setting: None,
                value: None,
            },
        )
        .unwrap();
        out
    }

    fn read(block: &SetpointSensorPairBlock) -> SetpointSensorPairMessage {
        let mut out = Vec::new();
        block.stream_to(&mut out).unwrap();
        read_proto(&mut DataIn::new(&out)).unwrap()
    }

    fn boxed_pair(sensor_value: Temp) -> Container {
        let mut c = Container::new(ObjectId::new(100));
        c.insert_with_id(
            ObjectId::new(100),
            Box::new(TempSensorMockBlock::new(sensor_value)),
        )
        .unwrap();
        c.insert_with_id(
            ObjectId::new(101),
            Box::new(SetpointSensorPairBlock::new(ObjectId::new(100), 20_000)),
        )
        .unwrap();
        c
    }

    #[test]
    fn value_comes_from_linked_sensor() {
        let c = boxed_pair(19_500);
        c.update_all(0);
        let pair = c.get::<dyn ProcessValue>(ObjectId::new(101)).unwrap();
        assert_eq!(pair.value(), Some(19_500));
        assert_eq!(pair.setting(), Some(20_000));
    }

    #[test]
    fn missing_sensor_means_no_value() {
        let mut c = boxed_pair(19_500);
        c.update_all(0);
        c.remove(ObjectId::new(100)).unwrap();
        c.update_all(1_000);
        let pair = c.get::<dyn ProcessValue>(ObjectId::new(101)).unwrap();
        assert_eq!(pair.value(), None);
    }

    #[test]
    fn disabled_setting_reads_as_none() {
        let mut block = SetpointSensorPairBlock::default();
        block
            .stream_from(&mut DataIn::new(&encode(5, 21_000, false)))
            .unwrap();
        let msg = read(&block);
        assert_eq!(msg.stored_setting, 21_000);
        assert_eq!(msg.setting, None);
        assert_eq!(msg.sensor_id, ObjectId::new(5));
    }

    #[test]
    fn relinking_drops_stale_value() {
        let c = boxed_pair(19_500);
        c.update_all(0);
        let mut pair = c
            .get_mut::<SetpointSensorPairBlock>(ObjectId::new(101))
            .unwrap();
        pair.stream_from(&mut DataIn::new(&encode(55, 20_000, true)))
            .unwrap();
        assert_eq!(ProcessValue::value(&*pair), None);
    }

    #[test]
    fn persisted_copy_excludes_runtime_values() {
        let c = boxed_pair(19_500);
        c.update_all(0);
        let pair = c.get::<SetpointSensorPairBlock>(ObjectId::new(101)).unwrap();
        let mut out = Vec::new();
        pair.stream_persisted_to(&mut out).unwrap();
        let stored: SetpointSensorPairMessage = read_proto(&mut DataIn::new(&out)).unwrap();
        assert_eq!(stored.value, None);
        assert_eq!(stored.setting, None);
        assert_eq!(stored.stored_setting, 20_000);
        assert_eq!(stored.sensor_id, ObjectId::new(100));
    }

    #[test]
    fn garbage_write_is_rejected_without_change() {
        let mut block = SetpointSensorPairBlock::new(ObjectId::new(3), 1_000);
        let err = block
            .stream_from(&mut DataIn::new(&[1, 3, 0, 0xFF, 0xFF, 0xFF]))
            .unwrap_err();
        assert!(err.is_stream_error());
        assert_eq!(block.sensor_id(), ObjectId::new(3));
        block.update(0, &NoLinks);
        assert_eq!(read(&block).value, None);
    }

    proptest! {
        #[test]
        fn config_roundtrips(sensor in any::<u16>(), setting in any::<Temp>(), enabled in any::<bool>()) {
            let mut block = SetpointSensorPairBlock::new(ObjectId::new(100), 20_000);
            block
                .stream_from(&mut DataIn::new(&encode(sensor, setting, enabled)))
                .unwrap();
            prop_assert_eq!(
                read(&block),
                SetpointSensorPairMessage {
                    sensor_id: ObjectId::new(sensor),
                    stored_setting: setting,
                    setting_enabled: enabled,
                    setting: enabled.then_some(setting),
                    value: None,
                }
            );
        }
    }
}
