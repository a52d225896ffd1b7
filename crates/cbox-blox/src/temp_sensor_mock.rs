//! Simulated temperature sensor.
//!
//! The reading is the configured setting plus the sum of any number of
//! periodic fluctuations. A disconnected mock reports no value.

use serde::{Deserialize, Serialize};

use cbox_codec::{read_proto, write_proto, DataIn, DataOut, ProtoMessage};
use cbox_object::{
    block_interface, interfaces, Capability, CapabilityMut, Object, ObjectLookup, Temp,
    TempSensor,
};
use cbox_types::{CboxError, CboxResult, Ticks, TypeId, UpdateTime};

use crate::block_types::TEMP_SENSOR_MOCK;

const UPDATE_INTERVAL: Ticks = 100;

/// Upper bound on configured fluctuations, keeps the payload small.
pub const MAX_FLUCTUATIONS: usize = 8;

/// A periodic wave added on top of the setting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fluctuation {
    pub amplitude: Temp,
    /// Period in milliseconds. Must not be zero.
    pub period: u32,
}

impl Fluctuation {
    /// Offset at `now`. A cubic approximation of a sine wave that peaks at
    /// roughly `amplitude`.
    pub fn at(&self, now: Ticks) -> Temp {
        if self.period == 0 {
            return 0;
        }
        let phase = (now.wrapping_mul(1_000) / u64::from(self.period)) % 1_000;
        let t = 500 - phase as i64;
        let amp = i64::from(self.amplitude);
        let offset = (t * amp) / 204 - (t * t * t * amp) / 50_937_984;
        offset.clamp(i64::from(Temp::MIN), i64::from(Temp::MAX)) as Temp
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempSensorMockMessage {
    pub setting: Temp,
    pub connected: bool,
    pub fluctuations: Vec<Fluctuation>,
    /// Read-only. Ignored on write.
    pub value: Option<Temp>,
}

impl ProtoMessage for TempSensorMockMessage {
    const SCHEMA: u8 = 1;
}

#[derive(Debug, Default)]
pub struct TempSensorMockBlock {
    setting: Temp,
    connected: bool,
    fluctuations: Vec<Fluctuation>,
    value: Option<Temp>,
}

impl TempSensorMockBlock {
    pub fn new(setting: Temp) -> Self {
        Self {
            setting,
            connected: true,
            fluctuations: Vec::new(),
            value: Some(setting),
        }
    }

    pub fn setting(&self) -> Temp {
        self.setting
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    fn message(&self, value: Option<Temp>) -> TempSensorMockMessage {
        TempSensorMockMessage {
            setting: self.setting,
            connected: self.connected,
            fluctuations: self.fluctuations.clone(),
            value,
        }
    }

    fn compute(&self, now: Ticks) -> Option<Temp> {
        if !self.connected {
            return None;
        }
        let sum = self
            .fluctuations
            .iter()
            .fold(self.setting, |acc, f| acc.saturating_add(f.at(now)));
        Some(sum)
    }
}

impl TempSensor for TempSensorMockBlock {
    fn value(&self) -> Option<Temp> {
        self.value
    }
}

impl Object for TempSensorMockBlock {
    fn block_type(&self) -> TypeId {
        TEMP_SENSOR_MOCK
    }

    fn stream_to(&self, out: &mut dyn DataOut) -> CboxResult<()> {
        write_proto(out, &self.message(self.value))
    }

    fn stream_from(&mut self, input: &mut DataIn<'_>) -> CboxResult<()> {
        let msg: TempSensorMockMessage = read_proto(input)?;
        if msg.fluctuations.len() > MAX_FLUCTUATIONS
            || msg.fluctuations.iter().any(|f| f.period == 0)
        {
            return Err(CboxError::InvalidParameter);
        }
        self.setting = msg.setting;
        self.connected = msg.connected;
        self.fluctuations = msg.fluctuations;
        if !self.connected {
            self.value = None;
        }
        Ok(())
    }

    fn stream_persisted_to(&self, out: &mut dyn DataOut) -> CboxResult<()> {
        write_proto(out, &self.message(None))
    }

    fn update(&mut self, now: Ticks, _links: &dyn ObjectLookup) -> UpdateTime {
        self.value = self.compute(now);
        UpdateTime::after(now, UPDATE_INTERVAL)
    }

    fn implements(&self, iface: TypeId) -> Option<Capability<'_>> {
        match iface {
            TEMP_SENSOR_MOCK => Some(Capability::Block(self)),
            interfaces::TEMP_SENSOR => Some(Capability::TempSensor(self)),
            _ => None,
        }
    }

    fn implements_mut(&mut self, iface: TypeId) -> Option<CapabilityMut<'_>> {
        if iface == TEMP_SENSOR_MOCK {
            Some(CapabilityMut::Block(self))
        } else {
            None
        }
    }
}

block_interface!(TempSensorMockBlock, TEMP_SENSOR_MOCK);

#[cfg(test)]
mod tests {
    use super::*;
    use cbox_object::NoLinks;
    use proptest::prelude::*;

    fn encode(msg: &TempSensorMockMessage) -> Vec<u8> {
        let mut out = Vec::new();
        write_proto(&mut out, msg).unwrap();
        out
    }

    fn read(block: &TempSensorMockBlock) -> TempSensorMockMessage {
        let mut out = Vec::new();
        block.stream_to(&mut out).unwrap();
        read_proto(&mut DataIn::new(&out)).unwrap()
    }

    fn config(setting: Temp, connected: bool, fluctuations: Vec<Fluctuation>) -> Vec<u8> {
        encode(&TempSensorMockMessage {
            setting,
            connected,
            fluctuations,
            value: None,
        })
    }

    #[test]
    fn value_follows_setting_after_update() {
        let mut block = TempSensorMockBlock::default();
        block
            .stream_from(&mut DataIn::new(&config(21_000, true, vec![])))
            .unwrap();
        assert_eq!(block.update(0, &NoLinks), UpdateTime::At(100));
        assert_eq!(TempSensor::value(&block), Some(21_000));
        assert_eq!(read(&block).value, Some(21_000));
    }

    #[test]
    fn disconnected_sensor_has_no_value() {
        let mut block = TempSensorMockBlock::new(20_000);
        block
            .stream_from(&mut DataIn::new(&config(20_000, false, vec![])))
            .unwrap();
        assert_eq!(TempSensor::value(&block), None);
        block.update(0, &NoLinks);
        assert_eq!(TempSensor::value(&block), None);
    }

    #[test]
    fn fluctuation_shape() {
        let f = Fluctuation {
            amplitude: 1_000,
            period: 4_000,
        };
        // a quarter period in
        assert_eq!(f.at(1_000), 919);
        assert_eq!(f.at(3_000), -919);
        assert_eq!(f.at(2_000), 0);
        assert_eq!(
            Fluctuation {
                amplitude: 1_000,
                period: 0
            }
            .at(1_000),
            0
        );
    }

    #[test]
    fn fluctuations_add_to_setting() {
        let mut block = TempSensorMockBlock::default();
        let f = Fluctuation {
            amplitude: 1_000,
            period: 4_000,
        };
        block
            .stream_from(&mut DataIn::new(&config(20_000, true, vec![f, f])))
            .unwrap();
        block.update(1_000, &NoLinks);
        assert_eq!(TempSensor::value(&block), Some(20_000 + 2 * 919));
    }

    #[test]
    fn zero_period_is_rejected_without_change() {
        let mut block = TempSensorMockBlock::new(18_000);
        let bad = config(
            25_000,
            true,
            vec![Fluctuation {
                amplitude: 500,
                period: 0,
            }],
        );
        assert_eq!(
            block.stream_from(&mut DataIn::new(&bad)),
            Err(CboxError::InvalidParameter)
        );
        assert_eq!(block.setting(), 18_000);
    }

    #[test]
    fn persisted_copy_has_no_value() {
        let mut block = TempSensorMockBlock::new(22_500);
        block.update(0, &NoLinks);
        let mut out = Vec::new();
        block.stream_persisted_to(&mut out).unwrap();
        let stored: TempSensorMockMessage = read_proto(&mut DataIn::new(&out)).unwrap();
        assert_eq!(stored.value, None);
        assert_eq!(stored.setting, 22_500);
        assert!(stored.connected);
    }

    proptest! {
        #[test]
        fn fluctuation_stays_within_amplitude(
            amplitude in -100_000i32..100_000,
            period in 1u32..100_000,
            now in 0u64..10_000_000,
        ) {
            let f = Fluctuation { amplitude, period };
            prop_assert!(f.at(now).unsigned_abs() <= amplitude.unsigned_abs());
        }

        #[test]
        fn config_roundtrips(setting in any::<i32>(), connected in any::<bool>(), amp in any::<i32>(), period in 1u32..=u32::MAX) {
            let msg = TempSensorMockMessage {
                setting,
                connected,
                fluctuations: vec![Fluctuation { amplitude: amp, period }],
                value: None,
            };
            let mut block = TempSensorMockBlock::default();
            block.stream_from(&mut DataIn::new(&encode(&msg))).unwrap();
            let back = read(&block);
            prop_assert_eq!(back, msg);
        }
    }
}
