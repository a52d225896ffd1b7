//! Concrete control objects ("blocks") for the cbox runtime.
//!
//! Each block carries its configuration as a serde message that travels in a
//! proto payload, exposes its capabilities through
//! [`Object::implements`](cbox_object::Object::implements), and reaches
//! siblings only through [`CboxPtr`](cbox_registry::CboxPtr).
//!
//! # Modules
//!
//! - [`mutex`]: lock shared between actuators
//! - [`temp_sensor_mock`]: simulated temperature sensor
//! - [`setpoint_sensor_pair`]: setting paired with a linked sensor
//! - [`actuator_mock`]: simulated digital actuator, optionally mutex-guarded
//! - [`sys_info`]: read-only system object with device diagnostics
//! - [`display`]: text formatting for display consumers

pub mod actuator_mock;
pub mod display;
pub mod mutex;
pub mod setpoint_sensor_pair;
pub mod sys_info;
pub mod temp_sensor_mock;

pub use actuator_mock::{ActuatorMockBlock, ActuatorMockMessage};
pub use display::{format_duration, format_temp, process_value_text, sensor_text};
pub use mutex::{MutexBlock, MutexMessage, MutexState};
pub use setpoint_sensor_pair::{SetpointSensorPairBlock, SetpointSensorPairMessage};
pub use sys_info::{ConnectivityHandle, ConnectivitySnapshot, SysInfoBlock, SysInfoMessage};
pub use temp_sensor_mock::{Fluctuation, TempSensorMockBlock, TempSensorMockMessage};

use cbox_object::ObjectFactory;
use cbox_types::{ObjectId, TypeId};

/// Block type ids. Capability tags live above `0x8000`.
pub mod block_types {
    use cbox_types::TypeId;

    pub const SYS_INFO: TypeId = TypeId::new(0x0100);
    pub const MUTEX: TypeId = TypeId::new(0x0101);
    pub const TEMP_SENSOR_MOCK: TypeId = TypeId::new(0x0102);
    pub const SETPOINT_SENSOR_PAIR: TypeId = TypeId::new(0x0103);
    pub const ACTUATOR_MOCK: TypeId = TypeId::new(0x0104);
}

/// Id the box installs its [`SysInfoBlock`] at.
pub const SYS_INFO_ID: ObjectId = ObjectId::new(2);

/// Factory for every block a host may create. System blocks are installed by
/// the box and are not listed here.
pub fn factory() -> ObjectFactory {
    let mut factory = ObjectFactory::new();
    register_blox(&mut factory);
    factory
}

/// Add the user-creatable blocks to `factory`.
pub fn register_blox(factory: &mut ObjectFactory) {
    factory.register(block_types::MUTEX, || Box::new(MutexBlock::default()));
    factory.register(block_types::TEMP_SENSOR_MOCK, || {
        Box::new(TempSensorMockBlock::default())
    });
    factory.register(block_types::SETPOINT_SENSOR_PAIR, || {
        Box::new(SetpointSensorPairBlock::default())
    });
    factory.register(block_types::ACTUATOR_MOCK, || {
        Box::new(ActuatorMockBlock::default())
    });
}

/// Human-readable block name, for logs and the simulator.
pub fn type_name(type_id: TypeId) -> Option<&'static str> {
    Some(match type_id {
        block_types::SYS_INFO => "SysInfo",
        block_types::MUTEX => "Mutex",
        block_types::TEMP_SENSOR_MOCK => "TempSensorMock",
        block_types::SETPOINT_SENSOR_PAIR => "SetpointSensorPair",
        block_types::ACTUATOR_MOCK => "ActuatorMock",
        TypeId::TOMBSTONE => "Deprecated",
        _ => return None,
    })
}
