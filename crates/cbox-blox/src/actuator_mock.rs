//! Simulated digital actuator.
//!
//! The host sets the desired state; the actual state follows it on the next
//! update. When a mutex is linked, the actuator only turns on while it holds
//! the lock and releases it when it turns off.

use serde::{Deserialize, Serialize};
use tracing::debug;

use cbox_codec::{read_proto, write_proto, DataIn, DataOut, ProtoMessage};
use cbox_object::{block_interface, Capability, CapabilityMut, MutexTarget, Object, ObjectLookup};
use cbox_registry::CboxPtr;
use cbox_types::{CboxResult, ObjectId, Ticks, TypeId, UpdateTime};

use crate::block_types::ACTUATOR_MOCK;

const UPDATE_INTERVAL: Ticks = 1_000;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorMockMessage {
    pub desired_state: bool,
    pub mutex_id: ObjectId,
    /// Read-only: whether the actuator is actually on.
    pub state: bool,
}

impl ProtoMessage for ActuatorMockMessage {
    const SCHEMA: u8 = 1;
}

#[derive(Debug, Default)]
pub struct ActuatorMockBlock {
    desired_state: bool,
    mutex: CboxPtr<dyn MutexTarget>,
    state: bool,
}

impl ActuatorMockBlock {
    pub fn new(mutex_id: ObjectId) -> Self {
        Self {
            mutex: CboxPtr::new(mutex_id),
            ..Self::default()
        }
    }

    pub fn desired_state(&self) -> bool {
        self.desired_state
    }

    pub fn state(&self) -> bool {
        self.state
    }

    fn message(&self, state: bool) -> ActuatorMockMessage {
        ActuatorMockMessage {
            desired_state: self.desired_state,
            mutex_id: self.mutex.id(),
            state,
        }
    }

    /// Try to turn on. Returns the delay before the next attempt.
    fn turn_on(&mut self, me: ObjectId, now: Ticks, links: &dyn ObjectLookup) -> Ticks {
        if !self.mutex.is_set() {
            self.state = true;
            return UPDATE_INTERVAL;
        }
        let Some(mut mutex) = self.mutex.resolve_mut(links) else {
            // a linked mutex that can't be reached blocks the actuator
            debug!(mutex = %self.mutex.id(), "mutex unavailable; staying off");
            self.state = false;
            return UPDATE_INTERVAL;
        };
        match mutex.try_acquire(me, now) {
            Ok(()) => {
                self.state = true;
                UPDATE_INTERVAL
            }
            Err(wait) => {
                self.state = false;
                wait.clamp(1, UPDATE_INTERVAL)
            }
        }
    }

    fn turn_off(&mut self, me: ObjectId, now: Ticks, links: &dyn ObjectLookup) {
        self.state = false;
        if let Some(mut mutex) = self.mutex.resolve_mut(links) {
            mutex.release(me, now);
        }
    }
}

impl Object for ActuatorMockBlock {
    fn block_type(&self) -> TypeId {
        ACTUATOR_MOCK
    }

    fn stream_to(&self, out: &mut dyn DataOut) -> CboxResult<()> {
        write_proto(out, &self.message(self.state))
    }

    fn stream_from(&mut self, input: &mut DataIn<'_>) -> CboxResult<()> {
        let msg: ActuatorMockMessage = read_proto(input)?;
        self.desired_state = msg.desired_state;
        self.mutex.set_id(msg.mutex_id);
        Ok(())
    }

    fn stream_persisted_to(&self, out: &mut dyn DataOut) -> CboxResult<()> {
        write_proto(out, &self.message(false))
    }

    fn update(&mut self, now: Ticks, links: &dyn ObjectLookup) -> UpdateTime {
        let me = links.current_id();
        let delay = if self.desired_state {
            self.turn_on(me, now, links)
        } else {
            self.turn_off(me, now, links);
            UPDATE_INTERVAL
        };
        UpdateTime::after(now, delay)
    }

    fn implements(&self, iface: TypeId) -> Option<Capability<'_>> {
        (iface == ACTUATOR_MOCK).then_some(Capability::Block(self))
    }

    fn implements_mut(&mut self, iface: TypeId) -> Option<CapabilityMut<'_>> {
        if iface == ACTUATOR_MOCK {
            Some(CapabilityMut::Block(self))
        } else {
            None
        }
    }
}

block_interface!(ActuatorMockBlock, ACTUATOR_MOCK);
