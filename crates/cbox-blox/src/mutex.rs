//! Mutex block: a lock that keeps a group of actuators from being active at
//! the same time.
//!
//! After the holder releases, a *different* actuator has to wait
//! `different_actuator_wait` before it may take over. The previous holder
//! can re-acquire immediately.

use serde::{Deserialize, Serialize};
use tracing::debug;

use cbox_codec::{read_proto, write_proto, DataIn, DataOut, ProtoMessage};
use cbox_object::{
    block_interface, interfaces, Capability, CapabilityMut, MutexTarget, Object, ObjectLookup,
};
use cbox_types::{CboxResult, ObjectId, Ticks, TypeId, UpdateTime};

use crate::block_types::MUTEX;

/// How long a refused caller waits while the lock is held.
const RETRY_INTERVAL: Ticks = 1_000;

/// A holder that has not refreshed its claim for this long has lost it.
pub const HOLD_LEASE: Ticks = 5_000;

const UPDATE_INTERVAL: Ticks = 1_000;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutexMessage {
    pub different_actuator_wait: u32,
    /// Read-only. Ignored on write.
    pub wait_remaining: u32,
}

impl ProtoMessage for MutexMessage {
    const SCHEMA: u8 = 1;
}

/// Lock state. Owners are identified by their object id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutexState {
    hold: Ticks,
    holder: Option<ObjectId>,
    refreshed_at: Ticks,
    last_holder: Option<ObjectId>,
    released_at: Option<Ticks>,
}

impl MutexState {
    pub fn new(hold: Ticks) -> Self {
        Self {
            hold,
            ..Self::default()
        }
    }

    /// Wait imposed on a different actuator after a release.
    pub fn hold(&self) -> Ticks {
        self.hold
    }

    pub fn set_hold(&mut self, hold: Ticks) {
        self.hold = hold;
    }

    /// Time a different actuator would still have to wait at `now`: the full
    /// hold while the lock is taken, what is left of it after a release, and
    /// zero when the lock is idle.
    pub fn wait_remaining(&self, now: Ticks) -> Ticks {
        if self.holder.is_some() {
            return self.hold;
        }
        match self.released_at {
            Some(at) => self.hold.saturating_sub(now.saturating_sub(at)),
            None => 0,
        }
    }

    fn expire_stale_holder(&mut self, now: Ticks) {
        if let Some(holder) = self.holder {
            if now.saturating_sub(self.refreshed_at) > HOLD_LEASE {
                debug!(holder = %holder, "mutex lease expired");
                self.holder = None;
                self.last_holder = Some(holder);
                self.released_at = Some(self.refreshed_at);
            }
        }
    }
}

impl MutexTarget for MutexState {
    fn try_acquire(&mut self, owner: ObjectId, now: Ticks) -> Result<(), Ticks> {
        self.expire_stale_holder(now);
        match self.holder {
            Some(holder) if holder == owner => {
                self.refreshed_at = now;
                Ok(())
            }
            Some(_) => Err(RETRY_INTERVAL),
            None => {
                if let (Some(last), Some(at)) = (self.last_holder, self.released_at) {
                    let elapsed = now.saturating_sub(at);
                    if last != owner && elapsed < self.hold {
                        return Err(self.hold - elapsed);
                    }
                }
                self.holder = Some(owner);
                self.refreshed_at = now;
                Ok(())
            }
        }
    }

    fn release(&mut self, owner: ObjectId, now: Ticks) {
        if self.holder == Some(owner) {
            self.holder = None;
            self.last_holder = Some(owner);
            self.released_at = Some(now);
        }
    }

    fn holder(&self) -> Option<ObjectId> {
        self.holder
    }
}

#[derive(Debug, Default)]
pub struct MutexBlock {
    state: MutexState,
    wait_remaining: Ticks,
}

impl MutexBlock {
    pub fn new(different_actuator_wait: Ticks) -> Self {
        Self {
            state: MutexState::new(different_actuator_wait),
            wait_remaining: 0,
        }
    }

    pub fn state(&self) -> &MutexState {
        &self.state
    }

    fn message(&self, wait_remaining: Ticks) -> MutexMessage {
        MutexMessage {
            different_actuator_wait: clamp_u32(self.state.hold()),
            wait_remaining: clamp_u32(wait_remaining),
        }
    }
}

fn clamp_u32(ticks: Ticks) -> u32 {
    u32::try_from(ticks).unwrap_or(u32::MAX)
}

impl Object for MutexBlock {
    fn block_type(&self) -> TypeId {
        MUTEX
    }

    fn stream_to(&self, out: &mut dyn DataOut) -> CboxResult<()> {
        write_proto(out, &self.message(self.wait_remaining))
    }

    fn stream_from(&mut self, input: &mut DataIn<'_>) -> CboxResult<()> {
        let msg: MutexMessage = read_proto(input)?;
        self.state.set_hold(Ticks::from(msg.different_actuator_wait));
        Ok(())
    }

    fn stream_persisted_to(&self, out: &mut dyn DataOut) -> CboxResult<()> {
        write_proto(out, &self.message(0))
    }

    fn update(&mut self, now: Ticks, _links: &dyn ObjectLookup) -> UpdateTime {
        self.wait_remaining = self.state.wait_remaining(now);
        let delay = match self.wait_remaining {
            0 => UPDATE_INTERVAL,
            w => w.min(UPDATE_INTERVAL),
        };
        UpdateTime::after(now, delay)
    }

    fn implements(&self, iface: TypeId) -> Option<Capability<'_>> {
        match iface {
            MUTEX => Some(Capability::Block(self)),
            interfaces::MUTEX_TARGET => Some(Capability::MutexTarget(&self.state)),
            _ => None,
        }
    }

    fn implements_mut(&mut self, iface: TypeId) -> Option<CapabilityMut<'_>> {
        match iface {
            MUTEX => Some(CapabilityMut::Block(self)),
            interfaces::MUTEX_TARGET => Some(CapabilityMut::MutexTarget(&mut self.state)),
            _ => None,
        }
    }
}

block_interface!(MutexBlock, MUTEX);
