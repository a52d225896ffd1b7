//! Capabilities: behavioural contracts an object can expose to its siblings.
//!
//! Rather than casting through raw pointers, an object answers
//! [`Object::implements`](crate::Object::implements) with a variant of the
//! closed [`Capability`] union. The [`Interface`] trait maps a capability tag
//! to the variant that carries it, so a typed lookup is a tag comparison
//! followed by a `match`.

use cbox_types::{ObjectId, Ticks, TypeId};

use crate::object::Object;

/// Temperature in thousandths of a degree Celsius.
pub type Temp = i32;

/// Capability tags. Block types live below `0x8000`, capability tags above.
pub mod interfaces {
    use cbox_types::TypeId;

    pub const TEMP_SENSOR: TypeId = TypeId::new(0x8001);
    pub const PROCESS_VALUE: TypeId = TypeId::new(0x8002);
    pub const MUTEX_TARGET: TypeId = TypeId::new(0x8003);
}

/// A source of temperature readings.
pub trait TempSensor {
    /// Current reading, or `None` while the sensor is disconnected or has
    /// not produced a value yet.
    fn value(&self) -> Option<Temp>;
}

/// A controlled quantity: a target setting and the measured value.
pub trait ProcessValue {
    fn setting(&self) -> Option<Temp>;

    fn value(&self) -> Option<Temp>;
}

/// A lock shared between actuators that must never be active together.
pub trait MutexTarget {
    /// Take (or keep) the lock for `owner`. On refusal returns how long the
    /// caller should wait before asking again.
    fn try_acquire(&mut self, owner: ObjectId, now: Ticks) -> Result<(), Ticks>;

    /// Give the lock back. A release by anyone but the holder is ignored.
    fn release(&mut self, owner: ObjectId, now: Ticks);

    fn holder(&self) -> Option<ObjectId>;
}

/// Shared capability handle returned by [`Object::implements`].
pub enum Capability<'a> {
    /// The object itself, for requests naming its own block type.
    Block(&'a (dyn Object + 'static)),
    TempSensor(&'a (dyn TempSensor + 'static)),
    ProcessValue(&'a (dyn ProcessValue + 'static)),
    MutexTarget(&'a (dyn MutexTarget + 'static)),
}

/// Mutable capability handle returned by [`Object::implements_mut`].
pub enum CapabilityMut<'a> {
    Block(&'a mut (dyn Object + 'static)),
    MutexTarget(&'a mut (dyn MutexTarget + 'static)),
}

/// A type that can be requested from an object by tag.
///
/// Implemented for the capability trait objects (`dyn TempSensor`, ...) and
/// for each concrete block type.
pub trait Interface: 'static {
    const TAG: TypeId;

    fn cast(cap: Capability<'_>) -> Option<&Self>;

    fn cast_mut(_cap: CapabilityMut<'_>) -> Option<&mut Self> {
        None
    }
}

impl Interface for dyn TempSensor {
    const TAG: TypeId = interfaces::TEMP_SENSOR;

    fn cast(cap: Capability<'_>) -> Option<&Self> {
        match cap {
            Capability::TempSensor(s) => Some(s),
            _ => None,
        }
    }
}

impl Interface for dyn ProcessValue {
    const TAG: TypeId = interfaces::PROCESS_VALUE;

    fn cast(cap: Capability<'_>) -> Option<&Self> {
        match cap {
            Capability::ProcessValue(pv) => Some(pv),
            _ => None,
        }
    }
}

impl Interface for dyn MutexTarget {
    const TAG: TypeId = interfaces::MUTEX_TARGET;

    fn cast(cap: Capability<'_>) -> Option<&Self> {
        match cap {
            Capability::MutexTarget(m) => Some(m),
            _ => None,
        }
    }

    fn cast_mut(cap: CapabilityMut<'_>) -> Option<&mut Self> {
        match cap {
            CapabilityMut::MutexTarget(m) => Some(m),
            _ => None,
        }
    }
}

/// Implement [`Interface`] for a concrete block so it can be resolved by its
/// own block type.
#[macro_export]
macro_rules! block_interface {
    ($block:ty, $tag:expr) => {
        impl $crate::Interface for $block {
            const TAG: $crate::__private::TypeId = $tag;

            fn cast(cap: $crate::Capability<'_>) -> Option<&Self> {
                match cap {
                    $crate::Capability::Block(obj) => {
                        $crate::AsAny::as_any(obj).downcast_ref::<$block>()
                    }
                    _ => None,
                }
            }

            fn cast_mut(cap: $crate::CapabilityMut<'_>) -> Option<&mut Self> {
                match cap {
                    $crate::CapabilityMut::Block(obj) => {
                        $crate::AsAny::as_any_mut(obj).downcast_mut::<$block>()
                    }
                    _ => None,
                }
            }
        }
    };
}
