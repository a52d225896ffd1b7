//! SysInfo system object: device id, firmware version, uptime and the
//! connectivity state reported by the transport.
//!
//! Read-only and never persisted. The box installs it at [`SYS_INFO_ID`]
//! at startup; hosts cannot create or delete it.
//!
//! [`SYS_INFO_ID`]: crate::SYS_INFO_ID

use std::net::IpAddr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use cbox_codec::{write_proto, DataIn, DataOut, ProtoMessage};
use cbox_object::{block_interface, Capability, Object, ObjectLookup};
use cbox_types::{CboxError, CboxResult, Ticks, TypeId, UpdateTime};

use crate::block_types::SYS_INFO;

const UPDATE_INTERVAL: Ticks = 1_000;

/// What the transport last reported about the link to the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivitySnapshot {
    pub connected: bool,
    pub ip: Option<IpAddr>,
}

/// Shared, cheaply cloned connectivity state. The transport writes it; the
/// SysInfo object reads it.
#[derive(Clone, Debug, Default)]
pub struct ConnectivityHandle {
    inner: Arc<RwLock<ConnectivitySnapshot>>,
}

impl ConnectivityHandle {
    /// A handle reporting no connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> ConnectivitySnapshot {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the state seen by every clone of this handle.
    pub fn set(&self, snapshot: ConnectivitySnapshot) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    pub fn set_connected(&self, ip: Option<IpAddr>) {
        self.set(ConnectivitySnapshot {
            connected: true,
            ip,
        });
    }

    pub fn set_disconnected(&self) {
        self.set(ConnectivitySnapshot::default());
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysInfoMessage {
    pub device_id: String,
    pub version: String,
    pub uptime: Ticks,
    pub connectivity: ConnectivitySnapshot,
}

impl ProtoMessage for SysInfoMessage {
    const SCHEMA: u8 = 1;
}

#[derive(Debug)]
pub struct SysInfoBlock {
    device_id: String,
    version: &'static str,
    uptime: Ticks,
    connectivity: ConnectivityHandle,
}

impl SysInfoBlock {
    pub fn new(device_id: impl Into<String>, connectivity: ConnectivityHandle) -> Self {
        Self {
            device_id: device_id.into(),
            version: env!("CARGO_PKG_VERSION"),
            uptime: 0,
            connectivity,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn uptime(&self) -> Ticks {
        self.uptime
    }
}

impl Object for SysInfoBlock {
    fn block_type(&self) -> TypeId {
        SYS_INFO
    }

    fn stream_to(&self, out: &mut dyn DataOut) -> CboxResult<()> {
        let msg = SysInfoMessage {
            device_id: self.device_id.clone(),
            version: self.version.to_string(),
            uptime: self.uptime,
            connectivity: self.connectivity.snapshot(),
        };
        write_proto(out, &msg)
    }

    fn stream_from(&mut self, _input: &mut DataIn<'_>) -> CboxResult<()> {
        Err(CboxError::ObjectNotWritable)
    }

    fn stream_persisted_to(&self, _out: &mut dyn DataOut) -> CboxResult<()> {
        Err(CboxError::PersistingNotNeeded)
    }

    fn update(&mut self, now: Ticks, _links: &dyn ObjectLookup) -> UpdateTime {
        self.uptime = now;
        UpdateTime::after(now, UPDATE_INTERVAL)
    }

    fn implements(&self, iface: TypeId) -> Option<Capability<'_>> {
        (iface == SYS_INFO).then_some(Capability::Block(self))
    }
}

block_interface!(SysInfoBlock, SYS_INFO);
