//! Command processor: turns one request frame into one response frame.
//!
//! A frame is processed to completion in a single call. Malformed frames
//! are rejected while decoding, before anything in the box is touched.

use tracing::{debug, error, trace, warn};

use cbox_codec::DataIn;
use cbox_object::ObjectLookup;
use cbox_protocol::{decode_request, Command, Response};
use cbox_registry::ListFilter;
use cbox_types::{CboxError, CboxResult, ObjectId, Ticks, TypeId};

use crate::controlbox::Controlbox;

/// Where the processor is in handling a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProcessorState {
    #[default]
    AwaitingFrame,
    Decoding,
    Dispatching,
    Encoding,
}

/// Running totals, for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub frames: u64,
    pub errors: u64,
}

impl Controlbox {
    /// Decode `frame`, run the command it carries and encode the answer.
    pub fn handle_frame(&mut self, frame: &[u8], now: Ticks) -> Vec<u8> {
        self.enter(ProcessorState::Decoding);
        let response = match decode_request(frame) {
            Ok(command) => {
                self.enter(ProcessorState::Dispatching);
                self.execute(&command, now)
            }
            Err(e) => {
                debug!(error = %e, frame = %hex::encode(frame), "request rejected");
                Response::error(e, None)
            }
        };

        self.enter(ProcessorState::Encoding);
        self.stats.frames += 1;
        if !response.is_ok() {
            self.stats.errors += 1;
        }
        let bytes = response.encode();
        self.enter(ProcessorState::AwaitingFrame);
        bytes
    }

    /// Run one decoded command.
    pub fn execute(&mut self, command: &Command<'_>, now: Ticks) -> Response {
        trace!(opcode = ?command.opcode(), target = ?command.target(), "dispatching");
        let target = command.target();
        let result = match *command {
            Command::Read { id } => self.read_object(id),
            Command::Write { id, payload } => self.write_object(id, payload, now),
            Command::Create { type_id, payload } => {
                return match self.create_object(type_id, payload, now) {
                    Ok((id, state)) => Response::ok(Some(id), state),
                    Err(e) => {
                        debug!(type_id = %type_id, error = %e, "create failed");
                        Response::error(e, None)
                    }
                };
            }
            Command::Delete { id } => self.delete_object(id).map(|()| Vec::new()),
            Command::List => Ok(self.list_objects()),
            Command::ReadStored { id } => self.persistence.retrieve(id).map(|r| r.payload),
            Command::ListStored => self.list_stored(),
            Command::Reset => self.reset().map(|()| Vec::new()),
            Command::ClearObjects => self.clear_objects().map(|()| Vec::new()),
            Command::ListCompatible { iface } => Ok(self.list_compatible(iface)),
        };
        match result {
            Ok(payload) => Response::ok(target, payload),
            Err(e) => {
                debug!(opcode = ?command.opcode(), target = ?target, error = %e, "command failed");
                Response::error(e, target)
            }
        }
    }

    /// Current processor state. Between calls this is always
    /// `AwaitingFrame`.
    pub fn processor_state(&self) -> ProcessorState {
        self.state
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }

    fn enter(&mut self, state: ProcessorState) {
        trace!(from = ?self.state, to = ?state, "processor state");
        self.state = state;
    }

    fn read_object(&self, id: ObjectId) -> CboxResult<Vec<u8>> {
        let object = self.objects.lookup(id).ok_or(CboxError::ObjectNotFound)?;
        let mut out = Vec::new();
        object.stream_to(&mut out)?;
        Ok(out)
    }

    /// Apply a settings update.
    ///
    /// A persistence failure is reported, but the new settings stay applied
    /// in memory: the object already runs with them.
    fn write_object(&mut self, id: ObjectId, payload: &[u8], now: Ticks) -> CboxResult<Vec<u8>> {
        let system = self.objects.is_system(id);
        let object = self.objects.object_mut(id).ok_or(CboxError::ObjectNotFound)?;
        object.stream_from(&mut DataIn::new(payload))?;
        let persisted = if system {
            Ok(())
        } else {
            self.persistence.store(id, object)
        };
        self.objects.force_update(id, now);
        if let Err(e) = persisted {
            warn!(id = %id, error = %e, "write applied but not persisted");
            return Err(e);
        }
        self.read_object(id)
    }

    /// Create an object and persist it. A create that can't be persisted is
    /// rolled back.
    fn create_object(
        &mut self,
        type_id: TypeId,
        payload: &[u8],
        now: Ticks,
    ) -> CboxResult<(ObjectId, Vec<u8>)> {
        let id = self
            .objects
            .create(&self.factory, type_id, &mut DataIn::new(payload))?;
        let persisted = match self.objects.lookup(id) {
            Some(object) => self.persistence.store(id, &*object),
            None => Err(CboxError::ObjectNotFound),
        };
        if let Err(e) = persisted {
            if let Err(rollback) = self.objects.remove(id) {
                error!(id = %id, error = %rollback, "failed to roll back create");
            }
            return Err(e);
        }
        self.objects.force_update(id, now);
        let state = self.read_object(id)?;
        Ok((id, state))
    }

    /// Delete a user object.
    ///
    /// With tombstoning on, a live object is retired: a tombstone keeps its
    /// id reserved, in memory and in storage. Deleting the tombstone itself
    /// frees the id for good.
    fn delete_object(&mut self, id: ObjectId) -> CboxResult<()> {
        let type_id = self.objects.type_of(id).ok_or(CboxError::ObjectNotFound)?;
        if self.objects.is_system(id) {
            return Err(CboxError::ObjectNotDeletable);
        }
        if type_id == TypeId::TOMBSTONE || !self.config.tombstone_deleted {
            self.objects.remove(id)?;
            self.persistence.dispose(id)?;
        } else {
            self.objects.retire(id)?;
            self.persistence.store_tombstone(id)?;
        }
        Ok(())
    }

    fn list_objects(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (id, type_id) in self.objects.list(ListFilter::All).collect(&self.objects) {
            out.extend_from_slice(&id.to_le_bytes());
            out.extend_from_slice(&type_id.to_le_bytes());
        }
        out
    }

    fn list_stored(&self) -> CboxResult<Vec<u8>> {
        let mut out = Vec::new();
        for (id, type_id) in self.persistence.list()? {
            out.extend_from_slice(&id.to_le_bytes());
            out.extend_from_slice(&type_id.to_le_bytes());
        }
        Ok(out)
    }

    fn list_compatible(&self, iface: TypeId) -> Vec<u8> {
        self.objects
            .list(ListFilter::Compatible(iface))
            .collect(&self.objects)
            .into_iter()
            .flat_map(|(id, _)| id.to_le_bytes())
            .collect()
    }

    /// Factory reset: every user object and all of storage.
    fn reset(&mut self) -> CboxResult<()> {
        let removed = self.objects.clear_user();
        self.persistence.clear()?;
        warn!(removed = removed.len(), "box reset");
        Ok(())
    }

    /// Drop every user object and its record. Records that belong to no
    /// live object are kept.
    fn clear_objects(&mut self) -> CboxResult<()> {
        for id in self.objects.clear_user() {
            self.persistence.dispose(id)?;
        }
        Ok(())
    }
}
