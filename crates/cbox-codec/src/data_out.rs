use cbox_types::{CboxError, CboxResult, ObjectId, TypeId};

/// Sink for encoded bytes.
///
/// Implementors only provide [`write_bytes`](DataOut::write_bytes) and
/// [`written`](DataOut::written); the scalar helpers are little-endian.
pub trait DataOut {
    fn write_bytes(&mut self, bytes: &[u8]) -> CboxResult<()>;

    /// Total bytes accepted so far.
    fn written(&self) -> usize;

    fn put_u8(&mut self, v: u8) -> CboxResult<()> {
        self.write_bytes(&[v])
    }

    fn put_u16(&mut self, v: u16) -> CboxResult<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    fn put_u32(&mut self, v: u32) -> CboxResult<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    fn put_u64(&mut self, v: u64) -> CboxResult<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    fn put_i32(&mut self, v: i32) -> CboxResult<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    fn put_object_id(&mut self, id: ObjectId) -> CboxResult<()> {
        self.write_bytes(&id.to_le_bytes())
    }

    fn put_type_id(&mut self, type_id: TypeId) -> CboxResult<()> {
        self.write_bytes(&type_id.to_le_bytes())
    }
}

impl DataOut for Vec<u8> {
    fn write_bytes(&mut self, bytes: &[u8]) -> CboxResult<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }

    fn written(&self) -> usize {
        self.len()
    }
}

/// Discards everything and only counts. Used to size a record before any
/// real write happens.
#[derive(Debug, Default)]
pub struct BlackholeDataOut {
    count: usize,
}

impl BlackholeDataOut {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataOut for BlackholeDataOut {
    fn write_bytes(&mut self, bytes: &[u8]) -> CboxResult<()> {
        self.count += bytes.len();
        Ok(())
    }

    fn written(&self) -> usize {
        self.count
    }
}

/// Buffer with a hard capacity. A write that would overflow fails as a whole
/// and leaves the buffer untouched.
#[derive(Debug)]
pub struct BoundedDataOut {
    buf: Vec<u8>,
    capacity: usize,
}

impl BoundedDataOut {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

impl DataOut for BoundedDataOut {
    fn write_bytes(&mut self, bytes: &[u8]) -> CboxResult<()> {
        if self.buf.len() + bytes.len() > self.capacity {
            return Err(CboxError::OutputStreamWriteError);
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn written(&self) -> usize {
        self.buf.len()
    }
}

/// Pass-through writer that accumulates a CRC-32 over everything written.
pub struct CrcDataOut<'a> {
    inner: &'a mut dyn DataOut,
    hasher: crc32fast::Hasher,
    count: usize,
}

impl<'a> CrcDataOut<'a> {
    pub fn new(inner: &'a mut dyn DataOut) -> Self {
        Self {
            inner,
            hasher: crc32fast::Hasher::new(),
            count: 0,
        }
    }

    /// CRC of the bytes written so far.
    pub fn crc(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Append the CRC (little-endian) to the inner writer. The CRC bytes
    /// themselves are not hashed.
    pub fn finish(self) -> CboxResult<()> {
        let crc = self.hasher.finalize();
        self.inner.put_u32(crc)
    }
}

impl DataOut for CrcDataOut<'_> {
    fn write_bytes(&mut self, bytes: &[u8]) -> CboxResult<()> {
        self.inner.write_bytes(bytes)?;
        self.hasher.update(bytes);
        self.count += bytes.len();
        Ok(())
    }

    fn written(&self) -> usize {
        self.count
    }
}
