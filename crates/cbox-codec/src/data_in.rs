use cbox_types::{CboxError, CboxResult, ObjectId, TypeId};

/// Bounded little-endian reader over a byte region.
///
/// A failed read leaves the reader where it was. Cloning a `DataIn` is
/// cheap and is how callers take a scratch copy to decode speculatively.
#[derive(Clone, Debug)]
pub struct DataIn<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> DataIn<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn peek_u8(&self) -> CboxResult<u8> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or(CboxError::InputStreamReadError)
    }

    pub fn get_bytes(&mut self, n: usize) -> CboxResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(CboxError::InputStreamReadError);
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn get_array<const N: usize>(&mut self) -> CboxResult<[u8; N]> {
        let bytes = self.get_bytes(N)?;
        let mut arr = [0u8; N];
        arr.copy_from_slice(bytes);
        Ok(arr)
    }

    pub fn get_u8(&mut self) -> CboxResult<u8> {
        Ok(self.get_array::<1>()?[0])
    }

    pub fn get_u16(&mut self) -> CboxResult<u16> {
        self.get_array().map(u16::from_le_bytes)
    }

    pub fn get_u32(&mut self) -> CboxResult<u32> {
        self.get_array().map(u32::from_le_bytes)
    }

    pub fn get_u64(&mut self) -> CboxResult<u64> {
        self.get_array().map(u64::from_le_bytes)
    }

    pub fn get_i32(&mut self) -> CboxResult<i32> {
        self.get_array().map(i32::from_le_bytes)
    }

    pub fn get_object_id(&mut self) -> CboxResult<ObjectId> {
        self.get_array().map(ObjectId::from_le_bytes)
    }

    pub fn get_type_id(&mut self) -> CboxResult<TypeId> {
        self.get_array().map(TypeId::from_le_bytes)
    }

    /// Split off the next `n` bytes as their own reader.
    pub fn region(&mut self, n: usize) -> CboxResult<DataIn<'a>> {
        self.get_bytes(n).map(DataIn::new)
    }

    /// Consume and return everything that is left.
    pub fn rest(&mut self) -> &'a [u8] {
        let bytes = &self.buf[self.pos..];
        self.pos = self.buf.len();
        bytes
    }

    /// Fail with a decoding error if unread bytes remain.
    pub fn expect_end(&self) -> CboxResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CboxError::InputStreamDecodingError)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_scalars() {
        let data = [0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12];
        let mut input = DataIn::new(&data);
        assert_eq!(input.get_u8().unwrap(), 1);
        assert_eq!(input.get_u16().unwrap(), 0x1234);
        assert_eq!(input.get_u32().unwrap(), 0x1234_5678);
        assert!(input.is_empty());
    }

    #[test]
    fn truncated_read_consumes_nothing() {
        let data = [0xAA, 0xBB, 0xCC];
        let mut input = DataIn::new(&data);
        assert_eq!(input.get_u32(), Err(CboxError::InputStreamReadError));
        assert_eq!(input.position(), 0);
        assert_eq!(input.get_u16().unwrap(), 0xBBAA);
        assert_eq!(input.remaining(), 1);
    }

    #[test]
    fn region_limits_reads() {
        let data = [1, 2, 3, 4, 5];
        let mut input = DataIn::new(&data);
        let mut region = input.region(2).unwrap();
        assert_eq!(region.get_u8().unwrap(), 1);
        assert_eq!(region.get_u8().unwrap(), 2);
        assert!(region.get_u8().is_err());
        assert_eq!(input.rest(), &[3, 4, 5]);
    }

    #[test]
    fn ids_are_two_bytes() {
        let data = [7, 0, 0xFD, 0xFF];
        let mut input = DataIn::new(&data);
        assert_eq!(input.get_object_id().unwrap(), ObjectId::new(7));
        assert_eq!(input.get_type_id().unwrap(), TypeId::TOMBSTONE);
    }

    #[test]
    fn expect_end_flags_trailing_bytes() {
        let data = [1, 2];
        let mut input = DataIn::new(&data);
        input.get_u8().unwrap();
        assert_eq!(input.expect_end(), Err(CboxError::InputStreamDecodingError));
        input.get_u8().unwrap();
        assert!(input.expect_end().is_ok());
    }

    #[test]
    fn peek_does_not_advance() {
        let data = [9];
        let input = DataIn::new(&data);
        assert_eq!(input.peek_u8().unwrap(), 9);
        assert_eq!(input.remaining(), 1);
    }
}
