//! Schema-tagged payloads.
//!
//! On-wire format:
//! ```text
//! [1 byte: schema version]
//! [2 bytes: body length (little-endian u16)]
//! [N bytes: body (bincode-serialized message)]
//! ```
//!
//! A payload must fill the region it is read from exactly. A version the
//! reader doesn't know is reported as `SchemaMismatch`, a short region as
//! `InputStreamReadError`, and a body that doesn't decode (or decodes with
//! bytes to spare) as `InputStreamDecodingError`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use cbox_types::{CboxError, CboxResult};

use crate::data_in::DataIn;
use crate::data_out::DataOut;

/// Largest body a payload can carry.
pub const MAX_BODY_LEN: usize = u16::MAX as usize;

/// A message struct that travels as a proto payload.
pub trait ProtoMessage: Serialize + DeserializeOwned {
    /// Schema version written in front of the body. Bump it whenever the
    /// field layout changes.
    const SCHEMA: u8;
}

pub fn write_proto<M: ProtoMessage>(out: &mut dyn DataOut, msg: &M) -> CboxResult<()> {
    let body = bincode::serialize(msg).map_err(|e| {
        debug!(error = %e, "proto encode failed");
        CboxError::OutputStreamEncodingError
    })?;
    if body.len() > MAX_BODY_LEN {
        return Err(CboxError::OutputStreamEncodingError);
    }
    out.put_u8(M::SCHEMA)?;
    out.put_u16(body.len() as u16)?;
    out.write_bytes(&body)
}

/// Decode a message that must occupy the rest of `input`.
///
/// `input` is only advanced when the whole message decoded.
pub fn read_proto<M: ProtoMessage>(input: &mut DataIn<'_>) -> CboxResult<M> {
    let mut scratch = input.clone();
    let schema = scratch.get_u8()?;
    if schema != M::SCHEMA {
        debug!(expected = M::SCHEMA, actual = schema, "proto schema mismatch");
        return Err(CboxError::SchemaMismatch);
    }
    let len = scratch.get_u16()? as usize;
    let body = scratch.get_bytes(len)?;
    scratch.expect_end()?;

    let msg: M = bincode::deserialize(body).map_err(|e| {
        debug!(error = %e, "proto decode failed");
        CboxError::InputStreamDecodingError
    })?;
    let used = bincode::serialized_size(&msg).map_err(|_| CboxError::InputStreamDecodingError)?;
    if used as usize != len {
        debug!(used, len, "proto body has trailing bytes");
        return Err(CboxError::InputStreamDecodingError);
    }

    *input = scratch;
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        a: u32,
        b: bool,
        c: Option<i32>,
        list: Vec<u16>,
    }

    impl ProtoMessage for Sample {
        const SCHEMA: u8 = 3;
    }

    fn sample() -> Sample {
        Sample {
            a: 4000,
            b: true,
            c: Some(-5),
            list: vec![1, 2, 3],
        }
    }

    fn encoded(msg: &Sample) -> Vec<u8> {
        let mut out = Vec::new();
        write_proto(&mut out, msg).unwrap();
        out
    }

    #[test]
    fn roundtrip() {
        let bytes = encoded(&sample());
        assert_eq!(bytes[0], 3);
        let mut input = DataIn::new(&bytes);
        assert_eq!(read_proto::<Sample>(&mut input).unwrap(), sample());
        assert!(input.is_empty());
    }

    #[test]
    fn schema_mismatch_is_distinguishable() {
        let mut bytes = encoded(&sample());
        bytes[0] = 4;
        let mut input = DataIn::new(&bytes);
        assert_eq!(read_proto::<Sample>(&mut input), Err(CboxError::SchemaMismatch));
        assert_eq!(input.position(), 0);
    }

    #[test]
    fn truncated_body() {
        let bytes = encoded(&sample());
        let mut input = DataIn::new(&bytes[..bytes.len() - 1]);
        assert_eq!(
            read_proto::<Sample>(&mut input),
            Err(CboxError::InputStreamReadError)
        );
        assert_eq!(input.position(), 0);
    }

    #[test]
    fn bytes_after_payload_are_rejected() {
        let mut bytes = encoded(&sample());
        bytes.push(0);
        let mut input = DataIn::new(&bytes);
        assert_eq!(
            read_proto::<Sample>(&mut input),
            Err(CboxError::InputStreamDecodingError)
        );
    }

    #[test]
    fn body_with_slack_is_rejected() {
        // valid body followed by an extra byte inside the declared length
        let mut body = bincode::serialize(&sample()).unwrap();
        body.push(0xEE);
        let mut bytes = vec![Sample::SCHEMA];
        bytes.extend_from_slice(&(body.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&body);
        let mut input = DataIn::new(&bytes);
        assert_eq!(
            read_proto::<Sample>(&mut input),
            Err(CboxError::InputStreamDecodingError)
        );
    }

    #[test]
    fn invalid_bool_fails_decode() {
        let mut bytes = encoded(&sample());
        // header is 3 bytes, then 4 bytes of `a`, then the bool
        bytes[3 + 4] = 7;
        let mut input = DataIn::new(&bytes);
        assert_eq!(
            read_proto::<Sample>(&mut input),
            Err(CboxError::InputStreamDecodingError)
        );
    }

    proptest! {
        #[test]
        fn arbitrary_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut input = DataIn::new(&data);
            match read_proto::<Sample>(&mut input) {
                Ok(msg) => prop_assert_eq!(encoded(&msg), data),
                Err(_) => prop_assert_eq!(input.position(), 0),
            }
        }
    }
}
