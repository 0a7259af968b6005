use bytes::{Buf, BufMut};
use commonware_codec::{Error, ReadExt, Write};

/// Longest string (entry point name, field name, string value) accepted on the wire.
pub const MAX_STRING_LEN: usize = 16 * 1024;

/// Longest raw byte payload (storage key) accepted on the wire.
pub const MAX_BYTES_LEN: usize = 64 * 1024;

/// Write a string as length-prefixed UTF-8 bytes.
pub fn write_string(s: &str, writer: &mut impl BufMut) {
    write_bytes(s.as_bytes(), writer);
}

/// Read a string from length-prefixed UTF-8 bytes.
pub fn read_string(reader: &mut impl Buf, max_len: usize) -> Result<String, Error> {
    let len = read_len(reader, max_len, "String")?;
    if reader.chunk().len() >= len {
        let result = match std::str::from_utf8(&reader.chunk()[..len]) {
            Ok(s) => Ok(s.to_owned()),
            Err(_) => Err(Error::Invalid("String", "invalid UTF-8")),
        };
        reader.advance(len);
        return result;
    }
    let mut bytes = vec![0u8; len];
    reader.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|_| Error::Invalid("String", "invalid UTF-8"))
}

/// Encode size of a length-prefixed string.
pub fn string_encode_size(s: &str) -> usize {
    bytes_encode_size(s.as_bytes())
}

pub fn write_bytes(bytes: &[u8], writer: &mut impl BufMut) {
    (bytes.len() as u32).write(writer);
    writer.put_slice(bytes);
}

pub fn read_bytes(reader: &mut impl Buf, max_len: usize) -> Result<Vec<u8>, Error> {
    let len = read_len(reader, max_len, "Bytes")?;
    let mut bytes = vec![0u8; len];
    reader.copy_to_slice(&mut bytes);
    Ok(bytes)
}

pub fn bytes_encode_size(bytes: &[u8]) -> usize {
    4 + bytes.len()
}

fn read_len(reader: &mut impl Buf, max_len: usize, ty: &'static str) -> Result<usize, Error> {
    let len = u32::read(reader)? as usize;
    if len > max_len {
        return Err(Error::Invalid(ty, "too long"));
    }
    if reader.remaining() < len {
        return Err(Error::EndOfBuffer);
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use rand::{rngs::StdRng, RngCore, SeedableRng};

    #[test]
    fn read_string_round_trips_entry_point_names() {
        let mut buf = BytesMut::new();
        write_string("pong_with_tuple_takes_2_args", &mut buf);
        assert_eq!(buf.len(), string_encode_size("pong_with_tuple_takes_2_args"));

        let mut reader = buf.as_ref();
        let name = read_string(&mut reader, MAX_STRING_LEN).unwrap();
        assert_eq!(name, "pong_with_tuple_takes_2_args");
        assert!(reader.is_empty());
    }

    #[test]
    fn read_string_rejects_too_long() {
        let mut buf = BytesMut::new();
        (5u32).write(&mut buf);
        buf.extend_from_slice(b"hello");

        let mut reader = buf.as_ref();
        let err = read_string(&mut reader, 4).expect_err("should reject too-long string");
        assert!(matches!(err, Error::Invalid("String", "too long")));
    }

    #[test]
    fn read_bytes_rejects_truncated_buffers() {
        let mut buf = BytesMut::new();
        (3u32).write(&mut buf);
        buf.extend_from_slice(b"ab");

        let mut reader = buf.as_ref();
        let err = read_bytes(&mut reader, 10).expect_err("should reject truncated buffer");
        assert!(matches!(err, Error::EndOfBuffer));
    }

    #[test]
    fn read_string_rejects_invalid_utf8() {
        let mut buf = BytesMut::new();
        (2u32).write(&mut buf);
        buf.extend_from_slice(&[0xff, 0xff]);

        let mut reader = buf.as_ref();
        let err = read_string(&mut reader, 10).expect_err("should reject invalid UTF-8");
        assert!(matches!(err, Error::Invalid("String", "invalid UTF-8")));
    }

    #[test]
    fn read_string_handles_malformed_inputs() {
        let mut rng = StdRng::seed_from_u64(0x5eed_c0de);
        let max_len = 64;

        for _ in 0..500 {
            let len = (rng.next_u32() as usize) % 512;
            let mut buf = vec![0u8; len];
            rng.fill_bytes(&mut buf);
            let mut reader = buf.as_slice();
            if let Ok(s) = read_string(&mut reader, max_len) {
                assert!(s.len() <= max_len);
            }
        }
    }
}
