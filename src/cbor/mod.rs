//! Helpful functionality around the `serde_cbor` crate.

use serde::Serialize;
use serde_cbor::{de, ser::Write, Serializer};
use std::{cmp, result};

#[cfg_attr(tarpaulin, skip)]
mod error;
pub use error::CborError;

/// The result type for the `cbor` module.
pub type Result<T> = result::Result<T, CborError>;

/// Implements the `Write` trait from `serde_cbor` using a `Vec<u8>`.
///
/// It allocates when necessary, so can be used for indefinite-length data,
/// unlike `SliceWrite`.
struct VecWrite {
    vec: Vec<u8>,
}

impl VecWrite {
    /// Constructs a new `VecWrite` based on a 256 byte `Vec<u8>`, which is
    /// enough for a signed certificate without reallocating.
    fn new() -> VecWrite {
        VecWrite::with_capacity(256)
    }

    /// Constructs a new `VecWrite` based on a `Vec<u8>` of specified capacity.
    fn with_capacity(capacity: usize) -> VecWrite {
        VecWrite {
            vec: Vec::with_capacity(capacity),
        }
    }

    /// Consumes the writer, returning the bytes written so far.
    fn into_vec(self) -> Vec<u8> {
        self.vec
    }
}

impl Write for VecWrite {
    type Error = serde_cbor::Error;

    fn write_all(&mut self, buf: &[u8]) -> result::Result<(), Self::Error> {
        if self.vec.capacity() - self.vec.len() < buf.len() {
            // Make sure we have either at least 128 bytes free space, or if
            // what we're trying to insert is larger than that, room for it
            // and 8 additional bytes
            self.vec.reserve(cmp::max(128, buf.len() + 8));
        }
        self.vec.extend_from_slice(buf);

        Ok(())
    }
}

/// Serializes an object into CBOR.
///
/// Tuples become definite-length arrays, unsigned integers use the shortest
/// encoding and `serde_bytes` wrappers become byte strings, which is exactly
/// the encoding the firmware's certificate parser expects.
pub fn encode(object: impl Serialize) -> Result<Vec<u8>> {
    let mut serializer = Serializer::new(VecWrite::new());
    object.serialize(&mut serializer)?;

    Ok(serializer.into_inner().into_vec())
}

/// Deserializes a CBOR encoded object.
///
/// Fails if there are trailing bytes after the first data item.
pub fn decode<'a, T>(bytes: &'a [u8]) -> Result<T>
where
    T: serde::Deserialize<'a>,
{
    Ok(de::from_slice(bytes)?)
}

/// Returns the number of items of the CBOR array starting at `bytes[0]`.
///
/// Only handles arrays with at most 23 items, which covers every structure
/// this crate produces.
pub fn array_len(bytes: &[u8]) -> Result<usize> {
    let first = *bytes.first().ok_or(CborError::NotAnArray)?;
    // The major type for arrays is indicated by the three leftmost bits
    if first & 0b111_00000 != 0b100_00000 {
        return Err(CborError::NotAnArray);
    }
    match (first & 0b000_11111) as usize {
        n if n > 23 => Err(CborError::TooManyItems),
        n => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use serde_bytes::Bytes;

    use super::*;

    const OUTPUT_MIXED: [u8; 24] = [
        0x84, 0x18, 0x2A, 0x6D, 0x48, 0x65, 0x6C, 0x6C, 0x6F, 0x2C, 0x20,
        0x77, 0x6F, 0x72, 0x6C, 0x64, 0x21, 0x83, 0x01, 0x02, 0x03, 0x42,
        0x04, 0x05,
    ];

    #[test]
    fn vec_write() {
        let input_mixed =
            (42, "Hello, world!", (1, 2, 3), Bytes::new(&[0x04, 0x05]));

        // Just enough capacity so there's no need to reallocate
        let mut serializer = Serializer::new(VecWrite::with_capacity(24));
        input_mixed.serialize(&mut serializer).unwrap();
        assert_eq!(&OUTPUT_MIXED[..], &serializer.into_inner().into_vec()[..]);

        // One byte less than necessary, so there's one reallocation
        let mut serializer = Serializer::new(VecWrite::with_capacity(23));
        input_mixed.serialize(&mut serializer).unwrap();
        assert_eq!(&OUTPUT_MIXED[..], &serializer.into_inner().into_vec()[..]);
    }

    #[test]
    fn encode_large() {
        // Larger than the default capacity
        let input = (Bytes::new(&[1; 300]), 7u32);
        let bytes = encode(input).unwrap();
        assert_eq!(bytes.len(), 1 + 3 + 300 + 1);
        assert_eq!(&bytes[..4], &[0x82, 0x59, 0x01, 0x2C]);
        assert_eq!(bytes[304], 0x07);
    }

    #[test]
    fn u32_max_is_four_bytes() {
        assert_eq!(
            encode(u32::MAX).unwrap(),
            vec![0x1A, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn decode_tuple() {
        let (a, b, c): (u32, String, serde_bytes::ByteBuf) =
            decode(&[0x83, 0x01, 0x61, 0x61, 0x41, 0xFF]).unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, "a");
        assert_eq!(c.into_vec(), vec![0xFF]);
        // Trailing data is rejected
        assert!(decode::<u32>(&[0x01, 0x02]).is_err());
    }

    #[test]
    fn array_length() {
        assert_eq!(0, array_len(&[0x80]).unwrap());
        assert_eq!(2, array_len(&[0x82, 0x01, 0x02]).unwrap());
        assert_eq!(23, array_len(&[0x97]).unwrap());
        assert!(array_len(&[0x98, 0x18]).is_err());
        assert!(array_len(&[0xA1]).is_err());
        assert!(array_len(&[]).is_err());
    }
}
