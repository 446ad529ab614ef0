//! Wire-format primitives for the block layer
//!
//! The block format is byte-exact across SDKs: fields are fixed-size byte
//! arrays concatenated in declaration order, variable-size fields carry an
//! unsigned-varint length prefix, and lists carry a varint element count.
//! This module provides the cursor [`Reader`], the [`Writer`], and the
//! varint codec everything above is written with.
//!
//! # Invariants
//!
//! - A full deserialization must consume every input byte
//!   ([`deserialize_all`] fails with [`CodecError::TrailingGarbage`]).
//! - Any read past the end of the input fails with [`CodecError::Truncated`].

/// Maximum encoded length of a u64 varint.
const VARINT_MAX_BYTES: usize = 10;

/// Errors produced by the wire codec layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A read ran past the end of the input
    #[error("truncated input")]
    Truncated,

    /// Input bytes remained after all fields were read
    #[error("trailing garbage after payload")]
    TrailingGarbage,

    /// A nature integer is not assigned in the wire table
    #[error("unknown block nature {0}")]
    UnknownNature(u64),

    /// A block version newer than this build understands
    #[error("unsupported block version {0}")]
    UpgradeRequired(u64),

    /// A field decoded to an out-of-domain value
    #[error("invalid field: {0}")]
    InvalidField(&'static str),
}

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Cursor over an input buffer
///
/// All reads advance the cursor; none of them ever read past the end.
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader over the full input.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whether every input byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(CodecError::Truncated);
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Read a fixed-size byte array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Read an unsigned LEB128 varint.
    pub fn read_varint(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        let mut shift: u32 = 0;
        for i in 0..VARINT_MAX_BYTES {
            let byte = *self
                .data
                .get(self.pos + i)
                .ok_or(CodecError::Truncated)?;
            let bits = u64::from(byte & 0x7f);
            // The tenth byte may only carry the final bit of a u64.
            if shift == 63 && bits > 1 {
                return Err(CodecError::InvalidField("varint overflow"));
            }
            value |= bits << shift;
            if byte & 0x80 == 0 {
                self.pos += i + 1;
                return Ok(value);
            }
            shift += 7;
        }
        Err(CodecError::InvalidField("varint too long"))
    }

    /// Read a varint-length-prefixed byte string.
    pub fn read_len_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| CodecError::Truncated)?;
        self.read_bytes(len)
    }

    /// Read a varint count followed by that many items.
    pub fn read_list<T>(
        &mut self,
        mut read_item: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let count = self.read_varint()?;
        let count = usize::try_from(count).map_err(|_| CodecError::Truncated)?;
        // Each item consumes at least one byte; a count beyond the input is
        // rejected before allocation.
        if count > self.remaining() {
            return Err(CodecError::Truncated);
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(read_item(self)?);
        }
        Ok(items)
    }
}

/// Run a deserializer over the whole input, requiring full consumption.
pub fn deserialize_all<'a, T>(
    data: &'a [u8],
    read: impl FnOnce(&mut Reader<'a>) -> Result<T>,
) -> Result<T> {
    let mut reader = Reader::new(data);
    let value = read(&mut reader)?;
    if !reader.is_empty() {
        return Err(CodecError::TrailingGarbage);
    }
    Ok(value)
}

/// Append-only output buffer
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Append raw bytes (fixed-width fields).
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append an unsigned LEB128 varint.
    pub fn push_varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    /// Append a varint-length-prefixed byte string.
    pub fn push_len_prefixed(&mut self, bytes: &[u8]) {
        self.push_varint(bytes.len() as u64);
        self.push_bytes(bytes);
    }

    /// Append a varint count followed by each item.
    pub fn push_list<T>(&mut self, items: &[T], mut write_item: impl FnMut(&mut Self, &T)) {
        self.push_varint(items.len() as u64);
        for item in items {
            write_item(self, item);
        }
    }

    /// Consume the writer and return the bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Current length of the output.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn varint_bytes(value: u64) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.push_varint(value);
        writer.into_bytes()
    }

    #[test]
    fn test_varint_known_encodings() {
        assert_eq!(varint_bytes(0), vec![0x00]);
        assert_eq!(varint_bytes(127), vec![0x7f]);
        assert_eq!(varint_bytes(128), vec![0x80, 0x01]);
        assert_eq!(varint_bytes(300), vec![0xac, 0x02]);
        assert_eq!(varint_bytes(u64::MAX).len(), 10);
    }

    #[test]
    fn test_varint_truncated() {
        // Continuation bit set but no following byte.
        let mut reader = Reader::new(&[0x80]);
        assert_eq!(reader.read_varint(), Err(CodecError::Truncated));
    }

    #[test]
    fn test_varint_overflow_rejected() {
        // Eleven continuation bytes can never encode a u64.
        let data = [0xffu8; 11];
        let mut reader = Reader::new(&data);
        assert!(matches!(
            reader.read_varint(),
            Err(CodecError::InvalidField(_))
        ));
    }

    #[test]
    fn test_read_array_out_of_bounds() {
        let mut reader = Reader::new(&[1, 2, 3]);
        assert_eq!(reader.read_array::<4>(), Err(CodecError::Truncated));
    }

    #[test]
    fn test_len_prefixed_round_trip() {
        let mut writer = Writer::new();
        writer.push_len_prefixed(b"payload");
        let bytes = writer.into_bytes();

        let out = deserialize_all(&bytes, |r| r.read_len_prefixed()).unwrap();
        assert_eq!(out, b"payload");
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let mut writer = Writer::new();
        writer.push_len_prefixed(b"ok");
        writer.push_bytes(&[0xff]);
        let bytes = writer.into_bytes();

        let result = deserialize_all(&bytes, |r| r.read_len_prefixed().map(<[u8]>::to_vec));
        assert_eq!(result, Err(CodecError::TrailingGarbage));
    }

    #[test]
    fn test_list_round_trip() {
        let items: Vec<[u8; 2]> = vec![[1, 2], [3, 4], [5, 6]];
        let mut writer = Writer::new();
        writer.push_list(&items, |w, item| w.push_bytes(item));
        let bytes = writer.into_bytes();

        let out = deserialize_all(&bytes, |r| r.read_list(Reader::read_array::<2>)).unwrap();
        assert_eq!(out, items);
    }

    #[test]
    fn test_list_count_beyond_input_rejected() {
        // Count claims 1000 items over a two-byte input.
        let mut writer = Writer::new();
        writer.push_varint(1000);
        let bytes = writer.into_bytes();

        let mut reader = Reader::new(&bytes);
        let result = reader.read_list(Reader::read_array::<1>);
        assert_eq!(result, Err(CodecError::Truncated));
    }

    proptest! {
        #[test]
        fn prop_varint_round_trip(value in any::<u64>()) {
            let bytes = varint_bytes(value);
            let decoded = deserialize_all(&bytes, Reader::read_varint).unwrap();
            prop_assert_eq!(decoded, value);
        }

        #[test]
        fn prop_len_prefixed_round_trip(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut writer = Writer::new();
            writer.push_len_prefixed(&data);
            let bytes = writer.into_bytes();
            let decoded = deserialize_all(&bytes, |r| r.read_len_prefixed().map(<[u8]>::to_vec)).unwrap();
            prop_assert_eq!(decoded, data);
        }
    }
}
