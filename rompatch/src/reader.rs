use crate::apply_error::TruncatedSnafu;
use crate::ApplyError;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use snafu::OptionExt;
use std::io;

/// Sequential cursor over a patch stream.
///
/// Every read names the field it is after so a short stream can be reported
/// precisely.
pub(crate) struct PatchReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PatchReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the offset of the next unread byte.
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, ApplyError> {
        self.read_with(field, |r| r.read_u8())
    }

    pub fn read_u16_be(&mut self, field: &'static str) -> Result<u16, ApplyError> {
        self.read_with(field, |r| r.read_u16::<BigEndian>())
    }

    pub fn read_u24_be(&mut self, field: &'static str) -> Result<u32, ApplyError> {
        self.read_with(field, |r| r.read_u24::<BigEndian>())
    }

    pub fn read_u32_le(&mut self, field: &'static str) -> Result<u32, ApplyError> {
        self.read_with(field, |r| r.read_u32::<LittleEndian>())
    }

    pub fn read_bytes(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], ApplyError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + len)
            .context(TruncatedSnafu {
                field,
                offset: self.position(),
            })?;

        self.pos += len;

        Ok(bytes)
    }

    fn read_with<T>(
        &mut self,
        field: &'static str,
        read: impl FnOnce(&mut &'a [u8]) -> io::Result<T>,
    ) -> Result<T, ApplyError> {
        let mut rest = &self.data[self.pos..];
        let value = read(&mut rest).ok().context(TruncatedSnafu {
            field,
            offset: self.position(),
        })?;

        self.pos = self.data.len() - rest.len();

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_mixed_endianness() {
        let mut reader = PatchReader::new(&[0x45, 0x4F, 0x46, 0x01, 0x02, 0x03, 0x04, 0xFF]);
        assert_eq!(reader.read_u24_be("offset").unwrap(), 0x454F46);
        assert_eq!(reader.read_u32_le("size").unwrap(), 0x04030201);
        assert_eq!(reader.read_u8("fill").unwrap(), 0xFF);
        assert!(reader.is_empty());
    }

    #[test]
    fn short_read_names_field_and_offset() {
        let mut reader = PatchReader::new(&[0x00, 0x01, 0x02]);
        reader.read_u8("first").unwrap();

        match reader.read_u24_be("record offset") {
            Err(ApplyError::Truncated { field, offset }) => {
                assert_eq!(field, "record offset");
                assert_eq!(offset, 1);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        // A failed read does not consume anything.
        assert_eq!(reader.remaining(), 2);
    }
}
