//! Little-endian frozen blob layout.
//!
//! ```text
//! array section
//!   0   [u8; 4]  magic b"FDAT"
//!   4   u32      format version
//!   8   u32      slot count n
//!   12  u16      always_one
//!   14  u16      always_zero
//!   16  i32 × n  base
//!       i32 × n  check
//! dictionary trailer
//!       u8       flags (bit 0: NFC keys)
//!       u32      value count
//!       u32      payload length m
//!       [u8; m]  values, JSON array in index order
//! ```

use crate::codes::CodeTable;
use crate::double_array::DoubleArray;
use crate::error::{FormatError, FormatResult};

pub const MAGIC: [u8; 4] = *b"FDAT";
pub const FORMAT_VERSION: u32 = 1;

pub const ARRAY_HEADER: usize = 16; // magic + 2 × u32 + 2 × u16
pub const DICT_TRAILER: usize = 9; // u8 + 2 × u32

pub const FLAG_NFC: u8 = 0x01;

pub fn write_array(out: &mut Vec<u8>, array: &DoubleArray) {
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(array.len() as u32).to_le_bytes());
    out.extend_from_slice(&array.codes().always_one().to_le_bytes());
    out.extend_from_slice(&array.codes().always_zero().to_le_bytes());
    for &b in array.base() {
        out.extend_from_slice(&b.to_le_bytes());
    }
    for &c in array.check() {
        out.extend_from_slice(&c.to_le_bytes());
    }
}

pub fn read_array(reader: &mut Reader<'_>) -> FormatResult<DoubleArray> {
    let mut magic = [0u8; 4];
    magic.copy_from_slice(reader.take(4)?);
    if magic != MAGIC {
        return Err(FormatError::BadMagic {
            expected: MAGIC,
            found: magic,
        });
    }
    let version = reader.u32()?;
    if version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }
    let len = reader.u32()? as usize;
    let always_one = reader.u16()?;
    let always_zero = reader.u16()?;

    let base = reader.i32_vec(len)?;
    let check = reader.i32_vec(len)?;
    DoubleArray::from_parts(base, check, CodeTable::from_masks(always_one, always_zero))
}

/// Writes the dictionary trailer that follows the array section.
pub fn write_values(out: &mut Vec<u8>, flags: u8, count: usize, payload: &[u8]) {
    out.push(flags);
    out.extend_from_slice(&(count as u32).to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
}

/// Reads the dictionary trailer: flags, declared value count and JSON payload.
pub fn read_values<'a>(reader: &mut Reader<'a>) -> FormatResult<(u8, usize, &'a [u8])> {
    let flags = reader.u8()?;
    if flags & !FLAG_NFC != 0 {
        return Err(FormatError::Corrupt(format!("unknown flags {:#04x}", flags)));
    }
    let count = reader.u32()? as usize;
    let payload_len = reader.u32()? as usize;
    let payload = reader.take(payload_len)?;
    Ok((flags, count, payload))
}

/// Bounds-checked cursor over a frozen blob.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    pub fn take(&mut self, n: usize) -> FormatResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| self.truncated(n))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn u8(&mut self) -> FormatResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> FormatResult<u16> {
        Ok(read_u16(self.take(2)?, 0))
    }

    pub fn u32(&mut self) -> FormatResult<u32> {
        Ok(read_u32(self.take(4)?, 0))
    }

    fn i32_vec(&mut self, len: usize) -> FormatResult<Vec<i32>> {
        let byte_len = len
            .checked_mul(4)
            .ok_or_else(|| self.truncated(usize::MAX))?;
        let bytes = self.take(byte_len)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| read_u32(c, 0) as i32)
            .collect())
    }

    /// Fails if bytes remain after the last section.
    pub fn finish(&self) -> FormatResult<()> {
        if self.pos != self.data.len() {
            return Err(FormatError::Corrupt(format!(
                "{} trailing bytes",
                self.data.len() - self.pos
            )));
        }
        Ok(())
    }

    fn truncated(&self, needed: usize) -> FormatError {
        FormatError::Truncated {
            offset: self.pos,
            needed,
            len: self.data.len(),
        }
    }
}

#[inline(always)]
pub fn read_u32(data: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

#[inline(always)]
pub fn read_u16(data: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([data[off], data[off + 1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DoubleArray {
        DoubleArray::from_parts(vec![0, 1, 0], vec![0, 1, 1], CodeTable::from_masks(0x60, 0xff80))
            .unwrap()
    }

    #[test]
    fn array_header_layout() {
        let bytes = sample().to_bytes();
        assert_eq!(&bytes[0..4], b"FDAT");
        assert_eq!(read_u32(&bytes, 4), FORMAT_VERSION);
        assert_eq!(read_u32(&bytes, 8), 3);
        assert_eq!(read_u16(&bytes, 12), 0x60);
        assert_eq!(read_u16(&bytes, 14), 0xff80);
        assert_eq!(bytes.len(), ARRAY_HEADER + 3 * 8);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = sample().to_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            DoubleArray::from_bytes(&bytes),
            Err(FormatError::BadMagic { .. })
        ));
    }

    #[test]
    fn future_version_is_rejected() {
        let mut bytes = sample().to_bytes();
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(
            DoubleArray::from_bytes(&bytes),
            Err(FormatError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn truncation_is_rejected_at_every_length() {
        let bytes = sample().to_bytes();
        for cut in 0..bytes.len() {
            assert!(
                matches!(
                    DoubleArray::from_bytes(&bytes[..cut]),
                    Err(FormatError::Truncated { .. })
                ),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = sample().to_bytes();
        bytes.push(0);
        assert!(matches!(
            DoubleArray::from_bytes(&bytes),
            Err(FormatError::Corrupt(_))
        ));
    }

    #[test]
    fn huge_slot_count_does_not_allocate() {
        let mut bytes = sample().to_bytes();
        bytes[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            DoubleArray::from_bytes(&bytes),
            Err(FormatError::Truncated { .. })
        ));
    }

    #[test]
    fn values_trailer_round_trip() {
        let mut out = Vec::new();
        write_values(&mut out, FLAG_NFC, 2, b"[1,2]");
        assert_eq!(out.len(), DICT_TRAILER + 5);
        let mut reader = Reader::new(&out);
        let (flags, count, payload) = read_values(&mut reader).unwrap();
        assert_eq!((flags, count, payload), (FLAG_NFC, 2, &b"[1,2]"[..]));
        reader.finish().unwrap();
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let mut out = Vec::new();
        write_values(&mut out, 0x80, 0, b"[]");
        assert!(read_values(&mut Reader::new(&out)).is_err());
    }
}
