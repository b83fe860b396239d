use crate::boxes::FourCC;
use crate::error::{ParseError, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    Little,
    #[default]
    Big,
}

/// Seekable cursor over an immutable buffer.
///
/// A reader may be a window onto a sub-range of the buffer; positions are
/// always absolute offsets into the full buffer, and reads outside the window
/// fail with [`ParseError::OutOfBounds`].
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    start: usize,
    end: usize,
    pos: usize,
    endian: Endian,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8], endian: Endian) -> Self {
        Self {
            buf,
            start: 0,
            end: buf.len(),
            pos: 0,
            endian,
        }
    }

    /// A reader over `len` bytes starting at `start`, positioned at `start`.
    ///
    /// The window is clamped to the current one, so a window never sees
    /// more than its parent.
    pub fn window(&self, start: usize, len: usize) -> ByteReader<'a> {
        let start = start.clamp(self.start, self.end);
        let end = start.saturating_add(len).min(self.end);
        ByteReader {
            buf: self.buf,
            start,
            end,
            pos: start,
            endian: self.endian,
        }
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Seeking anywhere is allowed; the next read checks the bounds.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// End offset of the readable range.
    pub fn size(&self) -> usize {
        self.end
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.end.saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let out_of_bounds = ParseError::OutOfBounds {
            offset: self.pos,
            needed: n,
            size: self.end,
        };
        if self.pos < self.start {
            return Err(out_of_bounds);
        }
        let stop = self.pos.checked_add(n).ok_or(out_of_bounds.clone())?;
        if stop > self.end {
            return Err(out_of_bounds);
        }
        let bytes = &self.buf[self.pos..stop];
        self.pos = stop;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(match self.endian {
            Endian::Big => BigEndian::read_u16(b),
            Endian::Little => LittleEndian::read_u16(b),
        })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(match self.endian {
            Endian::Big => BigEndian::read_u32(b),
            Endian::Little => LittleEndian::read_u32(b),
        })
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(match self.endian {
            Endian::Big => BigEndian::read_u64(b),
            Endian::Little => LittleEndian::read_u64(b),
        })
    }

    /// Four bytes as they are stored; byte order does not apply.
    pub fn read_fourcc(&mut self) -> Result<FourCC> {
        let b = self.take(4)?;
        Ok(FourCC([b[0], b[1], b[2], b[3]]))
    }

    /// One length byte followed by that many characters.
    pub fn read_pascal_string(&mut self) -> Result<String> {
        let len = self.read_u8()? as usize;
        let bytes = self.take(len)?;
        Ok(bytes.iter().map(|&b| b as char).collect())
    }

    /// Characters up to a zero byte. The terminator is consumed but not
    /// returned; a missing terminator is an out-of-bounds read.
    pub fn read_zero_terminated_string(&mut self) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.read_u8()? {
                0 => return Ok(out),
                b => out.push(b as char),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_and_little_endian() {
        let data = [0x00, 0x01, 0x00, 0x02];
        let mut r = ByteReader::new(&data, Endian::Big);
        assert_eq!(r.read_u16().unwrap(), 1);
        r.set_endian(Endian::Little);
        assert_eq!(r.read_u16().unwrap(), 0x0200);
        assert_eq!(r.position(), 4);
    }

    #[test]
    fn read_past_end_is_out_of_bounds() {
        let data = [1u8, 2, 3];
        let mut r = ByteReader::new(&data, Endian::Big);
        let err = r.read_u32().unwrap_err();
        assert_eq!(
            err,
            ParseError::OutOfBounds {
                offset: 0,
                needed: 4,
                size: 3
            }
        );
        // a failed read does not move the cursor
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn strings() {
        let data = [3, b'a', b'b', b'c', b'x', b'y', 0, 9];
        let mut r = ByteReader::new(&data, Endian::Big);
        assert_eq!(r.read_pascal_string().unwrap(), "abc");
        assert_eq!(r.read_zero_terminated_string().unwrap(), "xy");
        assert_eq!(r.read_u8().unwrap(), 9);
    }

    #[test]
    fn unterminated_string_fails() {
        let data = [b'a', b'b'];
        let mut r = ByteReader::new(&data, Endian::Big);
        assert!(matches!(
            r.read_zero_terminated_string(),
            Err(ParseError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn window_limits_reads_but_keeps_absolute_offsets() {
        let data = [0u8, 0, 0, 7, 0, 0, 0, 9];
        let r = ByteReader::new(&data, Endian::Big);
        let mut w = r.window(2, 4);
        assert_eq!(w.position(), 2);
        assert_eq!(w.read_u16().unwrap(), 7);
        assert_eq!(w.remaining(), 2);
        assert!(w.read_u32().is_err());
        w.seek(0);
        assert!(w.read_u8().is_err());
    }
}
