//! Bounds-checked cursor over a mapped byte region, reading and writing
//! fixed-width big-endian integers. This is the sole bounds check used when
//! parsing record payloads out of the terms and dtmap files: every fetch or
//! store that would run past the end of the region fails instead of
//! panicking or reading out of bounds.

use crate::error::{NxsError, Result};

/// A read/write cursor over `&mut [u8]`.
pub struct Cursor<'a> {
    region: &'a mut [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(region: &'a mut [u8]) -> Self {
        Self { region, pos: 0 }
    }

    pub fn at(region: &'a mut [u8], pos: usize) -> Self {
        Self { region, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.region.len()
    }

    pub fn remaining(&self) -> usize {
        self.region.len().saturating_sub(self.pos)
    }

    fn bounds_check(&self, nbytes: usize) -> Result<()> {
        if self.pos.saturating_add(nbytes) > self.region.len() {
            return Err(NxsError::Fatal(format!(
                "cursor read/write of {nbytes} bytes at offset {} exceeds region of {} bytes",
                self.pos,
                self.region.len()
            )));
        }
        Ok(())
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.region.len() {
            return Err(NxsError::Fatal(format!(
                "seek to {pos} exceeds region of {} bytes",
                self.region.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn advance(&mut self, nbytes: usize) -> Result<()> {
        self.bounds_check(nbytes)?;
        self.pos += nbytes;
        Ok(())
    }

    pub fn fetch_bytes(&mut self, nbytes: usize) -> Result<&[u8]> {
        self.bounds_check(nbytes)?;
        let slice = &self.region[self.pos..self.pos + nbytes];
        self.pos += nbytes;
        Ok(slice)
    }

    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.bounds_check(bytes.len())?;
        self.region[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    pub fn fetch_u16(&mut self) -> Result<u16> {
        let b = self.fetch_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn store_u16(&mut self, v: u16) -> Result<()> {
        self.store_bytes(&v.to_be_bytes())
    }

    pub fn fetch_u32(&mut self) -> Result<u32> {
        let b = self.fetch_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn store_u32(&mut self, v: u32) -> Result<()> {
        self.store_bytes(&v.to_be_bytes())
    }

    pub fn fetch_u64(&mut self) -> Result<u64> {
        let b = self.fetch_bytes(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn store_u64(&mut self, v: u64) -> Result<()> {
        self.store_bytes(&v.to_be_bytes())
    }
}

/// Read a big-endian `u32` directly from a slice without constructing a
/// cursor, for call sites that only need a one-off header field read.
pub fn read_u32_be(region: &[u8], offset: usize) -> Result<u32> {
    if offset + 4 > region.len() {
        return Err(NxsError::Fatal(format!(
            "read_u32_be at offset {offset} exceeds region of {} bytes",
            region.len()
        )));
    }
    Ok(u32::from_be_bytes([
        region[offset],
        region[offset + 1],
        region[offset + 2],
        region[offset + 3],
    ]))
}

pub fn read_u64_be(region: &[u8], offset: usize) -> Result<u64> {
    if offset + 8 > region.len() {
        return Err(NxsError::Fatal(format!(
            "read_u64_be at offset {offset} exceeds region of {} bytes",
            region.len()
        )));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&region[offset..offset + 8]);
    Ok(u64::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_fixed_width_integers() {
        let mut buf = vec![0u8; 32];
        {
            let mut cur = Cursor::new(&mut buf);
            cur.store_u16(0x0102).unwrap();
            cur.store_u32(0x0304_0506).unwrap();
            cur.store_u64(0x0708_090a_0b0c_0d0e).unwrap();
        }
        let mut cur = Cursor::new(&mut buf);
        assert_eq!(cur.fetch_u16().unwrap(), 0x0102);
        assert_eq!(cur.fetch_u32().unwrap(), 0x0304_0506);
        assert_eq!(cur.fetch_u64().unwrap(), 0x0708_090a_0b0c_0d0e);
    }

    #[test]
    fn big_endian_byte_order_on_the_wire() {
        let mut buf = vec![0u8; 4];
        Cursor::new(&mut buf).store_u32(1).unwrap();
        assert_eq!(buf, vec![0, 0, 0, 1]);
    }

    #[test]
    fn fetch_past_the_end_fails_instead_of_panicking() {
        let mut buf = vec![0u8; 3];
        let mut cur = Cursor::new(&mut buf);
        assert!(cur.fetch_u32().is_err());
    }

    #[test]
    fn seek_past_the_end_fails() {
        let mut buf = vec![0u8; 4];
        let mut cur = Cursor::new(&mut buf);
        assert!(cur.seek(5).is_err());
        assert!(cur.seek(4).is_ok());
    }

    #[test]
    fn helper_reads_match_cursor_reads() {
        let mut buf = vec![0u8; 8];
        Cursor::new(&mut buf).store_u64(42).unwrap();
        assert_eq!(read_u64_be(&buf, 0).unwrap(), 42);
        assert_eq!(read_u32_be(&buf, 4).unwrap(), 42);
    }
}
