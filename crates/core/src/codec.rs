//! Little-endian integer codec for the dictionary file format
//!
//! Every multi-byte value in the file is a fixed-width little-endian
//! unsigned integer. Reads that run past the end of the stream are
//! reported as [`Error::UnexpectedEof`] rather than a generic I/O error.

use std::io::{self, Read, Write};

use crate::{Error, Result};

/// Magic bytes: `SDICT` followed by the format version (0x01) and a
/// reserved zero byte.
pub const MAGIC: [u8; 7] = *b"SDICT\x01\x00";

/// Read an exact number of bytes, mapping a short read to `UnexpectedEof`.
pub fn read_bytes<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<()> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::UnexpectedEof,
        _ => Error::Io(e),
    })
}

/// Read a little-endian u32.
pub fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_bytes(r, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64.
pub fn read_u64<R: Read>(r: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    read_bytes(r, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Write a little-endian u32.
pub fn write_u32<W: Write>(w: &mut W, val: u32) -> Result<()> {
    w.write_all(&val.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64.
pub fn write_u64<W: Write>(w: &mut W, val: u64) -> Result<()> {
    w.write_all(&val.to_le_bytes())?;
    Ok(())
}

/// Write `count` zero bytes.
pub fn write_nulls<W: Write>(w: &mut W, count: usize) -> Result<()> {
    const ZEROS: [u8; 256] = [0u8; 256];
    let mut left = count;
    while left > 0 {
        let n = left.min(ZEROS.len());
        w.write_all(&ZEROS[..n])?;
        left -= n;
    }
    Ok(())
}

/// Read and verify the magic bytes at the current position.
pub fn check_magic<R: Read>(r: &mut R) -> Result<()> {
    let mut buf = [0u8; MAGIC.len()];
    read_bytes(r, &mut buf)?;
    if buf != MAGIC {
        return Err(Error::Corrupt("incorrect magic bytes"));
    }
    Ok(())
}
