#![forbid(unsafe_code)]

use std::io::{self, Read, Write};

use crate::pak::error::PakResult;

pub fn write_i32(w: &mut dyn Write, v: i32) -> PakResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn write_i64(w: &mut dyn Write, v: i64) -> PakResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn read_exact<const N: usize>(r: &mut dyn Read) -> PakResult<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_i32(r: &mut dyn Read) -> PakResult<i32> {
    Ok(i32::from_le_bytes(read_exact::<4>(r)?))
}

pub fn read_i64(r: &mut dyn Read) -> PakResult<i64> {
    Ok(i64::from_le_bytes(read_exact::<8>(r)?))
}

pub fn read_vec(r: &mut dyn Read, len: usize) -> PakResult<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Copy exactly `size` bytes from `r` to `w`.
///
/// A source that ends early is an `UnexpectedEof` error; whatever was
/// copied before that stays in `w`.
pub fn copy_n(r: &mut dyn Read, w: &mut dyn Write, size: u64) -> io::Result<()> {
    let copied = io::copy(&mut r.take(size), w)?;
    if copied != size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {size} bytes, source ended after {copied}"),
        ));
    }
    Ok(())
}
