#![forbid(unsafe_code)]

use std::io::{self, Read};

use sha2::{Digest, Sha256};

const BLOCK_SIZE: usize = 4096;

/// Hash bytes from the reader's current position.
///
/// With `limit == Some(n)` exactly `n` bytes are consumed (fewer only if the
/// reader hits EOF first); with `None` the reader is drained. Memory use is
/// one block regardless of the range length.
pub fn hash_reader<R: Read + ?Sized>(reader: &mut R, limit: Option<u64>) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; BLOCK_SIZE];
    let mut total: u64 = 0;

    loop {
        let want = match limit {
            Some(n) if total >= n => break,
            Some(n) => (n - total).min(BLOCK_SIZE as u64) as usize,
            None => BLOCK_SIZE,
        };
        let read = match reader.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..read]);
        total += read as u64;
    }

    tracing::trace!(bytes = total, ?limit, "hashed range");
    Ok(hex::encode(hasher.finalize()))
}

/// Canonical form of a stored digest: hex digits only, lowercase.
pub fn normalize_digest(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

pub fn is_hex_digest(s: &str) -> bool {
    s.len() == crate::pak::format::HASH_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Reader adaptor that hashes everything read through it.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    pub fn finalize(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}
