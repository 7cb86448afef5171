#![forbid(unsafe_code)]

use std::io::{Read, Seek, SeekFrom, Write};

use crate::pak::descriptor::Descriptor;
use crate::pak::error::{PakError, PakResult};
use crate::pak::format::{record_len, EntryInfo, HASH_LEN, TRAILER_TAIL};
use crate::pak::hash::{hash_reader, is_hex_digest, normalize_digest};
use crate::pak::io::{read_i32, read_i64, read_vec, write_i32, write_i64};

/// Trailer layout, anchored to end of file:
/// - base file bytes (unknown length)
/// - payload: file_1 .. file_N, back to back
/// - table: one record per file
///   - [i32 name_len][name bytes UTF-8]
///   - [i64 file_size]
///   - [file_hash, 64 ASCII hex]
/// - [i32 table_size] (record bytes only)
/// - [table_hash, 64 ASCII hex] = sha256 of everything before table_size
///
/// Integers are little-endian.
#[derive(Debug, Default)]
pub struct TrailerTable {
    descriptors: Vec<Descriptor>,
    table_size: u32,
    total_payload_size: u64,
}

impl TrailerTable {
    pub fn new(descriptors: Vec<Descriptor>) -> Self {
        let mut table = Self {
            descriptors,
            table_size: 0,
            total_payload_size: 0,
        };
        table.recompute();
        table
    }

    fn recompute(&mut self) {
        let valid = self.descriptors.iter().filter(|d| d.is_valid());
        let (mut table_size, mut total) = (0u64, 0u64);
        for d in valid {
            table_size += record_len(d.name().len()) as u64;
            total += d.size();
        }
        self.table_size = table_size.min(u32::MAX as u64) as u32;
        self.total_payload_size = total;
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn into_descriptors(self) -> Vec<Descriptor> {
        self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Byte length of the serialized records.
    pub fn table_size(&self) -> u32 {
        self.table_size
    }

    /// Sum of the sizes of all valid descriptors.
    pub fn total_payload_size(&self) -> u64 {
        self.total_payload_size
    }

    /// Offset of the first payload byte relative to end of stream (negative).
    pub fn payload_start_from_end(&self) -> i64 {
        -((self.total_payload_size + self.table_size as u64 + TRAILER_TAIL as u64) as i64)
    }

    /// Append the trailer to the end of `stream`.
    ///
    /// The payload must already be in place: the table hash covers every byte
    /// from offset 0 to the end of the records.
    pub fn write_to<S: Read + Write + Seek>(&mut self, stream: &mut S) -> PakResult<()> {
        let mut records: Vec<u8> = Vec::new();
        let mut total: u64 = 0;

        for d in self.descriptors.iter().filter(|d| d.is_valid()) {
            let name = d.name().as_bytes();
            let name_len = i32::try_from(name.len())
                .map_err(|_| PakError::Invalid(format!("name too long: {}", d.name())))?;
            let size = i64::try_from(d.size())
                .map_err(|_| PakError::Invalid(format!("file too large: {}", d.name())))?;
            let digest = normalize_digest(d.digest());
            if !is_hex_digest(&digest) {
                return Err(PakError::Invalid(format!("bad digest for {}: {}", d.name(), d.digest())));
            }

            write_i32(&mut records, name_len)?;
            records.extend_from_slice(name);
            write_i64(&mut records, size)?;
            records.extend_from_slice(digest.as_bytes());
            total += d.size();

            tracing::debug!(
                name = d.name(),
                name_len,
                size,
                digest = %digest,
                table_size = records.len(),
                "table entry"
            );
        }

        let table_size = i32::try_from(records.len())
            .map_err(|_| PakError::Invalid(format!("table too large: {} bytes", records.len())))?;

        stream.seek(SeekFrom::End(0))?;
        stream.write_all(&records)?;
        stream.flush()?;

        // separate pass: hash everything written so far from the start
        let tail = stream.stream_position()?;
        stream.seek(SeekFrom::Start(0))?;
        let table_hash = hash_reader(stream, Some(tail))?;
        stream.seek(SeekFrom::Start(tail))?;

        write_i32(stream, table_size)?;
        stream.write_all(table_hash.as_bytes())?;
        stream.flush()?;

        self.table_size = table_size as u32;
        self.total_payload_size = total;

        tracing::info!(table_size, table_hash = %table_hash, "trailer written");
        Ok(())
    }

    /// Parse the trailer at the end of `stream`, replacing this table's
    /// descriptors on success.
    ///
    /// The stream is only read. On error the current descriptors are left as
    /// they were.
    pub fn read_from<S: Read + Seek>(&mut self, stream: &mut S) -> PakResult<()> {
        let len = stream.seek(SeekFrom::End(0))?;
        if len < TRAILER_TAIL as u64 {
            return Err(PakError::Malformed(format!("stream too small: {len} bytes")));
        }
        let hashed_len = len - TRAILER_TAIL as u64;

        stream.seek(SeekFrom::Start(0))?;
        let computed = hash_reader(stream, Some(hashed_len))?;

        stream.seek(SeekFrom::End(-(HASH_LEN as i64)))?;
        let raw = read_vec(stream, HASH_LEN)?;
        let stored = normalize_digest(&String::from_utf8_lossy(&raw));

        if stored != computed {
            tracing::info!(stored = %stored, computed = %computed, "trailer hash mismatch");
            return Err(PakError::Integrity { stored, computed });
        }
        tracing::debug!("trailer hash ok");

        stream.seek(SeekFrom::End(-(TRAILER_TAIL as i64)))?;
        let table_size = read_i32(stream)?;
        if table_size < 0 || table_size as u64 > hashed_len {
            return Err(PakError::Malformed(format!("table size {table_size} out of range")));
        }
        tracing::debug!(table_size, "table size");

        stream.seek(SeekFrom::End(
            -(TRAILER_TAIL as i64) - i64::from(table_size),
        ))?;

        let mut parsed = Vec::new();
        let mut total: u64 = 0;
        let mut remaining = i64::from(table_size);
        while remaining > 0 {
            let name_len = read_i32(stream)?;
            if name_len <= 0 {
                return Err(PakError::Malformed(format!("bad name length {name_len}")));
            }
            let consumed = record_len(name_len as usize) as i64;
            if consumed > remaining {
                return Err(PakError::Malformed(format!(
                    "record of {consumed} bytes overruns table ({remaining} left)"
                )));
            }

            let name = String::from_utf8(read_vec(stream, name_len as usize)?)
                .map_err(|_| PakError::Malformed("name is not utf8".into()))?;
            let size = read_i64(stream)?;
            let size = u64::try_from(size)
                .map_err(|_| PakError::Malformed(format!("negative size for {name}")))?;
            let digest = String::from_utf8(read_vec(stream, HASH_LEN)?)
                .ok()
                .filter(|d| is_hex_digest(d))
                .ok_or_else(|| PakError::Malformed(format!("bad digest for {name}")))?;

            tracing::info!(name = %name, size, digest = %digest, "table entry");
            total = total
                .checked_add(size)
                .ok_or_else(|| PakError::Malformed("payload size overflow".into()))?;
            parsed.push(Descriptor::new(name, size, digest));
            remaining -= consumed;
        }
        debug_assert_eq!(remaining, 0);

        if total > hashed_len - table_size as u64 {
            return Err(PakError::Malformed(format!(
                "payload of {total} bytes does not fit in {len} byte stream"
            )));
        }

        self.descriptors = parsed;
        self.table_size = table_size as u32;
        self.total_payload_size = total;
        Ok(())
    }

    /// Entries with their absolute payload offsets in a stream of `len` bytes.
    pub fn entries(&self, len: u64) -> Vec<EntryInfo> {
        let mut offset = len.saturating_sub(self.payload_start_from_end().unsigned_abs());
        self.descriptors
            .iter()
            .filter(|d| d.is_valid())
            .map(|d| {
                let info = EntryInfo {
                    name: d.name().to_string(),
                    payload_offset: offset,
                    size: d.size(),
                    digest: d.digest().to_string(),
                };
                offset += d.size();
                info
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pak::hash::hash_reader;
    use std::io::Cursor;

    fn digest_of(bytes: &[u8]) -> String {
        hash_reader(&mut Cursor::new(bytes), None).unwrap()
    }

    /// base + payload for the given files, followed by a written trailer.
    fn composite(base: &[u8], files: &[(&str, &[u8])]) -> (Cursor<Vec<u8>>, TrailerTable) {
        let mut buf = base.to_vec();
        let mut descs = Vec::new();
        for (name, data) in files {
            buf.extend_from_slice(data);
            descs.push(Descriptor::new(*name, data.len() as u64, digest_of(data)));
        }
        let mut cur = Cursor::new(buf);
        let mut table = TrailerTable::new(descs);
        table.write_to(&mut cur).unwrap();
        (cur, table)
    }

    #[test]
    fn write_then_read_mirrors_descriptors() {
        let (mut cur, written) = composite(
            b"0123456789",
            &[("a.txt", &b"hello"[..]), ("sub/b.txt", &b""[..]), ("ünï/çødé.bin", &b"\x00\x01\x02"[..])],
        );

        let mut read = TrailerTable::default();
        read.read_from(&mut cur).unwrap();

        assert_eq!(read.descriptors(), written.descriptors());
        assert_eq!(read.table_size(), written.table_size());
        assert_eq!(read.total_payload_size(), 8);
    }

    #[test]
    fn table_size_sums_record_lengths() {
        let names = ["a.txt", "sub/b.txt", "日本語.txt"];
        let files: Vec<(&str, &[u8])> = names.iter().map(|n| (*n, &b"x"[..])).collect();
        let (cur, table) = composite(b"", &files);

        let expected: usize = names.iter().map(|n| 4 + n.len() + 8 + 64).sum();
        assert_eq!(table.table_size() as usize, expected);
        assert_eq!(cur.get_ref().len(), 3 + expected + 4 + 64);
    }

    #[test]
    fn example_layout_length() {
        let (cur, table) = composite(b"BBBBBBBBBB", &[("a.txt", &b"aaaaa"[..]), ("sub/b.txt", &b""[..])]);
        assert_eq!(
            cur.get_ref().len(),
            10 + 5 + table.table_size() as usize + 4 + 64
        );
        assert_eq!(table.payload_start_from_end(), -(cur.get_ref().len() as i64 - 10));
    }

    #[test]
    fn read_is_idempotent_and_does_not_mutate() {
        let (mut cur, _) = composite(b"base", &[("a", &b"1"[..]), ("b", &b"22"[..])]);
        let before = cur.get_ref().clone();

        let mut first = TrailerTable::default();
        first.read_from(&mut cur).unwrap();
        let mut second = TrailerTable::default();
        second.read_from(&mut cur).unwrap();

        assert_eq!(first.descriptors(), second.descriptors());
        assert_eq!(cur.get_ref(), &before);
    }

    #[test]
    fn any_flipped_byte_before_tail_fails_integrity() {
        let (cur, _) = composite(b"base!", &[("a.txt", &b"hello"[..]), ("b", &b"xy"[..])]);
        let bytes = cur.into_inner();
        let hashed = bytes.len() - TRAILER_TAIL;

        for i in 0..hashed {
            let mut tampered = bytes.clone();
            tampered[i] ^= 0x01;
            let mut table = TrailerTable::default();
            let res = table.read_from(&mut Cursor::new(tampered));
            assert!(
                matches!(res, Err(PakError::Integrity { .. })),
                "byte {i} flip went unnoticed"
            );
            assert!(table.is_empty());
        }
    }

    #[test]
    fn stored_hash_field_is_outside_hashed_range() {
        let (cur, _) = composite(b"base", &[("a", &b"1"[..])]);
        let mut bytes = cur.into_inner();
        let hash_start = bytes.len() - HASH_LEN;

        // uppercase is tolerated by the reader; the hashed bytes are untouched
        bytes[hash_start..].make_ascii_uppercase();
        let mut table = TrailerTable::default();
        table.read_from(&mut Cursor::new(bytes.clone())).unwrap();
        assert_eq!(table.len(), 1);

        // a genuinely different stored hash is detected as a mismatch, not a parse error
        bytes[hash_start] = if bytes[hash_start] == b'0' { b'1' } else { b'0' };
        let res = TrailerTable::default().read_from(&mut Cursor::new(bytes));
        assert!(matches!(res, Err(PakError::Integrity { .. })));
    }

    #[test]
    fn failed_read_keeps_existing_descriptors() {
        let (mut good, _) = composite(b"", &[("keep", &b"k"[..])]);
        let mut table = TrailerTable::default();
        table.read_from(&mut good).unwrap();

        let res = table.read_from(&mut Cursor::new(vec![0u8; 100]));
        assert!(res.is_err());
        assert_eq!(table.descriptors()[0].name(), "keep");
    }

    #[test]
    fn too_short_stream_is_malformed() {
        let res = TrailerTable::default().read_from(&mut Cursor::new(vec![0u8; 10]));
        assert!(matches!(res, Err(PakError::Malformed(_))));
    }

    /// Build a stream whose table bytes are arbitrary but correctly hashed.
    fn with_raw_table(table: &[u8], table_size: i32) -> Cursor<Vec<u8>> {
        let mut buf = b"base".to_vec();
        buf.extend_from_slice(table);
        let hash = digest_of(&buf);
        buf.extend_from_slice(&table_size.to_le_bytes());
        buf.extend_from_slice(hash.as_bytes());
        Cursor::new(buf)
    }

    #[test]
    fn record_overrunning_table_is_malformed() {
        let mut table = Vec::new();
        table.extend_from_slice(&1i32.to_le_bytes());
        table.push(b'a');
        table.extend_from_slice(&0i64.to_le_bytes());
        table.extend_from_slice(digest_of(b"").as_bytes());
        // four stray bytes: a second record header with nothing behind it
        table.extend_from_slice(&1i32.to_le_bytes());

        let mut cur = with_raw_table(&table, table.len() as i32);
        let res = TrailerTable::default().read_from(&mut cur);
        assert!(matches!(res, Err(PakError::Malformed(_))));
    }

    #[test]
    fn empty_name_record_is_malformed() {
        let mut table = Vec::new();
        table.extend_from_slice(&0i32.to_le_bytes());
        table.extend_from_slice(&0i64.to_le_bytes());
        table.extend_from_slice(digest_of(b"").as_bytes());

        let mut cur = with_raw_table(&table, table.len() as i32);
        let res = TrailerTable::default().read_from(&mut cur);
        assert!(matches!(res, Err(PakError::Malformed(_))));
    }

    #[test]
    fn negative_table_size_is_malformed() {
        let mut cur = with_raw_table(b"", -5);
        let res = TrailerTable::default().read_from(&mut cur);
        assert!(matches!(res, Err(PakError::Malformed(_))));
    }

    #[test]
    fn payload_larger_than_stream_is_malformed() {
        let mut rec = Vec::new();
        rec.extend_from_slice(&1i32.to_le_bytes());
        rec.push(b'a');
        rec.extend_from_slice(&1_000_000i64.to_le_bytes());
        rec.extend_from_slice(digest_of(b"").as_bytes());
        let mut cur = with_raw_table(&rec, rec.len() as i32);
        let res = TrailerTable::default().read_from(&mut cur);
        assert!(matches!(res, Err(PakError::Malformed(_))));
    }

    #[test]
    fn invalid_descriptors_are_not_written() {
        let mut descs = vec![Descriptor::new("a", 1, digest_of(b"1"))];
        descs.push(Descriptor::new("", 0, ""));
        let mut cur = Cursor::new(b"1".to_vec());
        let mut table = TrailerTable::new(descs);
        table.write_to(&mut cur).unwrap();
        assert_eq!(table.table_size() as usize, record_len(1));

        let mut read = TrailerTable::default();
        read.read_from(&mut cur).unwrap();
        assert_eq!(read.len(), 1);
    }

    #[test]
    fn entries_carry_absolute_offsets() {
        let (cur, table) = composite(b"0123456789", &[("a", &b"aaaaa"[..]), ("b", &b"bb"[..])]);
        let entries = table.entries(cur.get_ref().len() as u64);
        assert_eq!(entries[0].payload_offset, 10);
        assert_eq!(entries[1].payload_offset, 15);
        assert_eq!(entries[1].size, 2);
    }
}
