#![forbid(unsafe_code)]

/// Length of a hex-encoded SHA-256 digest as stored in the trailer.
pub const HASH_LEN: usize = 64;

/// Width of the `name_len` field of a record (i32).
pub const NAME_LEN_SIZE: usize = 4;

/// Width of the `file_size` field of a record (i64).
pub const FILE_SIZE_SIZE: usize = 8;

/// Width of the `table_size` field (i32).
pub const TABLE_SIZE_SIZE: usize = 4;

/// Fixed tail of every composite: `table_size` + `table_hash`.
pub const TRAILER_TAIL: usize = TABLE_SIZE_SIZE + HASH_LEN;

/// Encoded length of one table record for a name of `name_len` UTF-8 bytes.
pub const fn record_len(name_len: usize) -> usize {
    NAME_LEN_SIZE + name_len + FILE_SIZE_SIZE + HASH_LEN
}

/// Public view of a trailer entry (for listing and inspection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    /// Absolute offset of the entry's bytes in the composite file.
    pub payload_offset: u64,
    pub size: u64,
    /// SHA-256 (hex) of the entry's bytes.
    pub digest: String,
}
