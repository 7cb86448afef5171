//! Append a directory of files to the end of an executable and get them back.
//!
//! A packed file is the untouched base binary followed by the payload and a
//! trailer table anchored to end of file. Every record carries the SHA-256 of
//! its file, and the whole prefix up to the table is covered by one more
//! SHA-256, so a composite can be checked without any header at a fixed
//! offset.
//!
//! ```text
//! [ base file ][ file_1 ] .. [ file_N ][ record_1 ] .. [ record_N ][ table_size ][ table_hash ]
//! ```

#![forbid(unsafe_code)]

pub mod pak;
