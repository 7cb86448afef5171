#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;

use crate::pak::error::{PakError, PakResult};
use crate::pak::events::FileFailure;
use crate::pak::format::EntryInfo;
use crate::pak::hash::{hash_reader, normalize_digest};
use crate::pak::table::TrailerTable;

/// Read trailer entries (without extracting payloads).
pub fn entries(composite: &Path) -> PakResult<Vec<EntryInfo>> {
    let mut f = File::open(composite)?;
    let mut table = TrailerTable::default();
    table.read_from(&mut f)?;
    Ok(table.entries(f.metadata()?.len()))
}

pub fn list(composite: &Path, verbose: bool) -> PakResult<()> {
    for e in entries(composite)? {
        if verbose {
            println!(
                "{}  off={} size={} sha256={}",
                e.name, e.payload_offset, e.size, e.digest
            );
        } else {
            println!("{}", e.name);
        }
    }
    Ok(())
}

/// Result of checking every payload in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub ok: usize,
    pub bad: Vec<(String, FileFailure)>,
}

/// Check the trailer hash, then re-hash each payload without extracting it.
pub fn verify(composite: &Path) -> PakResult<VerifyReport> {
    let mut f = File::open(composite)?;
    let mut table = TrailerTable::default();
    table.read_from(&mut f)?;

    let mut report = VerifyReport::default();
    for e in table.entries(f.metadata()?.len()) {
        f.seek(SeekFrom::Start(e.payload_offset))?;
        let actual = hash_reader(&mut f, Some(e.size))?;
        let expected = normalize_digest(&e.digest);
        if actual == expected {
            report.ok += 1;
        } else {
            tracing::warn!(name = %e.name, %actual, %expected, "payload hash mismatch");
            report.bad.push((e.name, FileFailure::HashMismatch { expected, actual }));
        }
    }
    Ok(report)
}

/// CLI wrapper around [`verify`]: any bad entry is an error.
pub fn verify_print(composite: &Path) -> PakResult<()> {
    let report = verify(composite)?;
    for (name, failure) in &report.bad {
        println!("bad: {name}: {failure}");
    }
    if !report.bad.is_empty() {
        return Err(PakError::Invalid(format!(
            "{} of {} entries failed verification",
            report.bad.len(),
            report.bad.len() + report.ok
        )));
    }
    println!("ok: {} entries", report.ok);
    Ok(())
}
