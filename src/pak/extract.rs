#![forbid(unsafe_code)]

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::pak::descriptor::Descriptor;
use crate::pak::error::{PakError, PakResult};
use crate::pak::events::{CancelFlag, Event, EventSink, FileFailure};
use crate::pak::hash::{hash_reader, normalize_digest};
use crate::pak::io::copy_n;
use crate::pak::path::output_path;
use crate::pak::table::TrailerTable;

/// Outcome of an [`extract`] that got past the trailer check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub extracted: Vec<String>,
    pub failed: Vec<(String, FileFailure)>,
    /// Stopped early on request; the remaining files were not touched.
    pub cancelled: bool,
}

impl ExtractReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

/// Recreate the files packed into `source` under `dest`.
///
/// `dest` is wiped first. With no `source` the running executable is read,
/// which is how a packed binary unpacks itself. Per-file failures are
/// reported and skipped; an unreadable or tampered trailer aborts before
/// anything is written.
pub fn extract(
    dest: &Path,
    source: Option<&Path>,
    cancel: &CancelFlag,
    sink: &dyn EventSink,
) -> PakResult<ExtractReport> {
    let res = resolve_source(source).and_then(|source| extract_inner(dest, &source, cancel, sink));
    match &res {
        Ok(report) if !report.cancelled => sink.emit(Event::ExtractSuccess {
            files: report.extracted.len(),
        }),
        Ok(_) => {}
        Err(e) => sink.emit(Event::Failure(e.to_string())),
    }
    res
}

fn resolve_source(source: Option<&Path>) -> PakResult<PathBuf> {
    let source = match source {
        Some(p) => p.to_path_buf(),
        None => std::env::current_exe()?,
    };
    if !source.is_file() {
        return Err(PakError::PathNotFound(source));
    }
    Ok(source)
}

fn extract_inner(
    dest: &Path,
    source: &Path,
    cancel: &CancelFlag,
    sink: &dyn EventSink,
) -> PakResult<ExtractReport> {
    let mut input = File::open(source)?;
    let mut table = TrailerTable::default();
    table.read_from(&mut input)?;

    tracing::info!(dest = %dest.display(), "preparing directory");
    if dest.exists() {
        fs::remove_dir_all(dest)?;
    }
    fs::create_dir_all(dest)?;

    let start = input.seek(SeekFrom::End(table.payload_start_from_end()))?;
    let files: Vec<&Descriptor> = table.descriptors().iter().filter(|d| d.is_valid()).collect();

    sink.emit(Event::ExtractStart {
        source: source.to_path_buf(),
        dest: dest.to_path_buf(),
        files: files.len(),
    });

    let mut report = ExtractReport::default();
    let mut offset = start;
    for (i, d) in files.iter().enumerate() {
        if cancel.is_cancelled() {
            sink.emit(Event::ExtractCancelled {
                remaining: files.len() - i,
            });
            report.cancelled = true;
            return Ok(report);
        }

        sink.emit(Event::ExtractFileStart {
            name: d.name().to_string(),
        });

        // a failed copy leaves the cursor mid-file
        if input.stream_position()? != offset {
            input.seek(SeekFrom::Start(offset))?;
        }
        offset += d.size();

        match extract_file(&mut input, dest, d) {
            Ok(()) => {
                sink.emit(Event::ExtractFileDone {
                    name: d.name().to_string(),
                });
                report.extracted.push(d.name().to_string());
            }
            Err(failure) => {
                sink.emit(Event::ExtractFileFailed {
                    name: d.name().to_string(),
                    failure: failure.clone(),
                });
                report.failed.push((d.name().to_string(), failure));
            }
        }
    }

    Ok(report)
}

/// Copy one file out of the payload at the current cursor and check its hash.
///
/// A file whose hash does not match stays on disk; a file whose copy failed
/// is removed.
fn extract_file(input: &mut File, dest: &Path, d: &Descriptor) -> Result<(), FileFailure> {
    let copy_err = |e: std::io::Error| FileFailure::Copy(e.to_string());

    let out_path = output_path(dest, d.name()).map_err(|_| FileFailure::UnsafeName)?;
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).map_err(copy_err)?;
    }

    if d.size() == 0 {
        File::create(&out_path).map_err(copy_err)?;
        return Ok(());
    }

    let mut out = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&out_path)
        .map_err(copy_err)?;

    let copied = copy_n(input, &mut out, d.size()).and_then(|()| out.flush());
    if let Err(e) = copied {
        drop(out);
        let _ = fs::remove_file(&out_path);
        return Err(copy_err(e));
    }

    // re-read what actually landed on disk
    out.seek(SeekFrom::Start(0)).map_err(copy_err)?;
    let actual = hash_reader(&mut out, None).map_err(copy_err)?;
    let expected = normalize_digest(d.digest());
    if actual != expected {
        tracing::info!(name = d.name(), %actual, %expected, "extracted file hash mismatch");
        return Err(FileFailure::HashMismatch { expected, actual });
    }
    Ok(())
}
