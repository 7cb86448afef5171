#![forbid(unsafe_code)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::pak::descriptor::Descriptor;
use crate::pak::error::{PakError, PakResult};
use crate::pak::events::{Event, EventSink};
use crate::pak::hash::{normalize_digest, HashingReader};
use crate::pak::io::copy_n;
use crate::pak::path::list_all_files;
use crate::pak::table::TrailerTable;

/// Outcome of a successful [`pack`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackReport {
    /// Names written to the trailer, in payload order.
    pub attached: Vec<String>,
    /// Files under the data directory that were left out.
    pub skipped: Vec<PathBuf>,
    pub payload_bytes: u64,
    /// Length of the finished composite file.
    pub total_size: u64,
}

/// Append every file under `data` to a copy of `source`, written to `dest`.
///
/// Output layout: source bytes, then each file's bytes in walk order, then
/// the trailer (see [`TrailerTable`]). Files that cannot be read are skipped
/// and left out of the table. Nothing is written when a precondition fails.
pub fn pack(
    source: &Path,
    dest: &Path,
    data: &Path,
    sink: &dyn EventSink,
) -> PakResult<PackReport> {
    let res = pack_inner(source, dest, data, sink);
    match &res {
        Ok(report) => sink.emit(Event::PackSuccess {
            files: report.attached.len(),
            bytes: report.total_size,
        }),
        Err(e) => sink.emit(Event::Failure(e.to_string())),
    }
    res
}

fn check_preconditions(source: &Path, dest: &Path, data: &Path) -> PakResult<Vec<PathBuf>> {
    if !source.is_file() {
        return Err(PakError::PathNotFound(source.to_path_buf()));
    }
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            return Err(PakError::PathNotFound(parent.to_path_buf()));
        }
    }
    if !data.is_dir() {
        return Err(PakError::PathNotFound(data.to_path_buf()));
    }
    if dest.exists() && fs::canonicalize(dest)? == fs::canonicalize(source)? {
        return Err(PakError::Invalid(format!(
            "output would overwrite the base file: {}",
            dest.display()
        )));
    }

    let files = list_all_files(data)?;
    if files.is_empty() {
        return Err(PakError::EmptySource(data.to_path_buf()));
    }
    Ok(files)
}

fn pack_inner(
    source: &Path,
    dest: &Path,
    data: &Path,
    sink: &dyn EventSink,
) -> PakResult<PackReport> {
    let files = check_preconditions(source, dest, data)?;

    sink.emit(Event::PackStart {
        source: source.to_path_buf(),
        dest: dest.to_path_buf(),
        data: data.to_path_buf(),
    });

    let mut report = PackReport::default();
    let mut candidates: Vec<(PathBuf, Descriptor)> = Vec::with_capacity(files.len());
    for path in files {
        let d = Descriptor::from_file(&path, data);
        if d.is_valid() {
            candidates.push((path, d));
        } else {
            sink.emit(Event::PackFileSkipped {
                path: path.clone(),
                reason: "cannot be read".into(),
            });
            report.skipped.push(path);
        }
    }

    let base_copy = |e: io::Error| PakError::BaseCopy {
        path: source.to_path_buf(),
        source: e,
    };
    let mut base = File::open(source).map_err(base_copy)?;
    let mut out = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(dest)?;
    io::copy(&mut base, &mut out).map_err(base_copy)?;
    drop(base);

    let mut kept: Vec<Descriptor> = Vec::with_capacity(candidates.len());
    for (path, d) in candidates {
        match append_file(&mut out, &path, &d) {
            Ok(()) => {
                sink.emit(Event::PackFileAttached {
                    name: d.name().to_string(),
                    size: d.size(),
                });
                report.attached.push(d.name().to_string());
                report.payload_bytes += d.size();
                kept.push(d);
            }
            Err(e) => {
                sink.emit(Event::PackFileSkipped {
                    path: path.clone(),
                    reason: e.to_string(),
                });
                report.skipped.push(path);
            }
        }
    }

    let mut table = TrailerTable::new(kept);
    table.write_to(&mut out)?;
    out.sync_all()?;
    report.total_size = out.metadata()?.len();
    drop(out);

    copy_permissions(source, dest)?;
    Ok(report)
}

/// Append one file to the payload.
///
/// The bytes are hashed on the way through; a short read, an I/O error or a
/// digest that no longer matches the descriptor truncates `out` back to where
/// it was, so the payload only ever holds files that are in the table.
fn append_file(out: &mut File, path: &Path, d: &Descriptor) -> io::Result<()> {
    let start = out.seek(SeekFrom::End(0))?;
    let res = File::open(path).and_then(|f| {
        let mut reader = HashingReader::new(f);
        copy_n(&mut reader, out, d.size())?;
        let actual = reader.finalize();
        if actual != normalize_digest(d.digest()) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} changed while packing", path.display()),
            ));
        }
        Ok(())
    });

    if res.is_err() {
        out.set_len(start)?;
        out.seek(SeekFrom::Start(start))?;
    }
    res
}

#[cfg(unix)]
fn copy_permissions(source: &Path, dest: &Path) -> PakResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::metadata(source)?.permissions().mode();
    fs::set_permissions(dest, fs::Permissions::from_mode(mode | 0o200))?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_permissions(_source: &Path, _dest: &Path) -> PakResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::mpsc;

    use crate::pak::format::TRAILER_TAIL;

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join("base.bin"), b"BBBBBBBBBB").unwrap();
            fs::create_dir_all(dir.path().join("data/sub")).unwrap();
            fs::write(dir.path().join("data/a.txt"), b"aaaaa").unwrap();
            fs::write(dir.path().join("data/sub/b.txt"), b"").unwrap();
            Self { dir }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.dir.path().join(rel)
        }
    }

    #[test]
    fn packs_base_payload_and_trailer() {
        let fx = Fixture::new();
        let report = pack(&fx.path("base.bin"), &fx.path("out.bin"), &fx.path("data"), &()).unwrap();

        assert_eq!(report.attached, vec!["a.txt", "sub/b.txt"]);
        assert!(report.skipped.is_empty());
        assert_eq!(report.payload_bytes, 5);

        let bytes = fs::read(fx.path("out.bin")).unwrap();
        let table_size = (4 + 5 + 8 + 64) + (4 + 9 + 8 + 64);
        assert_eq!(bytes.len(), 10 + 5 + table_size + TRAILER_TAIL);
        assert_eq!(report.total_size, bytes.len() as u64);
        assert_eq!(&bytes[..15], b"BBBBBBBBBBaaaaa");

        let mut table = TrailerTable::default();
        table.read_from(&mut File::open(fx.path("out.bin")).unwrap()).unwrap();
        assert_eq!(table.table_size() as usize, table_size);
        assert_eq!(table.descriptors()[1].size(), 0);
    }

    #[test]
    fn emits_lifecycle_events_in_order() {
        let fx = Fixture::new();
        let (tx, rx) = mpsc::channel();
        pack(&fx.path("base.bin"), &fx.path("out.bin"), &fx.path("data"), &tx).unwrap();
        drop(tx);

        let events: Vec<Event> = rx.iter().collect();
        assert!(matches!(events[0], Event::PackStart { .. }));
        assert_eq!(
            events[1],
            Event::PackFileAttached {
                name: "a.txt".into(),
                size: 5
            }
        );
        assert_eq!(
            events[2],
            Event::PackFileAttached {
                name: "sub/b.txt".into(),
                size: 0
            }
        );
        assert!(matches!(events[3], Event::PackSuccess { files: 2, .. }));
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn missing_source_fails_without_output() {
        let fx = Fixture::new();
        let (tx, rx) = mpsc::channel();
        let err = pack(&fx.path("nope.bin"), &fx.path("out.bin"), &fx.path("data"), &tx).unwrap_err();
        drop(tx);

        assert!(matches!(err, PakError::PathNotFound(_)));
        assert!(!fx.path("out.bin").exists());
        let events: Vec<Event> = rx.iter().collect();
        assert!(matches!(events.as_slice(), [Event::Failure(_)]));
    }

    #[test]
    fn missing_dest_parent_fails() {
        let fx = Fixture::new();
        let err = pack(
            &fx.path("base.bin"),
            &fx.path("no/such/dir/out.bin"),
            &fx.path("data"),
            &(),
        )
        .unwrap_err();
        assert!(matches!(err, PakError::PathNotFound(p) if p.ends_with("no/such/dir")));
    }

    #[test]
    fn missing_data_dir_fails() {
        let fx = Fixture::new();
        let err = pack(&fx.path("base.bin"), &fx.path("out.bin"), &fx.path("nodata"), &()).unwrap_err();
        assert!(matches!(err, PakError::PathNotFound(_)));
        assert!(!fx.path("out.bin").exists());
    }

    #[test]
    fn empty_data_dir_fails() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.path("empty/nested")).unwrap();
        let err = pack(&fx.path("base.bin"), &fx.path("out.bin"), &fx.path("empty"), &()).unwrap_err();
        assert!(matches!(err, PakError::EmptySource(_)));
        assert!(!fx.path("out.bin").exists());
    }

    #[test]
    fn refuses_to_overwrite_base() {
        let fx = Fixture::new();
        let err = pack(&fx.path("base.bin"), &fx.path("base.bin"), &fx.path("data"), &()).unwrap_err();
        assert!(matches!(err, PakError::Invalid(_)));
        assert_eq!(fs::read(fx.path("base.bin")).unwrap(), b"BBBBBBBBBB");
    }

    #[test]
    fn failed_append_rolls_back_payload() {
        let fx = Fixture::new();
        let mut out = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(fx.path("out.bin"))
            .unwrap();
        out.write_all(b"BASE").unwrap();

        // descriptor claims different content than what is on disk
        let stale = Descriptor::new("a.txt", 5, "0".repeat(64));
        assert!(append_file(&mut out, &fx.path("data/a.txt"), &stale).is_err());
        assert_eq!(out.metadata().unwrap().len(), 4);

        // and a file that vanished
        let gone = Descriptor::new("gone", 3, "0".repeat(64));
        assert!(append_file(&mut out, &fx.path("data/gone"), &gone).is_err());
        assert_eq!(out.metadata().unwrap().len(), 4);

        let good = Descriptor::from_file(&fx.path("data/a.txt"), &fx.path("data"));
        append_file(&mut out, &fx.path("data/a.txt"), &good).unwrap();
        drop(out);
        assert_eq!(fs::read(fx.path("out.bin")).unwrap(), b"BASEaaaaa");
    }

    #[cfg(unix)]
    #[test]
    fn file_symlinks_are_attached_dangling_ones_reported() {
        use std::os::unix::fs::symlink;

        let fx = Fixture::new();
        fs::write(fx.path("real.txt"), b"linked").unwrap();
        symlink(fx.path("real.txt"), fx.path("data/link.txt")).unwrap();
        symlink(fx.path("missing.txt"), fx.path("data/dangling.txt")).unwrap();

        let (tx, rx) = mpsc::channel();
        let report = pack(&fx.path("base.bin"), &fx.path("out.bin"), &fx.path("data"), &tx).unwrap();
        drop(tx);

        assert_eq!(report.attached, vec!["a.txt", "link.txt", "sub/b.txt"]);
        assert_eq!(report.skipped, vec![fx.path("data/dangling.txt")]);
        assert_eq!(report.payload_bytes, 5 + 6);
        let events: Vec<Event> = rx.iter().collect();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::PackFileSkipped { path, .. } if path.ends_with("dangling.txt"))));
    }

    #[cfg(unix)]
    #[test]
    fn output_keeps_base_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let fx = Fixture::new();
        fs::set_permissions(fx.path("base.bin"), fs::Permissions::from_mode(0o755)).unwrap();
        pack(&fx.path("base.bin"), &fx.path("out.bin"), &fx.path("data"), &()).unwrap();
        let mode = fs::metadata(fx.path("out.bin")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
