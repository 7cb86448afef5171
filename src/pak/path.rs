#![forbid(unsafe_code)]

use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::pak::error::{PakError, PakResult};

pub fn normalize_rel_path(input_root: &Path, file_path: &Path) -> PakResult<String> {
    let rel = file_path
        .strip_prefix(input_root)
        .map_err(|_| PakError::Outside(file_path.to_string_lossy().into_owned()))?;

    let mut parts = Vec::new();
    for comp in rel.components() {
        let part = comp.as_os_str().to_str().ok_or_else(|| {
            PakError::Invalid(format!("name is not utf8: {}", file_path.display()))
        })?;
        parts.push(part);
    }
    let out = parts.join("/");
    // on Windows a stray `\` is a separator; elsewhere it is part of the name
    #[cfg(windows)]
    let out = out.replace('\\', "/");
    let out = out.trim_start_matches('/');

    if out.is_empty() {
        return Err(PakError::Invalid("empty relative path".into()));
    }

    Ok(out.to_string())
}

/// Every file under `root`, recursively, ordered by path.
///
/// Symlinks are listed unless they point at a directory; a dangling link is
/// listed too so the caller can report it as unreadable.
pub fn list_all_files(root: &Path) -> PakResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for ent in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
    {
        let ent = ent.map_err(|e| {
            let msg = e.to_string();
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, msg));
            PakError::Io(io)
        })?;

        let ft = ent.file_type();
        if ft.is_file() || (ft.is_symlink() && !ent.path().is_dir()) {
            files.push(ent.into_path());
        }
    }
    Ok(files)
}

/// Map a trailer name onto `root`, refusing anything that would land outside it.
pub fn output_path(root: &Path, name: &str) -> PakResult<PathBuf> {
    let rel = Path::new(name);
    let mut out = root.to_path_buf();
    for comp in rel.components() {
        match comp {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return Err(PakError::Outside(name.to_string())),
        }
    }
    if out == root {
        return Err(PakError::Invalid(format!("empty entry name: {name:?}")));
    }
    Ok(out)
}
