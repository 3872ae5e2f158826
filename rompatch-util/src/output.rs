use scopeguard::ScopeGuard;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// An output file that is deleted on drop unless [`keep`] is called.
pub(crate) type PendingFile = ScopeGuard<(File, PathBuf), fn((File, PathBuf))>;

/// Creates `path` for reading and writing.
///
/// Fails if the file exists and `overwrite` is `false`.
pub(crate) fn create(path: &Path, overwrite: bool) -> io::Result<PendingFile> {
    let mut opts = OpenOptions::new();
    opts.read(true).write(true);

    if overwrite {
        opts.create(true).truncate(true);
    } else {
        opts.create_new(true);
    }

    let file = opts.open(path)?;

    Ok(scopeguard::guard(
        (file, path.to_path_buf()),
        discard as fn((File, PathBuf)),
    ))
}

/// Disarms the guard and returns the finished file.
pub(crate) fn keep(pending: PendingFile) -> File {
    ScopeGuard::into_inner(pending).0
}

fn discard((file, path): (File, PathBuf)) {
    drop(file);

    match fs::remove_file(&path) {
        Ok(()) => tracing::debug!("removed incomplete output {}", path.display()),
        Err(e) => tracing::warn!("cannot remove incomplete output {}: {e}", path.display()),
    }
}
