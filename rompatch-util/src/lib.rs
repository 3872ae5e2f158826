//! Library for creating and applying ROM patch files on disk.
//!
//! This crate wraps the in-memory codecs of [`rompatch`] with the file
//! handling a patching tool needs: memory-mapped inputs, output files that
//! are removed again if anything goes wrong, and progress reporting.
//!
//! # Overview
//!
//! [`PatchCreator`] diffs two images and writes the patch file.
//! [`PatchApplier`] copies the original image to a new output file and
//! applies a patch to that copy. The original is never modified.
//!
//! # Example
//!
//! ```no_run
//! use rompatch::Format;
//! use rompatch_util::{PatchApplier, PatchCreator, SilentProgress, map_file};
//!
//! let original = unsafe { map_file("game.z64".as_ref()) }.expect("failed to map image");
//! let modified = unsafe { map_file("hack.z64".as_ref()) }.expect("failed to map image");
//!
//! PatchCreator::new(Format::Aps, SilentProgress, false)
//!     .description("My hack")
//!     .create(&original, &modified, "hack.aps".as_ref())
//!     .expect("patch creation failed");
//!
//! let patch = unsafe { map_file("hack.aps".as_ref()) }.expect("failed to map patch");
//! PatchApplier::new(SilentProgress, false)
//!     .apply(&patch, &original, "game.patched.z64".as_ref())
//!     .expect("patching failed");
//! ```

pub mod apply;
pub mod create;
pub mod progress;

mod output;

pub use self::apply::{ApplyError, PatchApplier};
pub use self::create::{CreateError, CreateOutcome, PatchCreator};
pub use self::progress::{PatchProgress, SilentProgress};

#[cfg(feature = "cli")]
pub use self::progress::ConsoleProgress;

use rompatch::Format;
use snafu::{ResultExt, Snafu};
use std::path::{Path, PathBuf};

/// Errors that can occur when mapping an input file.
#[derive(Debug, Snafu)]
pub enum MapFileError {
    #[snafu(display("cannot open {}", path.display()))]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot memory map {}", path.display()))]
    MmapFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Maps a whole file into memory for reading.
///
/// # Safety
///
/// The caller must ensure the file is not modified or truncated while the
/// returned map is in use. In particular the file must not also be the
/// output of a [`PatchApplier`] or [`PatchCreator`].
pub unsafe fn map_file(path: &Path) -> Result<memmap2::Mmap, MapFileError> {
    let file = std::fs::File::open(path).context(OpenFileSnafu { path })?;
    unsafe { memmap2::Mmap::map(&file).context(MmapFileSnafu { path }) }
}

/// Returns the default patch path for a modified image: its name with the
/// extension replaced by the format's.
#[must_use]
pub fn default_patch_path(modified: &Path, format: Format) -> PathBuf {
    modified.with_extension(format.extension())
}

/// Returns the default output path for a patched image: `.patched` inserted
/// before the original's extension.
#[must_use]
pub fn default_output_path(original: &Path) -> PathBuf {
    let mut name = original.file_stem().unwrap_or_default().to_os_string();
    name.push(".patched");

    if let Some(extension) = original.extension() {
        name.push(".");
        name.push(extension);
    }

    original.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_path_takes_format_extension() {
        assert_eq!(
            default_patch_path(Path::new("roms/hack.z64"), Format::Aps),
            Path::new("roms/hack.aps")
        );
        assert_eq!(
            default_patch_path(Path::new("hack"), Format::Ips),
            Path::new("hack.ips")
        );
    }

    #[test]
    fn output_path_keeps_extension() {
        assert_eq!(
            default_output_path(Path::new("roms/game.sfc")),
            Path::new("roms/game.patched.sfc")
        );
        assert_eq!(
            default_output_path(Path::new("game")),
            Path::new("game.patched")
        );
    }
}
