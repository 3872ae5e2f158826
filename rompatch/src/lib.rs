//! A library for creating and applying legacy ROM patches.
//!
//! Two record-oriented formats are supported:
//!
//! - **IPS**: 24-bit big-endian offsets, literal and run-length records, an
//!   `EOF` terminator and an optional trailing truncation length.
//! - **APS** (N64): a header tying the patch to a cartridge image, 32-bit
//!   little-endian offsets and an explicit target size.
//!
//! Both formats share the [`EditRecord`] abstraction and implement
//! [`PatchFormat`], so a patch can be created from two byte slices and applied
//! to any [`WorkingCopy`].
//!
//! # Example
//!
//! ```
//! use rompatch::{CreateOptions, Ips, PatchFormat, SilentProgress};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let original = [0u8, 0, 0, 0];
//! let modified = [0u8, 0, 9, 0];
//!
//! let mut patch = Vec::new();
//! let summary = Ips::create(&original, &modified, &CreateOptions::default(), &mut patch, &SilentProgress)?;
//! assert_eq!(summary.differing, 1);
//!
//! let mut copy = original.to_vec();
//! let applied = Ips::apply(&patch, &mut copy, &SilentProgress)?;
//! assert_eq!(applied.records, 1);
//! assert_eq!(copy, modified);
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - [IPS file format](https://zerosoft.zophar.net/ips.php)

use snafu::Snafu;
use std::fmt;
use std::io::Write;

pub use self::aps::Aps;
pub use self::image::WorkingCopy;
pub use self::ips::Ips;
pub use self::progress::{PatchProgress, SilentProgress};
pub use self::record::{ApplySummary, Compatibility, CreateSummary, EditRecord};

pub mod aps;
pub mod image;
pub mod ips;
pub mod n64;
pub mod progress;
pub mod record;

mod reader;

/// Options for patch creation.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Free-text description stored in formats that carry one.
    pub description: String,
}

/// A patch file format.
///
/// Both operations are single pass: `create` scans the two images once and
/// writes the complete stream to `out`, `apply` reads the stream once and
/// mutates `target` record by record in stream order.
pub trait PatchFormat {
    const FORMAT: Format;

    /// Writes a patch turning `original` into `modified`.
    ///
    /// A summary with zero differing bytes means the images are identical;
    /// the stream written in that case should be discarded by the caller.
    fn create<W: Write, P: PatchProgress + ?Sized>(
        original: &[u8],
        modified: &[u8],
        options: &CreateOptions,
        out: W,
        progress: &P,
    ) -> Result<CreateSummary, CreateError>;

    /// Applies `patch` to `target`, which must hold a copy of the original image.
    fn apply<C: WorkingCopy + ?Sized, P: PatchProgress + ?Sized>(
        patch: &[u8],
        target: &mut C,
        progress: &P,
    ) -> Result<ApplySummary, ApplyError>;
}

/// Supported patch formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Ips,
    Aps,
}

impl Format {
    /// Identifies the format of a patch stream by its magic.
    #[must_use]
    pub fn detect(patch: &[u8]) -> Option<Self> {
        [Self::Ips, Self::Aps]
            .into_iter()
            .find(|format| patch.starts_with(format.magic()))
    }

    /// Returns the short display name of the format.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ips => "IPS",
            Self::Aps => "APS",
        }
    }

    /// Returns the conventional file extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Ips => "ips",
            Self::Aps => "aps",
        }
    }

    /// Returns the magic bytes a stream of this format starts with.
    #[must_use]
    pub const fn magic(self) -> &'static [u8] {
        match self {
            Self::Ips => ips::MAGIC,
            Self::Aps => aps::MAGIC,
        }
    }

    /// Runs [`PatchFormat::create`] for this format.
    pub fn create<W: Write, P: PatchProgress + ?Sized>(
        self,
        original: &[u8],
        modified: &[u8],
        options: &CreateOptions,
        out: W,
        progress: &P,
    ) -> Result<CreateSummary, CreateError> {
        match self {
            Self::Ips => Ips::create(original, modified, options, out, progress),
            Self::Aps => Aps::create(original, modified, options, out, progress),
        }
    }

    /// Runs [`PatchFormat::apply`] for this format.
    pub fn apply<C: WorkingCopy + ?Sized, P: PatchProgress + ?Sized>(
        self,
        patch: &[u8],
        target: &mut C,
        progress: &P,
    ) -> Result<ApplySummary, ApplyError> {
        match self {
            Self::Ips => Ips::apply(patch, target, progress),
            Self::Aps => Aps::apply(patch, target, progress),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Snafu)]
#[snafu(module)]
#[non_exhaustive]
pub enum CreateError {
    #[snafu(display(
        "offset {offset:#x} does not fit the {format} address space (max {max:#x}); use a different patch format"
    ))]
    AddressOverflow {
        format: Format,
        offset: u64,
        max: u64,
    },

    #[snafu(display(
        "{format} record at {offset:#x} is {len} bytes long, outside the encodable range 1..={max}"
    ))]
    RecordLength {
        format: Format,
        offset: u64,
        len: usize,
        max: usize,
    },

    #[snafu(display("original image is {len} bytes, too small to hold an N64 header"))]
    ImageTooSmall { len: usize },

    #[snafu(display("cannot write patch stream"))]
    WriteFailed { source: std::io::Error },
}

#[derive(Debug, Snafu)]
#[snafu(module)]
#[non_exhaustive]
pub enum ApplyError {
    #[snafu(display("not a valid {format} patch (bad magic)"))]
    InvalidMagic { format: Format },

    #[snafu(display("unsupported APS patch type {patch_type} (only 1, N64, is supported)"))]
    UnsupportedPatchType { patch_type: u8 },

    #[snafu(display("unsupported APS encoding method {method} (only 0, simple, is supported)"))]
    UnsupportedEncoding { method: u8 },

    #[snafu(display("unknown APS dump format {flag}"))]
    UnknownDumpFormat { flag: u8 },

    #[snafu(display("image is {len} bytes, too small to hold an N64 header"))]
    ImageTooSmall { len: u64 },

    #[snafu(display(
        "patch was made for a {patch} image but this image is {image}; swap the image byte order first"
    ))]
    LayoutMismatch {
        patch: n64::DumpLayout,
        image: n64::DumpLayout,
    },

    #[snafu(display(
        "this patch does not belong to this image (cartridge ID {:?}, image has {:?})",
        String::from_utf8_lossy(expected),
        String::from_utf8_lossy(found)
    ))]
    WrongCartridge { expected: [u8; 2], found: [u8; 2] },

    #[snafu(display(
        "patch ends unexpectedly while reading {field} at offset {offset:#x}; the file may be incomplete or corrupted"
    ))]
    Truncated { field: &'static str, offset: u64 },

    #[snafu(display("cannot read working copy"))]
    ReadTargetFailed { source: std::io::Error },

    #[snafu(display("cannot write {len} bytes at offset {offset:#x}"))]
    WriteTargetFailed {
        offset: u64,
        len: usize,
        source: std::io::Error,
    },

    #[snafu(display("cannot resize image to {len} bytes"))]
    ResizeTargetFailed { len: u64, source: std::io::Error },
}

impl ApplyError {
    /// Returns `true` if the patch stream ended in the middle of a record.
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }

    /// Returns `true` if the failure came from the working copy rather than the patch.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(
            self,
            Self::ReadTargetFailed { .. }
                | Self::WriteTargetFailed { .. }
                | Self::ResizeTargetFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_format_by_magic() {
        assert_eq!(Format::detect(b"PATCH\x45\x4F\x46"), Some(Format::Ips));
        assert_eq!(Format::detect(b"APS10\x01\x00"), Some(Format::Aps));
        assert_eq!(Format::detect(b"BPS1"), None);
        assert_eq!(Format::detect(b""), None);
    }

    #[test]
    fn overflow_suggests_remedy() {
        let err = CreateError::AddressOverflow {
            format: Format::Ips,
            offset: 0x100_0000,
            max: 0xFF_FFFF,
        };
        assert!(err.to_string().contains("use a different patch format"));
    }
}
