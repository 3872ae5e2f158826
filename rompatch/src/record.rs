use crate::image::WorkingCopy;
use std::fmt;
use std::io;

/// A single instruction of a patch stream.
///
/// Records are applied in stream order. Later records may overwrite bytes
/// written by earlier ones.
#[derive(Clone, PartialEq, Eq)]
pub enum EditRecord {
    /// Writes `data` verbatim starting at `offset`.
    Literal { offset: u32, data: Vec<u8> },
    /// Writes `length` copies of `fill` starting at `offset`.
    Run { offset: u32, fill: u8, length: u32 },
}

impl EditRecord {
    /// Returns the first byte this record writes.
    #[must_use]
    pub const fn offset(&self) -> u32 {
        match self {
            Self::Literal { offset, .. } | Self::Run { offset, .. } => *offset,
        }
    }

    /// Returns the number of bytes this record writes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Literal { data, .. } => data.len(),
            Self::Run { length, .. } => *length as usize,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the offset one past the last byte this record writes.
    #[must_use]
    pub fn end(&self) -> u64 {
        u64::from(self.offset()) + self.len() as u64
    }

    /// Returns `true` for run-length records.
    #[must_use]
    pub const fn is_run(&self) -> bool {
        matches!(self, Self::Run { .. })
    }

    /// Writes this record into `target`.
    pub fn apply_to<C: WorkingCopy + ?Sized>(&self, target: &mut C) -> io::Result<()> {
        match self {
            Self::Literal { offset, data } => target.write_at(u64::from(*offset), data),
            Self::Run {
                offset,
                fill,
                length,
            } => target.fill_at(u64::from(*offset), *fill, u64::from(*length)),
        }
    }
}

impl fmt::Debug for EditRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal { offset, data } => f
                .debug_struct("Literal")
                .field("offset", &format_args!("{offset:#x}"))
                .field("len", &data.len())
                .finish(),
            Self::Run {
                offset,
                fill,
                length,
            } => f
                .debug_struct("Run")
                .field("offset", &format_args!("{offset:#x}"))
                .field("fill", &format_args!("{fill:#04x}"))
                .field("length", length)
                .finish(),
        }
    }
}

/// Outcome of a successful patch creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct CreateSummary {
    /// Number of bytes that differ between the two images, counting bytes
    /// dropped from the end of the original.
    pub differing: u64,
    /// Number of records written to the patch stream.
    pub records: usize,
}

impl CreateSummary {
    /// Returns `true` if the images were byte-identical.
    ///
    /// The patch written in that case carries no records and callers are
    /// expected to discard it.
    #[must_use]
    pub const fn is_identical(&self) -> bool {
        self.differing == 0
    }
}

/// A non-fatal mismatch found while validating an APS patch against an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Territory { expected: u8, found: u8 },
    Crc { expected: [u8; 8], found: [u8; 8] },
}

impl fmt::Display for Compatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Territory { expected, found } => write!(
                f,
                "wrong territory: patch expects {expected:#04x}, image has {found:#04x}"
            ),
            Self::Crc { expected, found } => write!(
                f,
                "wrong image CRC: patch expects {}, image has {}",
                hex(expected),
                hex(found)
            ),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

/// Outcome of a successful patch application.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct ApplySummary {
    /// Number of records written to the working copy.
    pub records: usize,
    /// Length of the working copy after patching.
    pub final_len: u64,
    /// Free-text description carried by the patch, if the format has one.
    pub description: Option<String>,
    /// Compatibility findings that did not stop the patch.
    pub warnings: Vec<Compatibility>,
}
