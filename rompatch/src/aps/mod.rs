//! The APS patch format for N64 images.
//!
//! A 78-byte header (see [`ApsHeader`]) ties the patch to one cartridge
//! image, followed by records until the end of the file:
//!
//! | Field | Size |
//! |---|---|
//! | Offset | 4, little-endian |
//! | Length | 1, `0` means a run record follows |
//! | Fill + count | 1 + 1, run records only |
//! | Data | `length`, literal records only |

use self::apply::PatchSession;
use self::diff::DiffSession;
use self::header::{ApsHeaderRaw, HEADER_SIZE};
use crate::apply_error::{
    InvalidMagicSnafu, UnsupportedEncodingSnafu, UnsupportedPatchTypeSnafu,
};
use crate::create_error::{RecordLengthSnafu, WriteFailedSnafu};
use crate::reader::PatchReader;
use crate::{
    ApplyError, ApplySummary, CreateError, CreateOptions, CreateSummary, EditRecord, Format,
    PatchFormat, PatchProgress, WorkingCopy,
};
use byteorder::{LittleEndian, WriteBytesExt};
use snafu::{ResultExt, ensure};
use std::io::{self, Write};
use zerocopy::FromBytes;

pub use self::header::ApsHeader;

mod apply;
mod diff;
mod header;

pub const MAGIC: &[u8] = b"APS10";

/// Patch type byte for N64 images, the only type defined.
pub const PATCH_TYPE_N64: u8 = 1;

/// Encoding method byte for plain records, the only method defined.
pub const ENCODING_SIMPLE: u8 = 0;

/// Length of the space-padded description field.
pub const DESCRIPTION_LEN: usize = 50;

/// Largest literal a single record can carry.
pub const MAX_RECORD_LEN: usize = 0xFF;

/// The APS format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aps;

impl PatchFormat for Aps {
    const FORMAT: Format = Format::Aps;

    fn create<W: Write, P: PatchProgress + ?Sized>(
        original: &[u8],
        modified: &[u8],
        options: &CreateOptions,
        out: W,
        progress: &P,
    ) -> Result<CreateSummary, CreateError> {
        let (patch, differing) =
            DiffSession::new(original, modified, &options.description, progress).run()?;

        patch.write_to(out)?;

        Ok(CreateSummary {
            differing,
            records: patch.records.len(),
        })
    }

    fn apply<C: WorkingCopy + ?Sized, P: PatchProgress + ?Sized>(
        patch: &[u8],
        target: &mut C,
        progress: &P,
    ) -> Result<ApplySummary, ApplyError> {
        PatchSession::new(Decoder::new(patch)?, patch.len(), target, progress).run()
    }
}

/// A decoded or freshly diffed APS stream.
#[derive(Debug, Clone)]
pub struct ApsPatch {
    pub header: ApsHeader,
    /// Records in stream order.
    pub records: Vec<EditRecord>,
}

impl ApsPatch {
    /// Decodes a complete APS stream.
    pub fn parse(patch: &[u8]) -> Result<Self, ApplyError> {
        let mut decoder = Decoder::new(patch)?;
        let mut records = Vec::new();

        while let Some(record) = decoder.next_record()? {
            records.push(record);
        }

        Ok(Self {
            header: decoder.header,
            records,
        })
    }

    /// Checks that every record length fits the one-byte length and count fields.
    pub fn validate(&self) -> Result<(), CreateError> {
        for record in &self.records {
            ensure!(
                (1..=MAX_RECORD_LEN).contains(&record.len()),
                RecordLengthSnafu {
                    format: Format::Aps,
                    offset: u64::from(record.offset()),
                    len: record.len(),
                    max: MAX_RECORD_LEN,
                }
            );
        }

        Ok(())
    }

    /// Validates and encodes the stream.
    pub fn write_to<W: Write>(&self, out: W) -> Result<(), CreateError> {
        self.validate()?;
        self.encode(out).context(WriteFailedSnafu)
    }

    fn encode<W: Write>(&self, out: W) -> io::Result<()> {
        let mut out = io::BufWriter::new(out);

        out.write_all(self.header.as_bytes())?;

        for record in &self.records {
            out.write_u32::<LittleEndian>(record.offset())?;

            match record {
                EditRecord::Literal { data, .. } => {
                    out.write_u8(data.len() as u8)?;
                    out.write_all(data)?;
                }
                EditRecord::Run { fill, length, .. } => {
                    out.write_u8(0)?;
                    out.write_u8(*fill)?;
                    out.write_u8(*length as u8)?;
                }
            }
        }

        out.flush()
    }
}

/// Reads an APS stream one record at a time.
pub(crate) struct Decoder<'a> {
    reader: PatchReader<'a>,
    header: ApsHeader,
}

impl<'a> Decoder<'a> {
    /// Reads and checks the format fields of the header.
    ///
    /// Image-dependent fields are checked against the working copy at apply time.
    pub fn new(patch: &'a [u8]) -> Result<Self, ApplyError> {
        ensure!(
            patch.starts_with(MAGIC),
            InvalidMagicSnafu {
                format: Format::Aps
            }
        );

        let mut reader = PatchReader::new(patch);
        let bytes = reader.read_bytes(HEADER_SIZE, "header")?;
        let raw = ApsHeaderRaw::read_from_bytes(bytes).map_err(|_| ApplyError::Truncated {
            field: "header",
            offset: 0,
        })?;
        let header = ApsHeader::from_raw(raw);

        ensure!(
            header.patch_type() == PATCH_TYPE_N64,
            UnsupportedPatchTypeSnafu {
                patch_type: header.patch_type()
            }
        );
        ensure!(
            header.encoding() == ENCODING_SIMPLE,
            UnsupportedEncodingSnafu {
                method: header.encoding()
            }
        );

        Ok(Self { reader, header })
    }

    pub fn header(&self) -> &ApsHeader {
        &self.header
    }

    pub fn position(&self) -> u64 {
        self.reader.position()
    }

    /// Returns the next record, or `None` at the end of the stream.
    pub fn next_record(&mut self) -> Result<Option<EditRecord>, ApplyError> {
        if self.reader.is_empty() {
            return Ok(None);
        }

        let offset = self.reader.read_u32_le("record offset")?;
        let length = self.reader.read_u8("record length")?;

        let record = if length == 0 {
            let fill = self.reader.read_u8("run fill byte")?;
            let count = self.reader.read_u8("run length")?;

            EditRecord::Run {
                offset,
                fill,
                length: u32::from(count),
            }
        } else {
            let data = self.reader.read_bytes(length.into(), "record data")?;

            EditRecord::Literal {
                offset,
                data: data.to_vec(),
            }
        };

        Ok(Some(record))
    }
}
