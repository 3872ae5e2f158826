//! The IPS patch format.
//!
//! Layout (all integers big-endian):
//!
//! | Field | Size |
//! |---|---|
//! | Magic `PATCH` | 5 |
//! | Record offset | 3, `0x454F46` ("EOF") ends the list |
//! | Record length | 2, `0` means a run record follows |
//! | Run length + fill | 2 + 1, run records only |
//! | Data | `length`, literal records only |
//! | Truncation length | 3, optional, after `EOF` |

use self::apply::PatchSession;
use self::diff::DiffSession;
use crate::create_error::{AddressOverflowSnafu, RecordLengthSnafu, WriteFailedSnafu};
use crate::reader::PatchReader;
use crate::{
    ApplyError, ApplySummary, CreateError, CreateOptions, CreateSummary, EditRecord, Format,
    PatchFormat, PatchProgress, WorkingCopy,
};
use byteorder::{BigEndian, WriteBytesExt};
use snafu::{ResultExt, ensure};
use std::io::{self, Write};

mod apply;
mod diff;

pub const MAGIC: &[u8] = b"PATCH";

/// Record offset that terminates the record list. Never a real record address.
pub const EOF_OFFSET: u32 = 0x454F46;

/// Largest offset a 24-bit record header can carry.
pub const MAX_OFFSET: u32 = 0xFF_FFFF;

/// Largest literal or run a single record can carry.
pub const MAX_RECORD_LEN: usize = 0xFFFF;

/// The IPS format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ips;

impl PatchFormat for Ips {
    const FORMAT: Format = Format::Ips;

    fn create<W: Write, P: PatchProgress + ?Sized>(
        original: &[u8],
        modified: &[u8],
        _options: &CreateOptions,
        out: W,
        progress: &P,
    ) -> Result<CreateSummary, CreateError> {
        let (patch, differing) = DiffSession::new(original, modified, progress).run()?;

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

/// A decoded or freshly diffed IPS stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpsPatch {
    /// Records in stream order.
    pub records: Vec<EditRecord>,
    /// Length to cut the working copy down to after all records are applied.
    pub truncate_to: Option<u32>,
}

impl IpsPatch {
    /// Decodes a complete IPS stream.
    pub fn parse(patch: &[u8]) -> Result<Self, ApplyError> {
        let mut decoder = Decoder::new(patch)?;
        let mut records = Vec::new();

        while let Some(record) = decoder.next_record()? {
            records.push(record);
        }

        Ok(Self {
            records,
            truncate_to: decoder.finish()?,
        })
    }

    /// Checks that every record and the truncation length can be encoded.
    ///
    /// Addresses must fit 24 bits and record lengths must be
    /// `1..=`[`MAX_RECORD_LEN`], since a zero length marks a run.
    pub fn validate(&self) -> Result<(), CreateError> {
        for record in &self.records {
            ensure!(
                (1..=MAX_RECORD_LEN).contains(&record.len()),
                RecordLengthSnafu {
                    format: Format::Ips,
                    offset: u64::from(record.offset()),
                    len: record.len(),
                    max: MAX_RECORD_LEN,
                }
            );
        }

        let lengths = self.truncate_to.into_iter();

        for offset in self.records.iter().map(EditRecord::offset).chain(lengths) {
            ensure!(
                offset <= MAX_OFFSET,
                AddressOverflowSnafu {
                    format: Format::Ips,
                    offset: u64::from(offset),
                    max: u64::from(MAX_OFFSET),
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

        out.write_all(MAGIC)?;

        for record in &self.records {
            out.write_u24::<BigEndian>(record.offset())?;

            match record {
                EditRecord::Literal { data, .. } => {
                    out.write_u16::<BigEndian>(data.len() as u16)?;
                    out.write_all(data)?;
                }
                EditRecord::Run { fill, length, .. } => {
                    out.write_u16::<BigEndian>(0)?;
                    out.write_u16::<BigEndian>(*length as u16)?;
                    out.write_u8(*fill)?;
                }
            }
        }

        out.write_u24::<BigEndian>(EOF_OFFSET)?;

        if let Some(len) = self.truncate_to {
            out.write_u24::<BigEndian>(len)?;
        }

        out.flush()
    }
}

/// Reads an IPS stream one record at a time.
pub(crate) struct Decoder<'a> {
    reader: PatchReader<'a>,
}

impl<'a> Decoder<'a> {
    pub fn new(patch: &'a [u8]) -> Result<Self, ApplyError> {
        ensure!(
            patch.starts_with(MAGIC),
            crate::apply_error::InvalidMagicSnafu {
                format: Format::Ips
            }
        );

        let mut reader = PatchReader::new(patch);
        reader.read_bytes(MAGIC.len(), "magic")?;

        Ok(Self { reader })
    }

    pub fn position(&self) -> u64 {
        self.reader.position()
    }

    /// Returns the next record, or `None` once the `EOF` marker is read.
    pub fn next_record(&mut self) -> Result<Option<EditRecord>, ApplyError> {
        let offset = self.reader.read_u24_be("record offset")?;

        if offset == EOF_OFFSET {
            return Ok(None);
        }

        let length = self.reader.read_u16_be("record length")?;

        let record = if length == 0 {
            let length = self.reader.read_u16_be("run length")?;
            let fill = self.reader.read_u8("run fill byte")?;

            EditRecord::Run {
                offset,
                fill,
                length: u32::from(length),
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

    /// Reads the optional truncation length following the `EOF` marker.
    pub fn finish(mut self) -> Result<Option<u32>, ApplyError> {
        if self.reader.is_empty() {
            return Ok(None);
        }

        let len = self.reader.read_u24_be("truncation length")?;

        if !self.reader.is_empty() {
            tracing::debug!(
                "ignoring {} trailing bytes after truncation length",
                self.reader.remaining()
            );
        }

        Ok(Some(len))
    }
}
