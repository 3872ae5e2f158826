use super::{EOF_OFFSET, IpsPatch, MAX_OFFSET, MAX_RECORD_LEN};
use crate::create_error::AddressOverflowSnafu;
use crate::progress::UPDATE_INTERVAL;
use crate::{CreateError, EditRecord, Format, PatchProgress};
use snafu::ensure;

/// Trailing repeats needed before a literal turns into a run.
pub(crate) const RLE_START_THRESHOLD: usize = 6;

/// Literal length past which a repeating tail is split off into its own run.
pub(crate) const RLE_RESTART_THRESHOLD: usize = 13;

/// Matching gaps shorter than this are absorbed into the surrounding edit.
pub(crate) const BRIDGE_LEN: usize = 5;

/// State of one diff between two images.
pub(super) struct DiffSession<'a, P: PatchProgress + ?Sized> {
    original: &'a [u8],
    modified: &'a [u8],
    records: Vec<EditRecord>,
    differing: u64,
    progress: &'a P,
    reported: usize,
}

impl<'a, P: PatchProgress + ?Sized> DiffSession<'a, P> {
    pub fn new(original: &'a [u8], modified: &'a [u8], progress: &'a P) -> Self {
        Self {
            original,
            modified,
            records: Vec::new(),
            differing: 0,
            progress,
            reported: 0,
        }
    }

    /// Scans both images and returns the patch with the number of differing bytes.
    pub fn run(mut self) -> Result<(IpsPatch, u64), CreateError> {
        let len = self.modified.len();
        let mut pos = 0;

        self.progress.begin(len as u64);

        while pos < len {
            if !self.differs(pos) {
                pos += 1;
                self.report(pos);
                continue;
            }

            ensure!(
                pos <= MAX_OFFSET as usize,
                AddressOverflowSnafu {
                    format: Format::Ips,
                    offset: pos as u64,
                    max: u64::from(MAX_OFFSET),
                }
            );

            let end = self.region_end(pos);
            tracing::trace!(start = pos, end, "edit region");

            self.encode_region(pos, end);
            pos = end;
            self.report(pos);
        }

        let truncate_to = if len < self.original.len() {
            self.differing += (self.original.len() - len) as u64;
            // Lengths past 32 bits are reported as overflowing by validate().
            Some(u32::try_from(len).unwrap_or(u32::MAX))
        } else {
            None
        };

        self.avoid_eof_offset();

        let patch = IpsPatch {
            records: self.records,
            truncate_to,
        };
        patch.validate()?;

        self.progress.complete();

        tracing::debug!(
            records = patch.records.len(),
            differing = self.differing,
            "IPS diff finished"
        );

        Ok((patch, self.differing))
    }

    fn differs(&self, pos: usize) -> bool {
        self.original.get(pos) != Some(&self.modified[pos])
    }

    fn report(&mut self, pos: usize) {
        if pos - self.reported >= UPDATE_INTERVAL {
            self.reported = pos;
            self.progress.update(pos as u64);
        }
    }

    /// Finds the end of the edit starting at the differing byte `start`.
    ///
    /// Short matching gaps are absorbed as long as another differing byte
    /// follows them and the whole region still fits one record.
    fn region_end(&mut self, start: usize) -> usize {
        let len = self.modified.len();
        let limit = len.min(start + MAX_RECORD_LEN);
        let mut pos = start;

        loop {
            while pos < limit && self.differs(pos) {
                self.differing += 1;
                pos += 1;
            }

            if pos == limit {
                return pos;
            }

            let gap = (pos..limit)
                .take(BRIDGE_LEN)
                .take_while(|&p| !self.differs(p))
                .count();

            if gap == BRIDGE_LEN || pos + gap == limit {
                return pos;
            }

            pos += gap;
        }
    }

    /// Splits `modified[start..end]` into literal and run records.
    fn encode_region(&mut self, start: usize, end: usize) {
        let bytes = &self.modified[start..end];
        let mut literal_start = 0;
        let mut run_start = 0;
        let mut i = 0;

        while i < bytes.len() {
            if i == literal_start || bytes[i] != bytes[i - 1] {
                run_start = i;
            }

            let run_len = i + 1 - run_start;
            let literal_len = i + 1 - literal_start;

            let promote = run_len > RLE_START_THRESHOLD
                && (run_start == literal_start || literal_len > RLE_RESTART_THRESHOLD);

            if !promote {
                i += 1;
                continue;
            }

            if run_start > literal_start {
                self.push_literal(start + literal_start, &bytes[literal_start..run_start]);
            }

            let fill = bytes[i];
            let run_end = bytes[i..]
                .iter()
                .position(|&b| b != fill)
                .map_or(bytes.len(), |n| i + n);

            self.records.push(EditRecord::Run {
                offset: (start + run_start) as u32,
                fill,
                length: (run_end - run_start) as u32,
            });

            literal_start = run_end;
            i = run_end;
        }

        if literal_start < bytes.len() {
            self.push_literal(start + literal_start, &bytes[literal_start..]);
        }
    }

    fn push_literal(&mut self, offset: usize, data: &[u8]) {
        self.records.push(EditRecord::Literal {
            offset: offset as u32,
            data: data.to_vec(),
        });
    }

    /// Moves a record starting at [`EOF_OFFSET`] one byte earlier.
    ///
    /// The record preceding it gives up its last byte if it ends exactly at
    /// the reserved offset, so records never overlap.
    fn avoid_eof_offset(&mut self) {
        let Some(mut index) = self
            .records
            .iter()
            .position(|r| r.offset() == EOF_OFFSET)
        else {
            return;
        };

        tracing::debug!("rebasing record at reserved offset {EOF_OFFSET:#x}");

        if index > 0 && self.records[index - 1].end() == u64::from(EOF_OFFSET) {
            let previous = &mut self.records[index - 1];

            match previous {
                EditRecord::Literal { data, .. } => {
                    data.pop();
                }
                EditRecord::Run { length, .. } => *length -= 1,
            }

            if previous.is_empty() {
                self.records.remove(index - 1);
                index -= 1;
            }
        }

        let byte = self.modified[EOF_OFFSET as usize - 1];
        let record = self.records.remove(index);

        for (n, rebased) in rebase(record, byte).into_iter().enumerate() {
            self.records.insert(index + n, rebased);
        }
    }
}

/// Re-encodes a record at [`EOF_OFFSET`] to start one byte earlier with `byte`.
fn rebase(record: EditRecord, byte: u8) -> Vec<EditRecord> {
    let offset = EOF_OFFSET - 1;

    match record {
        EditRecord::Literal { mut data, .. } if data.len() < MAX_RECORD_LEN => {
            data.insert(0, byte);
            vec![EditRecord::Literal { offset, data }]
        }
        EditRecord::Run { fill, length, .. }
            if fill == byte && (length as usize) < MAX_RECORD_LEN =>
        {
            vec![EditRecord::Run {
                offset,
                fill,
                length: length + 1,
            }]
        }
        EditRecord::Literal { data, .. } => vec![
            EditRecord::Literal {
                offset,
                data: vec![byte, data[0]],
            },
            EditRecord::Literal {
                offset: EOF_OFFSET + 1,
                data: data[1..].to_vec(),
            },
        ],
        EditRecord::Run { fill, length, .. } => {
            let mut records = vec![EditRecord::Literal {
                offset,
                data: vec![byte, fill],
            }];

            if length > 1 {
                records.push(EditRecord::Run {
                    offset: EOF_OFFSET + 1,
                    fill,
                    length: length - 1,
                });
            }

            records
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SilentProgress;

    fn diff(original: &[u8], modified: &[u8]) -> (IpsPatch, u64) {
        DiffSession::new(original, modified, &SilentProgress)
            .run()
            .unwrap()
    }

    fn apply(patch: &IpsPatch, original: &[u8]) -> Vec<u8> {
        let mut copy = original.to_vec();
        for record in &patch.records {
            record.apply_to(&mut copy).unwrap();
        }
        if let Some(len) = patch.truncate_to {
            copy.truncate(len as usize);
        }
        copy
    }

    #[test]
    fn one_differing_byte() {
        let (patch, differing) = diff(&[0, 0, 0, 0], &[0, 0, 9, 0]);

        assert_eq!(differing, 1);
        assert_eq!(
            patch.records,
            [EditRecord::Literal {
                offset: 2,
                data: vec![9]
            }]
        );
    }

    #[test]
    fn seven_repeats_become_a_run() {
        let original = [0u8; 32];
        let mut modified = original;
        modified[10..17].fill(0xEE);

        let (patch, _) = diff(&original, &modified);

        assert_eq!(
            patch.records,
            [EditRecord::Run {
                offset: 10,
                fill: 0xEE,
                length: 7
            }]
        );
    }

    #[test]
    fn six_repeats_stay_literal() {
        let original = [0u8; 32];
        let mut modified = original;
        modified[10..16].fill(0xEE);

        let (patch, _) = diff(&original, &modified);

        assert_eq!(
            patch.records,
            [EditRecord::Literal {
                offset: 10,
                data: vec![0xEE; 6]
            }]
        );
    }

    #[test]
    fn short_gap_is_bridged() {
        let original = [0u8; 32];
        let mut modified = original;
        modified[4] = 1;
        modified[9] = 2; // four matching bytes in between

        let (patch, differing) = diff(&original, &modified);

        assert_eq!(differing, 2);
        assert_eq!(
            patch.records,
            [EditRecord::Literal {
                offset: 4,
                data: vec![1, 0, 0, 0, 0, 2]
            }]
        );
    }

    #[test]
    fn long_gap_splits_records() {
        let original = [0u8; 32];
        let mut modified = original;
        modified[4] = 1;
        modified[10] = 2; // five matching bytes in between

        let (patch, _) = diff(&original, &modified);

        assert_eq!(
            patch.records,
            [
                EditRecord::Literal {
                    offset: 4,
                    data: vec![1]
                },
                EditRecord::Literal {
                    offset: 10,
                    data: vec![2]
                },
            ]
        );
    }

    #[test]
    fn trailing_matches_are_not_bridged() {
        let original = [0u8; 6];
        let modified = [0u8, 5, 0, 0, 0, 0];

        let (patch, _) = diff(&original, &modified);

        assert_eq!(patch.records.len(), 1);
        assert_eq!(patch.records[0].len(), 1);
    }

    #[test]
    fn repeating_tail_splits_from_long_literal() {
        let original = [0u8; 64];
        let mut modified = original;
        let prefix: Vec<u8> = (1..=7).collect();
        modified[8..15].copy_from_slice(&prefix);
        modified[15..25].fill(0xCC);

        let (patch, _) = diff(&original, &modified);

        assert_eq!(
            patch.records,
            [
                EditRecord::Literal {
                    offset: 8,
                    data: prefix
                },
                EditRecord::Run {
                    offset: 15,
                    fill: 0xCC,
                    length: 10
                },
            ]
        );
    }

    #[test]
    fn repeating_tail_of_short_literal_waits_for_restart_threshold() {
        let original = [0u8; 64];
        let mut modified = original;
        modified[8] = 1;
        modified[9..18].fill(0xCC); // literal of 10 bytes, tail of 9 repeats

        let (patch, _) = diff(&original, &modified);

        assert_eq!(patch.records.len(), 1);
        assert!(!patch.records[0].is_run());
        assert_eq!(apply(&patch, &original), modified);
    }

    #[test]
    fn long_edits_split_at_record_limit() {
        let original = vec![0u8; MAX_RECORD_LEN + 100];
        let modified: Vec<u8> = (0..original.len()).map(|i| (i % 251) as u8 + 1).collect();

        let (patch, differing) = diff(&original, &modified);

        assert_eq!(differing, original.len() as u64);
        assert_eq!(patch.records.len(), 2);
        assert_eq!(patch.records[0].len(), MAX_RECORD_LEN);
        assert_eq!(patch.records[1].offset() as usize, MAX_RECORD_LEN);
        assert_eq!(apply(&patch, &original), modified);
    }

    #[test]
    fn appended_bytes_are_recorded() {
        let (patch, differing) = diff(&[1, 2], &[1, 2, 0, 0]);

        assert_eq!(differing, 2);
        assert_eq!(
            patch.records,
            [EditRecord::Literal {
                offset: 2,
                data: vec![0, 0]
            }]
        );
    }

    #[test]
    fn edit_at_reserved_offset_starts_one_byte_earlier() {
        let eof = EOF_OFFSET as usize;
        let original = vec![0u8; eof + 16];
        let mut modified = original.clone();
        modified[eof] = 0x42;
        modified[eof + 1] = 0x43;

        let (patch, differing) = diff(&original, &modified);

        assert_eq!(differing, 2);
        assert!(patch.records.iter().all(|r| r.offset() != EOF_OFFSET));
        assert_eq!(
            patch.records,
            [EditRecord::Literal {
                offset: EOF_OFFSET - 1,
                data: vec![0, 0x42, 0x43]
            }]
        );
        assert_eq!(apply(&patch, &original), modified);
    }

    #[test]
    fn record_ending_at_reserved_offset_gives_up_a_byte() {
        // One edit fills a whole record and stops exactly at EOF_OFFSET, the next starts there.
        let eof = EOF_OFFSET as usize;
        let start = eof - MAX_RECORD_LEN;
        let original = vec![0u8; eof + 16];
        let mut modified = original.clone();
        for (i, byte) in modified[start..eof + 3].iter_mut().enumerate() {
            *byte = (i % 200) as u8 + 1;
        }

        let (patch, _) = diff(&original, &modified);

        assert!(patch.records.iter().all(|r| r.offset() != EOF_OFFSET));
        let previous = &patch.records[0];
        assert_eq!(previous.end(), u64::from(EOF_OFFSET) - 1);
        assert_eq!(patch.records[1].offset(), EOF_OFFSET - 1);
        assert_eq!(apply(&patch, &original), modified);
    }

    #[test]
    fn run_at_reserved_offset_is_rebased() {
        let eof = EOF_OFFSET as usize;
        let original = vec![0u8; eof + 32];
        let mut modified = original.clone();
        modified[eof..eof + 8].fill(0x77);

        let (patch, _) = diff(&original, &modified);

        assert!(patch.records.iter().all(|r| r.offset() != EOF_OFFSET));
        assert_eq!(
            patch.records,
            [
                EditRecord::Literal {
                    offset: EOF_OFFSET - 1,
                    data: vec![0, 0x77]
                },
                EditRecord::Run {
                    offset: EOF_OFFSET + 1,
                    fill: 0x77,
                    length: 7
                },
            ]
        );
        assert_eq!(apply(&patch, &original), modified);
    }

    #[test]
    fn edit_past_24_bits_overflows() {
        let original = vec![0u8; MAX_OFFSET as usize + 2];
        let mut modified = original.clone();
        modified[MAX_OFFSET as usize + 1] = 1;

        let err = DiffSession::new(&original, &modified, &SilentProgress)
            .run()
            .unwrap_err();

        assert!(matches!(err, CreateError::AddressOverflow { offset: 0x100_0000, .. }));
    }

    #[test]
    fn edit_at_last_24_bit_offset_fits() {
        let original = vec![0u8; MAX_OFFSET as usize + 1];
        let mut modified = original.clone();
        modified[MAX_OFFSET as usize] = 1;

        let (patch, _) = diff(&original, &modified);
        assert_eq!(patch.records[0].offset(), MAX_OFFSET);
    }
}
