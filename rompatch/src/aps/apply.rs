use super::Decoder;
use crate::apply_error::{
    ImageTooSmallSnafu, LayoutMismatchSnafu, ReadTargetFailedSnafu, ResizeTargetFailedSnafu,
    UnknownDumpFormatSnafu, WriteTargetFailedSnafu, WrongCartridgeSnafu,
};
use crate::n64::{CartInfo, HEADER_LEN};
use crate::{ApplyError, ApplySummary, Compatibility, PatchProgress, WorkingCopy};
use snafu::{OptionExt, ResultExt, ensure};

/// State of one APS application.
pub(super) struct PatchSession<'a, 'p, C: WorkingCopy + ?Sized, P: PatchProgress + ?Sized> {
    decoder: Decoder<'p>,
    patch_len: u64,
    target: &'a mut C,
    progress: &'a P,
}

impl<'a, 'p, C: WorkingCopy + ?Sized, P: PatchProgress + ?Sized> PatchSession<'a, 'p, C, P> {
    pub fn new(decoder: Decoder<'p>, patch_len: usize, target: &'a mut C, progress: &'a P) -> Self {
        Self {
            decoder,
            patch_len: patch_len as u64,
            target,
            progress,
        }
    }

    pub fn run(mut self) -> Result<ApplySummary, ApplyError> {
        let description = self.decoder.header().description().into_owned();
        tracing::info!("APS description: {description}");

        let warnings = self.validate()?;

        let target_size = u64::from(self.decoder.header().target_size());
        self.target
            .resize(target_size)
            .context(ResizeTargetFailedSnafu { len: target_size })?;

        let mut applied = 0;

        self.progress.begin(self.patch_len);

        while let Some(record) = self.decoder.next_record()? {
            tracing::trace!(?record, "applying");

            record
                .apply_to(&mut *self.target)
                .context(WriteTargetFailedSnafu {
                    offset: u64::from(record.offset()),
                    len: record.len(),
                })?;

            applied += 1;
            self.progress.update(self.decoder.position());
        }

        let final_len = self.target.size().context(ReadTargetFailedSnafu)?;

        self.progress.complete();

        Ok(ApplySummary {
            records: applied,
            final_len,
            description: Some(description),
            warnings,
        })
    }

    /// Checks that the patch was made for the image in the working copy.
    ///
    /// Layout and cartridge mismatches are fatal. Territory and CRC
    /// mismatches are returned as warnings.
    fn validate(&mut self) -> Result<Vec<Compatibility>, ApplyError> {
        let header = self.decoder.header();

        let len = self.target.size().context(ReadTargetFailedSnafu)?;
        ensure!(len >= HEADER_LEN as u64, ImageTooSmallSnafu { len });

        let mut head = [0u8; HEADER_LEN];
        self.target
            .read_exact_at(0, &mut head)
            .context(ReadTargetFailedSnafu)?;

        let image = CartInfo::read(&head).context(ImageTooSmallSnafu { len })?;

        let layout = header.dump_layout().context(UnknownDumpFormatSnafu {
            flag: header.dump_format(),
        })?;
        ensure!(
            layout == image.layout,
            LayoutMismatchSnafu {
                patch: layout,
                image: image.layout,
            }
        );

        ensure!(
            header.cart_id() == image.cart_id,
            WrongCartridgeSnafu {
                expected: header.cart_id(),
                found: image.cart_id,
            }
        );

        let mut warnings = Vec::new();

        if header.territory() != image.territory {
            warnings.push(Compatibility::Territory {
                expected: header.territory(),
                found: image.territory,
            });
        }

        if header.crc() != image.crc {
            warnings.push(Compatibility::Crc {
                expected: header.crc(),
                found: image.crc,
            });
        }

        for warning in &warnings {
            tracing::warn!("{warning}");
        }

        Ok(warnings)
    }
}
