use super::Decoder;
use crate::apply_error::{ReadTargetFailedSnafu, ResizeTargetFailedSnafu, WriteTargetFailedSnafu};
use crate::{ApplyError, ApplySummary, PatchProgress, WorkingCopy};
use snafu::ResultExt;

/// State of one IPS application.
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

        if let Some(len) = self.decoder.finish()? {
            let len = u64::from(len);
            let current = self.target.size().context(ReadTargetFailedSnafu)?;

            if len < current {
                tracing::debug!("truncating image from {current} to {len} bytes");
                self.target
                    .resize(len)
                    .context(ResizeTargetFailedSnafu { len })?;
            } else {
                tracing::debug!("ignoring truncation to {len} bytes, image is {current} bytes");
            }
        }

        let final_len = self.target.size().context(ReadTargetFailedSnafu)?;

        self.progress.complete();

        Ok(ApplySummary {
            records: applied,
            final_len,
            description: None,
            warnings: Vec::new(),
        })
    }
}
