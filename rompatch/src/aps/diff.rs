use super::{ApsHeader, ApsPatch, MAX_RECORD_LEN};
use crate::create_error::{AddressOverflowSnafu, ImageTooSmallSnafu};
use crate::n64::CartInfo;
use crate::progress::UPDATE_INTERVAL;
use crate::{CreateError, EditRecord, Format, PatchProgress};
use snafu::OptionExt;

/// State of one diff between two N64 images.
///
/// Only literal records are produced, even though the format defines runs.
pub(super) struct DiffSession<'a, P: PatchProgress + ?Sized> {
    original: &'a [u8],
    modified: &'a [u8],
    description: &'a str,
    progress: &'a P,
}

impl<'a, P: PatchProgress + ?Sized> DiffSession<'a, P> {
    pub fn new(
        original: &'a [u8],
        modified: &'a [u8],
        description: &'a str,
        progress: &'a P,
    ) -> Self {
        Self {
            original,
            modified,
            description,
            progress,
        }
    }

    pub fn run(self) -> Result<(ApsPatch, u64), CreateError> {
        let cart = CartInfo::read(self.original).context(ImageTooSmallSnafu {
            len: self.original.len(),
        })?;

        let len = self.modified.len();
        let target_size = u32::try_from(len).ok().context(AddressOverflowSnafu {
            format: Format::Aps,
            offset: len as u64,
            max: u64::from(u32::MAX),
        })?;

        tracing::debug!(
            layout = %cart.layout,
            cart_id = %String::from_utf8_lossy(&cart.cart_id),
            "creating APS patch"
        );

        let header = ApsHeader::new(self.description, &cart, target_size);
        let mut records = Vec::new();
        let mut differing = 0u64;
        let mut reported = 0;
        let mut pos = 0;

        self.progress.begin(len as u64);

        while pos < len {
            if !self.differs(pos) {
                pos += 1;
                continue;
            }

            let start = pos;
            let limit = len.min(start + MAX_RECORD_LEN);

            while pos < limit && self.differs(pos) {
                pos += 1;
            }

            differing += (pos - start) as u64;

            // Offsets fit because the target size fits.
            records.push(EditRecord::Literal {
                offset: start as u32,
                data: self.modified[start..pos].to_vec(),
            });

            if pos - reported >= UPDATE_INTERVAL {
                reported = pos;
                self.progress.update(pos as u64);
            }
        }

        if len < self.original.len() {
            differing += (self.original.len() - len) as u64;
        }

        self.progress.complete();

        Ok((ApsPatch { header, records }, differing))
    }

    fn differs(&self, pos: usize) -> bool {
        self.original.get(pos) != Some(&self.modified[pos])
    }
}
