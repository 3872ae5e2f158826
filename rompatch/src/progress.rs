/// Trait for receiving progress updates while a patch is created or applied.
///
/// `total` and `processed` are byte counts: of the modified image while
/// diffing, of the patch stream while applying. Updates are cosmetic and
/// carry no correctness guarantees.
pub trait PatchProgress {
    /// Called once before the scan starts.
    fn begin(&self, _total: u64) {}

    /// Called periodically with the number of bytes processed so far.
    fn update(&self, _processed: u64) {}

    /// Called once after the scan finished successfully.
    fn complete(&self) {}
}

/// A no-op progress implementation that discards all updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl PatchProgress for SilentProgress {}

impl<P: PatchProgress + ?Sized> PatchProgress for &P {
    fn begin(&self, total: u64) {
        (**self).begin(total)
    }

    fn update(&self, processed: u64) {
        (**self).update(processed)
    }

    fn complete(&self) {
        (**self).complete()
    }
}

/// Granularity of diff progress updates.
pub(crate) const UPDATE_INTERVAL: usize = 0x10000;
