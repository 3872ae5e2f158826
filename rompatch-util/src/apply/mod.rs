mod error;

pub use self::error::ApplyError;

use self::error::{
    CopyFailedSnafu, CreateFileFailedSnafu, PatchFailedSnafu, SyncFailedSnafu, UnknownFormatSnafu,
};
use crate::output;
use rompatch::{ApplySummary, Format, PatchProgress};
use snafu::{OptionExt, ResultExt};
use std::io::Write;
use std::path::Path;

/// Applies a patch to a copy of an image.
pub struct PatchApplier<P: PatchProgress> {
    format: Option<Format>,
    progress: P,
    overwrite: bool,
}

impl<P: PatchProgress> PatchApplier<P> {
    /// Creates a new applier that detects the patch format from its magic.
    ///
    /// If `overwrite` is `true`, an existing output file will be replaced.
    /// Otherwise, patching will fail if the output file already exists.
    pub fn new(progress: P, overwrite: bool) -> Self {
        Self {
            format: None,
            progress,
            overwrite,
        }
    }

    /// Forces the patch format instead of detecting it.
    #[must_use]
    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Copies `original` to `path` and applies `patch` to the copy.
    ///
    /// The output file is removed again if anything fails, leaving no
    /// partially patched image behind.
    pub fn apply(
        &self,
        patch: &[u8],
        original: &[u8],
        path: &Path,
    ) -> Result<ApplySummary, ApplyError> {
        let format = match self.format {
            Some(format) => format,
            None => Format::detect(patch).context(UnknownFormatSnafu)?,
        };

        tracing::debug!("applying {format} patch to {}", path.display());

        let mut pending =
            output::create(path, self.overwrite).context(CreateFileFailedSnafu { path })?;

        pending
            .0
            .write_all(original)
            .context(CopyFailedSnafu { path })?;

        let summary = format
            .apply(patch, &mut pending.0, &self.progress)
            .context(PatchFailedSnafu { format })?;

        pending.0.sync_all().context(SyncFailedSnafu { path })?;
        output::keep(pending);

        Ok(summary)
    }
}
