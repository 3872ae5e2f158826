mod error;

pub use self::error::CreateError;

use self::error::{CreateFileFailedSnafu, EncodeFailedSnafu, SyncFailedSnafu};
use crate::output;
use rompatch::{CreateOptions, CreateSummary, Format, PatchProgress};
use snafu::ResultExt;
use std::path::Path;

/// Result of [`PatchCreator::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The patch file was written.
    Created(CreateSummary),
    /// The images are byte-identical and no patch file was left behind.
    Identical,
}

/// Writes a patch file turning one image into another.
pub struct PatchCreator<P: PatchProgress> {
    format: Format,
    progress: P,
    overwrite: bool,
    options: CreateOptions,
}

impl<P: PatchProgress> PatchCreator<P> {
    /// Creates a new creator for the given format.
    ///
    /// If `overwrite` is `true`, an existing patch file will be replaced.
    /// Otherwise, creation will fail if the patch file already exists.
    pub fn new(format: Format, progress: P, overwrite: bool) -> Self {
        Self {
            format,
            progress,
            overwrite,
            options: CreateOptions::default(),
        }
    }

    /// Sets the description stored in formats that carry one.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.options.description = description.into();
        self
    }

    /// Diffs `original` against `modified` and writes the patch to `path`.
    ///
    /// The patch file is removed again if creation fails or the images
    /// turn out to be identical.
    pub fn create(
        &self,
        original: &[u8],
        modified: &[u8],
        path: &Path,
    ) -> Result<CreateOutcome, CreateError> {
        let pending =
            output::create(path, self.overwrite).context(CreateFileFailedSnafu { path })?;

        let summary = self
            .format
            .create(original, modified, &self.options, &pending.0, &self.progress)
            .context(EncodeFailedSnafu {
                format: self.format,
            })?;

        if summary.is_identical() {
            tracing::info!("images are identical, not writing {}", path.display());
            return Ok(CreateOutcome::Identical);
        }

        pending.0.sync_all().context(SyncFailedSnafu { path })?;
        output::keep(pending);

        tracing::debug!(
            records = summary.records,
            differing = summary.differing,
            "wrote {}",
            path.display()
        );

        Ok(CreateOutcome::Created(summary))
    }
}
