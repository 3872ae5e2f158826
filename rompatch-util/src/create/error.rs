use snafu::Snafu;
use std::path::PathBuf;

/// Errors that can occur while writing a patch file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum CreateError {
    #[snafu(display("cannot create patch file {}: {source}", path.display()))]
    CreateFileFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot create {format} patch: {source}"))]
    EncodeFailed {
        format: rompatch::Format,
        source: rompatch::CreateError,
    },

    #[snafu(display("cannot flush {}: {source}", path.display()))]
    SyncFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}
