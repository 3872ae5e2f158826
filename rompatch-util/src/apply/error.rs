use snafu::Snafu;
use std::path::PathBuf;

/// Errors that can occur while producing a patched image.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum ApplyError {
    #[snafu(display("unrecognized patch format (expected an IPS or APS file)"))]
    UnknownFormat,

    #[snafu(display("cannot create output file {}: {source}", path.display()))]
    CreateFileFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot copy original image to {}: {source}", path.display()))]
    CopyFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot apply {format} patch: {source}"))]
    PatchFailed {
        format: rompatch::Format,
        source: rompatch::ApplyError,
    },

    #[snafu(display("cannot flush {}: {source}", path.display()))]
    SyncFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}
