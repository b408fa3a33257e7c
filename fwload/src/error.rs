use crate::source::Source;
use crate::transport::TransportError;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("'{0}' is not supported as source")]
    UnsupportedSource(String),
    #[error("undefined source '{0}'")]
    UndefinedSource(String),
    #[error("cannot find '{0}' partition")]
    PartitionNotFound(String),
    #[error("no firmware filename for source {0}")]
    MissingFilename(Source),
    #[error("no on-the-fly hook registered")]
    NoOtfHook,
    #[error("couldn't determine file size")]
    SizeQueryFailed(#[source] TransportError),
    #[error("couldn't load chunk at offset {offset:#x}")]
    ChunkLoadFailed {
        offset: u64,
        #[source]
        source: TransportError,
    },
    #[error("error writing on-the-fly at offset {offset:#x}: {status:?}")]
    ChunkWriteFailed { offset: u64, status: SinkError },
    #[error("transfer from {from} failed")]
    TransportFailed {
        from: Source,
        #[source]
        source: TransportError,
    },
    #[error("invalid size '{0}'")]
    InvalidSize(String),
    #[error("invalid partition table: {0}")]
    InvalidPartitions(String),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Parse toml error")]
    TomlError(#[from] toml::de::Error),
}

/// Status returned by an on-the-fly sink.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SinkError {
    Io(std::io::ErrorKind),
    OutOfBounds,
    Other(i32),
}

impl From<i32> for SinkError {
    fn from(raw: i32) -> Self {
        match raw {
            // -ENOSPC
            -28 => SinkError::OutOfBounds,
            _ => SinkError::Other(raw),
        }
    }
}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        SinkError::Io(e.kind())
    }
}

/// Maps a C-style sink return code (0 on success) onto a result.
pub fn sink_status(raw: i32) -> Result<(), SinkError> {
    match raw {
        0 => Ok(()),
        _ => Err(SinkError::from(raw)),
    }
}
