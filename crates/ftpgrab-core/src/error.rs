use ftpgrab_ftp::FtpError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransferError>;

/// Why a single download attempt ended without completing.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("could not connect to the server")]
    Connect(#[source] FtpError),

    #[error("data transfer interrupted")]
    Stream(#[source] FtpError),

    #[error("local file error")]
    LocalIo(#[source] std::io::Error),

    #[error("remote file size changed from {before} to {after} bytes")]
    RemoteChanged { before: u64, after: u64 },

    #[error("offset {offset} is beyond the end of the remote file ({size} bytes)")]
    OffsetBeyondEnd { offset: u64, size: u64 },

    #[error("stream ended at byte {received} but the remote file has {expected} bytes")]
    SizeMismatch { received: u64, expected: u64 },
}

impl AttemptError {
    /// Whether the retry budget applies. Size bookkeeping failures are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            AttemptError::Connect(_) | AttemptError::Stream(_) | AttemptError::LocalIo(_) => true,
            AttemptError::RemoteChanged { .. }
            | AttemptError::OffsetBeyondEnd { .. }
            | AttemptError::SizeMismatch { .. } => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("could not connect to the server")]
    Connection(#[source] FtpError),

    #[error("transfer failed after {attempts} attempt(s), {bytes_transferred} bytes transferred")]
    TransferFailed {
        bytes_transferred: u64,
        attempts: u32,
        #[source]
        cause: AttemptError,
    },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("server rejected the request")]
    Remote(#[source] FtpError),

    #[error("local I/O error")]
    Io(#[from] std::io::Error),
}
