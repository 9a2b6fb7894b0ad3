//! Filesystem error kinds.
//!
//! Every operation reports failure through `FsError`; nothing is retried
//! internally. The protocol layer turns these into `ERROR:` reply lines,
//! so the `Display` texts double as the wire-visible error reasons.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("filename is null or empty")]
    InvalidName,

    #[error("filename too large")]
    NameTooLong,

    #[error("file {0} already exists")]
    AlreadyExists(String),

    #[error("file {0} does not exist")]
    NotFound(String),

    #[error("no free file entries available")]
    TableFull,

    #[error("file too large")]
    FileTooLarge,

    #[error("not enough free blocks available")]
    InsufficientSpace,

    #[error("corrupted fnode chain for {0}")]
    CorruptChain(String),

    #[error("image size must be {expected} bytes, got {requested}")]
    Configuration { expected: u64, requested: u64 },

    #[error("disk i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FsError>;
