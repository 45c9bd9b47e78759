use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::path::PathBuf;

/// Typed errors returned by every engine operation. Resolver-internal
/// failures on individual posting lists degrade to reduced recall instead of
/// surfacing here.
#[derive(Debug)]
pub enum Error {
    /// An allocation for a large buffer failed. The operation is aborted;
    /// the engine remains usable.
    OutOfMemory,
    /// Empty query, oversized path, or an otherwise malformed argument.
    InvalidArgument(String),
    /// A pending update batch is full; the caller may retry.
    Busy,
    /// Delete of a path that is not in the index.
    NotFound(PathBuf),
    /// A compressed posting list failed to decode.
    Corruption(String),
    /// Upstream walker or notifier error.
    Io(std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfMemory => write!(f, "out of memory"),
            Error::InvalidArgument(s) => write!(f, "invalid argument: {}", s),
            Error::Busy => write!(f, "update batch full, retry later"),
            Error::NotFound(p) => write!(f, "path not indexed: {}", p.display()),
            Error::Corruption(s) => write!(f, "posting list corrupted: {}", s),
            Error::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::OutOfMemory
    }
}
