//! Shared error type for the storage layer and the shell built on top of it.
use std::fmt;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// Backing file length is not a whole multiple of the page size.
    CorruptFile(String),
    /// A bounds, sentinel, or shape violation inside the pager or tree.
    /// Fatal per the core's error model: the caller should treat this as
    /// unrecoverable rather than retry.
    Storage(String),
    /// `pages_count` would exceed `TABLE_MAX_PAGES`.
    TreeFull,
    /// Insert collided with an existing key.
    DuplicateKey,
    /// Shell-level statement rejected before it became a row.
    Syntax(String),
    NegativeId,
    IdTooBig,
    StringTooLong,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::CorruptFile(msg) => write!(f, "Corrupt database file: {}", msg),
            Error::Storage(msg) => write!(f, "Storage error: {}", msg),
            Error::TreeFull => write!(f, "Table full."),
            Error::DuplicateKey => write!(f, "Error: Duplicate key."),
            Error::Syntax(msg) => write!(f, "Syntax error: {}", msg),
            Error::NegativeId => write!(f, "ID must be positive."),
            Error::IdTooBig => write!(f, "ID must be smaller."),
            Error::StringTooLong => write!(f, "String is too long."),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

/// Builds a formatted `Error` variant inline, e.g. `err!(Storage, "page {} missing", n)`.
#[macro_export]
macro_rules! err {
    ($variant:ident, $($arg:tt)*) => {
        $crate::errors::Error::$variant(format!($($arg)*))
    };
}
