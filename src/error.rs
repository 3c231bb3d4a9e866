use std::fmt;
use std::io;
use std::path::Path;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The category of a parser or accessor failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The same section name was declared twice.
    DuplicateSection,
    /// A key/value line occurred before any section header.
    OrphanKeyValue,
    /// A continuation line was found while multi-line values are disallowed.
    MultiLineNotAllowed,
    /// An array value whose first physical line is not blank.
    MalformedArray,
    /// A line matched none of the grammar's patterns.
    UnknownLineKind,
    /// A blank section or key name was passed to an accessor.
    InvalidArgument,
    /// The file encoding could not be determined and none was supplied.
    EncodingUndetectable,
    /// A stored value could not be coerced to the requested type.
    Coercion,
    /// An underlying read or write failed.
    Io,
}

/// Error type used throughout the crate.
///
/// Carries a human-readable message, the 1-based source line the failure
/// refers to (when there is one), and the file the document came from.
#[derive(Clone, Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub msg: String,
    pub line: Option<u32>,
    pub file_name: Option<String>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, msg: impl Into<String>) -> Error {
        Error {
            kind,
            msg: msg.into(),
            line: None,
            file_name: None,
        }
    }

    pub(crate) fn at(kind: ErrorKind, msg: impl Into<String>, line: u32) -> Error {
        Error {
            kind,
            msg: msg.into(),
            line: Some(line),
            file_name: None,
        }
    }

    pub(crate) fn io(path: &Path, e: io::Error) -> Error {
        let path = path.to_string_lossy();
        Error {
            kind: ErrorKind::Io,
            msg: format!("{}: {}", path, e),
            line: None,
            file_name: Some(path.to_string()),
        }
    }

    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The 1-based source line the error refers to, if any.
    pub fn line(&self) -> Option<u32> {
        self.line
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file_name, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}: {}", file, line, self.msg),
            (Some(file), None) => write!(f, "{}: {}", file, self.msg),
            (None, Some(line)) => write!(f, "line {}: {}", line, self.msg),
            (None, None) => write!(f, "{}", self.msg),
        }
    }
}

impl std::error::Error for Error {}
